use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProposalRow {
    pub id: i64,
    pub scrape_id: Option<i64>,
    pub job_title: Option<String>,
    pub proposal_text: Option<String>,
    pub bid_amount: Option<String>,
    pub proposal_status: Option<String>,
    pub submitted_date: Option<String>,
    pub client_feedback: Option<String>,
    pub response_rate: Option<String>,
    pub parsed_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProposal {
    pub job_title: Option<String>,
    pub text: Option<String>,
    pub bid_amount: Option<String>,
    /// submitted | accepted | rejected
    pub status: Option<String>,
    pub submitted_date: Option<String>,
    pub client_feedback: Option<String>,
    pub response_rate: Option<String>,
}
