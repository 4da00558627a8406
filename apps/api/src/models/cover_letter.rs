use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverLetterStatus {
    Generated,
    Edited,
    Sent,
}

impl CoverLetterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverLetterStatus::Generated => "generated",
            CoverLetterStatus::Edited => "edited",
            CoverLetterStatus::Sent => "sent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoverLetterRow {
    pub id: i64,
    pub job_id: i64,
    pub ai_provider: String,
    pub cover_letter_text: String,
    pub generated_timestamp: DateTime<Utc>,
    pub status: String,
    pub rating: Option<i64>,
    pub notes: Option<String>,
}

/// Cover letter joined with the job it was written for.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CoverLetterWithJob {
    pub id: i64,
    pub job_id: i64,
    pub ai_provider: String,
    pub cover_letter_text: String,
    pub generated_timestamp: DateTime<Utc>,
    pub status: String,
    pub rating: Option<i64>,
    pub notes: Option<String>,
    pub job_title: String,
    pub job_type: Option<String>,
    pub budget: Option<String>,
}
