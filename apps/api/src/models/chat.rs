use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSessionRow {
    pub session_id: String,
    pub title: String,
    pub platform: String,
    pub participant: Option<String>,
    pub phase: Option<String>,
    pub phase_confidence: Option<f64>,
    pub phase_updated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessageRow {
    pub id: i64,
    pub session_id: String,
    /// client | freelancer
    pub sender_type: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}
