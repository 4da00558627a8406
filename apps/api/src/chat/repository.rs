use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::chat::{ChatMessageRow, ChatSessionRow};

/// Session reference that resolves to the most recently active session.
pub const LATEST_SESSION: &str = "latest";

pub const SENDER_CLIENT: &str = "client";
pub const SENDER_FREELANCER: &str = "freelancer";

const SESSION_COLUMNS: &str = "session_id, title, platform, participant, phase, phase_confidence, \
     phase_updated_at, created_at, last_activity";

#[derive(Debug, Clone, Deserialize)]
pub struct NewSession {
    pub title: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    pub participant: Option<String>,
}

fn default_platform() -> String {
    "upwork".to_string()
}

pub async fn create_session(pool: &SqlitePool, session: &NewSession) -> Result<ChatSessionRow, AppError> {
    if session.title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }

    let session_id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO chat_sessions (session_id, title, platform, participant) VALUES (?, ?, ?, ?)")
        .bind(&session_id)
        .bind(session.title.trim())
        .bind(&session.platform)
        .bind(&session.participant)
        .execute(pool)
        .await?;

    info!("Created chat session {session_id}");
    get_session(pool, &session_id).await
}

pub async fn get_session(pool: &SqlitePool, session_id: &str) -> Result<ChatSessionRow, AppError> {
    sqlx::query_as::<_, ChatSessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE session_id = ?"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Session {session_id} not found")))
}

/// Session with the most recent activity.
pub async fn latest_session(pool: &SqlitePool) -> Result<Option<ChatSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, ChatSessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM chat_sessions ORDER BY last_activity DESC, rowid DESC LIMIT 1"
    ))
    .fetch_optional(pool)
    .await
}

/// Resolves a session id, or [`LATEST_SESSION`].
pub async fn resolve_session(pool: &SqlitePool, reference: &str) -> Result<ChatSessionRow, AppError> {
    if reference == LATEST_SESSION {
        return latest_session(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("No active sessions found".to_string()));
    }
    get_session(pool, reference).await
}

pub async fn list_sessions(pool: &SqlitePool, limit: i64) -> Result<Vec<ChatSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, ChatSessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM chat_sessions ORDER BY last_activity DESC, rowid DESC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Appends a message and bumps the session's last activity.
pub async fn add_message(
    pool: &SqlitePool,
    session_id: &str,
    sender_type: &str,
    text: &str,
) -> Result<ChatMessageRow, AppError> {
    if sender_type != SENDER_CLIENT && sender_type != SENDER_FREELANCER {
        return Err(AppError::Validation(format!(
            "sender_type must be '{SENDER_CLIENT}' or '{SENDER_FREELANCER}', got '{sender_type}'"
        )));
    }
    if text.trim().is_empty() {
        return Err(AppError::Validation("message text cannot be empty".to_string()));
    }
    get_session(pool, session_id).await?;

    let id = sqlx::query("INSERT INTO chat_messages (session_id, sender_type, text) VALUES (?, ?, ?)")
        .bind(session_id)
        .bind(sender_type)
        .bind(text)
        .execute(pool)
        .await?
        .last_insert_rowid();

    sqlx::query("UPDATE chat_sessions SET last_activity = CURRENT_TIMESTAMP WHERE session_id = ?")
        .bind(session_id)
        .execute(pool)
        .await?;

    Ok(sqlx::query_as::<_, ChatMessageRow>(
        "SELECT id, session_id, sender_type, text, sent_at FROM chat_messages WHERE id = ?",
    )
    .bind(id)
    .fetch_one(pool)
    .await?)
}

/// The last `limit` messages of a session in chronological order.
pub async fn recent_messages(
    pool: &SqlitePool,
    session_id: &str,
    limit: i64,
) -> Result<Vec<ChatMessageRow>, sqlx::Error> {
    sqlx::query_as::<_, ChatMessageRow>(
        r#"
        SELECT id, session_id, sender_type, text, sent_at FROM (
            SELECT id, session_id, sender_type, text, sent_at
            FROM chat_messages
            WHERE session_id = ?
            ORDER BY id DESC
            LIMIT ?
        )
        ORDER BY id ASC
        "#,
    )
    .bind(session_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn update_session_phase(
    pool: &SqlitePool,
    session_id: &str,
    phase: &str,
    confidence: f64,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE chat_sessions SET phase = ?, phase_confidence = ?, phase_updated_at = CURRENT_TIMESTAMP WHERE session_id = ?",
    )
    .bind(phase)
    .bind(confidence)
    .bind(session_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Session {session_id} not found")));
    }
    Ok(())
}

/// One "<sender_type>: <text>" line per message.
pub fn build_context(messages: &[ChatMessageRow]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender_type, m.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
pub(crate) async fn seeded_session(pool: &SqlitePool, messages: &[(&str, &str)]) -> String {
    let session = create_session(
        pool,
        &NewSession {
            title: "Casino content".to_string(),
            platform: default_platform(),
            participant: Some("Acme".to_string()),
        },
    )
    .await
    .unwrap();
    for (sender, text) in messages {
        add_message(pool, &session.session_id, sender, text)
            .await
            .unwrap();
    }
    session.session_id
}
