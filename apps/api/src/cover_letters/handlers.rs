use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::cover_letters::repository::{
    delete_cover_letter, recent_cover_letters, update_cover_letter_status,
};
use crate::cover_letters::writer::{generate_for_next_job, GenerationOutcome};
use crate::errors::AppError;
use crate::models::cover_letter::{CoverLetterStatus, CoverLetterWithJob};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    pub status: CoverLetterStatus,
    pub rating: Option<i64>,
    pub notes: Option<String>,
}

/// POST /api/v1/cover-letters/generate
pub async fn handle_generate(
    State(state): State<AppState>,
) -> Result<Json<GenerationOutcome>, AppError> {
    let outcome = generate_for_next_job(&state.db, state.cover_letter_writer.as_ref()).await?;
    Ok(Json(outcome))
}

/// GET /api/v1/cover-letters
pub async fn handle_recent(
    State(state): State<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<CoverLetterWithJob>>, AppError> {
    let letters = recent_cover_letters(&state.db, params.limit.unwrap_or(10)).await?;
    Ok(Json(letters))
}

/// PATCH /api/v1/cover-letters/:id
pub async fn handle_update_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<StatusUpdate>,
) -> Result<StatusCode, AppError> {
    update_cover_letter_status(&state.db, id, req.status, req.rating, req.notes.as_deref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/cover-letters/:id
pub async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    delete_cover_letter(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
