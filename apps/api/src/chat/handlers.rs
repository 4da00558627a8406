use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::chat::phase::{detect_and_update_phase, PhaseDetection, PhasePrediction};
use crate::chat::repository::{
    add_message, create_session, list_sessions, resolve_session, NewSession,
};
use crate::chat::responses::{generate_reply, GeneratedReply, ResponseMode, DEFAULT_NUM_OPTIONS};
use crate::errors::AppError;
use crate::extract::OptionalJson;
use crate::models::chat::{ChatMessageRow, ChatSessionRow};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct NewMessage {
    pub sender_type: String,
    pub text: String,
}

#[derive(Deserialize, Default)]
pub struct RespondRequest {
    #[serde(default)]
    pub mode: ResponseMode,
    pub num_options: Option<usize>,
}

#[derive(Deserialize)]
pub struct PredictRequest {
    pub context: Option<String>,
    pub contexts: Option<Vec<String>>,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub predictions: Vec<PhasePrediction>,
}

/// POST /api/v1/chat/sessions
pub async fn handle_create_session(
    State(state): State<AppState>,
    Json(req): Json<NewSession>,
) -> Result<(StatusCode, Json<ChatSessionRow>), AppError> {
    let session = create_session(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/chat/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<ChatSessionRow>>, AppError> {
    Ok(Json(list_sessions(&state.db, params.limit.unwrap_or(20)).await?))
}

/// POST /api/v1/chat/sessions/:id/messages
pub async fn handle_add_message(
    State(state): State<AppState>,
    Path(session_ref): Path<String>,
    Json(req): Json<NewMessage>,
) -> Result<(StatusCode, Json<ChatMessageRow>), AppError> {
    let session = resolve_session(&state.db, &session_ref).await?;
    let message = add_message(&state.db, &session.session_id, &req.sender_type, &req.text).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// POST /api/v1/chat/sessions/:id/phase
pub async fn handle_detect_phase(
    State(state): State<AppState>,
    Path(session_ref): Path<String>,
) -> Result<Json<PhaseDetection>, AppError> {
    let detection =
        detect_and_update_phase(&state.db, state.phase_classifier.as_ref(), &session_ref).await?;
    Ok(Json(detection))
}

/// POST /api/v1/chat/sessions/:id/respond
pub async fn handle_respond(
    State(state): State<AppState>,
    Path(session_ref): Path<String>,
    req: OptionalJson<RespondRequest>,
) -> Result<Json<GeneratedReply>, AppError> {
    let req = req.or_default();
    let reply = generate_reply(
        &state.db,
        state.chat_responder.as_deref(),
        &session_ref,
        req.mode,
        req.num_options.unwrap_or(DEFAULT_NUM_OPTIONS),
    )
    .await?;
    Ok(Json(reply))
}

/// POST /api/v1/chat/phase/predict
pub async fn handle_predict(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    let contexts = match (req.context, req.contexts) {
        (_, Some(contexts)) => contexts,
        (Some(context), None) => vec![context],
        (None, None) => {
            return Err(AppError::Validation(
                "provide either 'context' or 'contexts'".to_string(),
            ))
        }
    };
    let predictions = state.phase_classifier.predict_batch(&contexts).await?;
    Ok(Json(PredictResponse { predictions }))
}
