use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::proposal::{NewProposal, ProposalRow};
use crate::proposals::{add_proposal, recent_proposals};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProposalRequest {
    pub scrape_id: Option<i64>,
    #[serde(flatten)]
    pub proposal: NewProposal,
}

#[derive(Serialize)]
pub struct CreatedProposal {
    pub proposal_id: i64,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// POST /api/v1/proposals
pub async fn handle_add_proposal(
    State(state): State<AppState>,
    Json(req): Json<CreateProposalRequest>,
) -> Result<(StatusCode, Json<CreatedProposal>), AppError> {
    let proposal_id = add_proposal(&state.db, req.scrape_id, &req.proposal).await?;
    Ok((StatusCode::CREATED, Json(CreatedProposal { proposal_id })))
}

/// GET /api/v1/proposals
pub async fn handle_list_proposals(
    State(state): State<AppState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<ProposalRow>>, AppError> {
    let proposals = recent_proposals(&state.db, params.limit.unwrap_or(20)).await?;
    Ok(Json(proposals))
}
