use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::cover_letters::repository::cover_letters_for_job;
use crate::errors::AppError;
use crate::jobs::repository::{
    count_jobs_without_cover_letter, detailed_jobs, get_job, latest_job_without_cover_letter,
    latest_jobs, recent_jobs, JobSummary,
};
use crate::jobs::search::{search_jobs, JobSearch, SearchHit};
use crate::jobs::stats::{dashboard_stats, export_snapshot, DashboardStats, ExportSnapshot};
use crate::models::cover_letter::CoverLetterRow;
use crate::models::job::{JobBrief, JobView};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: i64 = 20;

#[derive(Deserialize)]
pub struct JobListQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub detailed: bool,
    /// Only id, title and description. Wins over `detailed`.
    #[serde(default)]
    pub brief: bool,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum JobListing {
    Summary(Vec<JobSummary>),
    Detailed(Vec<JobView>),
    Brief(Vec<JobBrief>),
}

#[derive(Serialize)]
pub struct PendingCoverLetter {
    pub job: Option<JobView>,
    /// Jobs that still have no cover letter, including `job`.
    pub pending: i64,
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> Result<Json<JobListing>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
    let listing = if params.brief {
        JobListing::Brief(latest_jobs(&state.db, limit).await?)
    } else if params.detailed {
        JobListing::Detailed(detailed_jobs(&state.db, limit).await?)
    } else {
        JobListing::Summary(recent_jobs(&state.db, limit).await?)
    };
    Ok(Json(listing))
}

/// GET /api/v1/jobs/search
pub async fn handle_search_jobs(
    State(state): State<AppState>,
    Query(search): Query<JobSearch>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    Ok(Json(search_jobs(&state.db, &search).await?))
}

/// GET /api/v1/jobs/pending-cover-letter
pub async fn handle_pending_cover_letter(
    State(state): State<AppState>,
) -> Result<Json<PendingCoverLetter>, AppError> {
    let job = latest_job_without_cover_letter(&state.db).await?;
    let pending = count_jobs_without_cover_letter(&state.db).await?;
    Ok(Json(PendingCoverLetter {
        job: job.map(JobView::from),
        pending,
    }))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<JobView>, AppError> {
    get_job(&state.db, id)
        .await?
        .map(|row| Json(JobView::from(row)))
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

/// GET /api/v1/jobs/:id/cover-letters
pub async fn handle_job_cover_letters(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<CoverLetterRow>>, AppError> {
    if get_job(&state.db, id).await?.is_none() {
        return Err(AppError::NotFound(format!("Job {id} not found")));
    }
    Ok(Json(cover_letters_for_job(&state.db, id).await?))
}

/// GET /api/v1/stats
pub async fn handle_dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    Ok(Json(dashboard_stats(&state.db).await?))
}

/// GET /api/v1/export
pub async fn handle_export(State(state): State<AppState>) -> Result<Json<ExportSnapshot>, AppError> {
    Ok(Json(export_snapshot(&state.db).await?))
}
