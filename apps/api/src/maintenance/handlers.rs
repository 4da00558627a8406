use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::db::{database_stats, DatabaseStats};
use crate::errors::AppError;
use crate::extract::OptionalJson;
use crate::maintenance::schedule::{
    run_scheduled_cleanup, schedule_status, ScheduleStatus, ScheduledOutcome,
};
use crate::state::AppState;

#[derive(Deserialize, Default)]
pub struct CleanupRequest {
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Serialize)]
pub struct MaintenanceStatus {
    pub database: DatabaseStats,
    pub schedule: ScheduleStatus,
}

/// POST /api/v1/maintenance/cleanup
pub async fn handle_cleanup(
    State(state): State<AppState>,
    req: OptionalJson<CleanupRequest>,
) -> Result<Json<ScheduledOutcome>, AppError> {
    let req = req.or_default();
    let outcome =
        run_scheduled_cleanup(&state.db, &state.config.cleanup, req.force, req.dry_run).await?;
    Ok(Json(outcome))
}

/// GET /api/v1/maintenance/status
pub async fn handle_status(
    State(state): State<AppState>,
) -> Result<Json<MaintenanceStatus>, AppError> {
    Ok(Json(MaintenanceStatus {
        database: database_stats(&state.db).await?,
        schedule: schedule_status(&state.db, &state.config.cleanup).await?,
    }))
}
