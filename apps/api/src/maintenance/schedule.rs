use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::CleanupConfig;
use crate::errors::AppError;
use crate::maintenance::cleanup::{run_cleanup, CleanupOptions, CleanupReport};

const RUN_COMPLETED: &str = "completed";
/// How often the background task checks whether a cleanup is due.
const CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleStatus {
    pub enabled: bool,
    pub interval_hours: u32,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub next_cleanup: Option<DateTime<Utc>>,
    pub due: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScheduledOutcome {
    Skipped { reason: String },
    Completed(CleanupReport),
}

pub async fn last_cleanup(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar("SELECT ran_at FROM maintenance_runs WHERE status = ? ORDER BY id DESC LIMIT 1")
        .bind(RUN_COMPLETED)
        .fetch_optional(pool)
        .await
}

async fn record_run(pool: &SqlitePool, report: &CleanupReport) -> Result<(), AppError> {
    let details = serde_json::to_string(&report.deleted)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode cleanup details: {e}")))?;
    sqlx::query("INSERT INTO maintenance_runs (status, scrapes_kept, details) VALUES (?, ?, ?)")
        .bind(RUN_COMPLETED)
        .bind(report.scrapes_kept as i64)
        .bind(details)
        .execute(pool)
        .await?;
    Ok(())
}

/// Due when enabled and either no cleanup ran yet or the interval has elapsed.
pub fn cleanup_due(
    enabled: bool,
    last: Option<DateTime<Utc>>,
    interval_hours: u32,
    now: DateTime<Utc>,
) -> bool {
    if !enabled {
        return false;
    }
    match last {
        None => true,
        Some(last) => now >= last + chrono::Duration::hours(i64::from(interval_hours)),
    }
}

pub async fn should_run_cleanup(
    pool: &SqlitePool,
    enabled: bool,
    interval_hours: u32,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    if !enabled {
        return Ok(false);
    }
    let last = last_cleanup(pool).await?;
    Ok(cleanup_due(enabled, last, interval_hours, now))
}

pub async fn schedule_status(
    pool: &SqlitePool,
    config: &CleanupConfig,
) -> Result<ScheduleStatus, sqlx::Error> {
    let last = last_cleanup(pool).await?;
    let next = last.map(|last| last + chrono::Duration::hours(i64::from(config.interval_hours)));
    Ok(ScheduleStatus {
        enabled: config.enabled,
        interval_hours: config.interval_hours,
        last_cleanup: last,
        next_cleanup: next,
        due: cleanup_due(config.enabled, last, config.interval_hours, Utc::now()),
    })
}

/// Runs a cleanup if one is due (or `force`), recording non-dry runs.
pub async fn run_scheduled_cleanup(
    pool: &SqlitePool,
    config: &CleanupConfig,
    force: bool,
    dry_run: bool,
) -> Result<ScheduledOutcome, AppError> {
    if !force
        && !dry_run
        && !should_run_cleanup(pool, config.enabled, config.interval_hours, Utc::now()).await?
    {
        return Ok(ScheduledOutcome::Skipped {
            reason: "not_scheduled".to_string(),
        });
    }

    let report = run_cleanup(
        pool,
        CleanupOptions {
            dry_run,
            ..CleanupOptions::from(config)
        },
    )
    .await?;
    if !dry_run {
        record_run(pool, &report).await?;
    }
    Ok(ScheduledOutcome::Completed(report))
}

/// Background task that checks hourly and cleans up when due. `None` when disabled.
pub fn spawn_scheduler(pool: SqlitePool, config: CleanupConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        info!("Scheduled cleanup disabled");
        return None;
    }
    info!(
        "Scheduled cleanup every {}h, keeping {} scrapes",
        config.interval_hours, config.keep_scrapes
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(CHECK_INTERVAL);
        loop {
            ticker.tick().await;
            match run_scheduled_cleanup(&pool, &config, false, false).await {
                Ok(ScheduledOutcome::Completed(report)) => info!(
                    "Scheduled cleanup removed {} scrapes, saved {} MB",
                    report.deleted.scraped_data, report.space_saved_mb
                ),
                Ok(ScheduledOutcome::Skipped { .. }) => {}
                Err(e) => error!("Scheduled cleanup failed: {e}"),
            }
        }
    }))
}
