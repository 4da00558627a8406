//! Database retention: keep the latest N scrapes and whatever hangs off them.

use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::config::CleanupConfig;
use crate::db::{database_stats, round2, DatabaseStats};
use crate::errors::AppError;

#[derive(Debug, Clone, Copy)]
pub struct CleanupOptions {
    pub keep_scrapes: u32,
    pub analytics_retention_days: u32,
    /// Keywords seen this many times or fewer are removed.
    pub min_keyword_frequency: u32,
    pub vacuum: bool,
    pub dry_run: bool,
}

impl From<&CleanupConfig> for CleanupOptions {
    fn from(config: &CleanupConfig) -> Self {
        CleanupOptions {
            keep_scrapes: config.keep_scrapes,
            analytics_retention_days: config.analytics_retention_days,
            min_keyword_frequency: config.min_keyword_frequency,
            vacuum: config.vacuum,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DeletionCounts {
    pub jobs: u64,
    pub proposals: u64,
    pub scraped_data: u64,
    pub cover_letters: u64,
    pub analytics: u64,
    pub keywords: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub scrapes_kept: usize,
    /// Rows removed, or rows that would be removed on a dry run.
    pub deleted: DeletionCounts,
    pub vacuumed: bool,
    pub before: DatabaseStats,
    pub after: DatabaseStats,
    pub space_saved_mb: f64,
}

/// Runs the retention pass. Deletions happen in one transaction, in this order:
/// jobs and proposals of dropped scrapes, the scrapes, orphaned cover letters,
/// old analytics, rare keywords. `VACUUM` runs afterwards when enabled.
pub async fn run_cleanup(pool: &SqlitePool, options: CleanupOptions) -> Result<CleanupReport, AppError> {
    let before = database_stats(pool).await?;

    let keep_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM scraped_data ORDER BY scrape_timestamp DESC, id DESC LIMIT ?",
    )
    .bind(i64::from(options.keep_scrapes))
    .fetch_all(pool)
    .await?;

    if keep_ids.is_empty() {
        warn!("Cleanup aborted: no scrapes in the database");
        return Err(AppError::Validation(
            "No scrapes found, nothing to clean up".to_string(),
        ));
    }
    info!(
        "Cleanup: keeping latest {} scrapes{}",
        keep_ids.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    let mut tx = pool.begin().await?;
    let deleted = if options.dry_run {
        count_deletions(&mut tx, &keep_ids, &options).await?
    } else {
        apply_deletions(&mut tx, &keep_ids, &options).await?
    };
    if options.dry_run {
        tx.rollback().await?;
    } else {
        tx.commit().await?;
    }

    let vacuumed = options.vacuum && !options.dry_run;
    if vacuumed {
        sqlx::query("VACUUM").execute(pool).await?;
        info!("Database optimized with VACUUM");
    }

    let after = database_stats(pool).await?;
    let space_saved_mb = round2(before.db_size_mb - after.db_size_mb);
    info!(
        "Cleanup finished: {deleted:?}, {} scrapes and {} jobs remain, {space_saved_mb} MB saved",
        after.count("scraped_data"),
        after.count("jobs")
    );

    Ok(CleanupReport {
        dry_run: options.dry_run,
        scrapes_kept: keep_ids.len(),
        deleted,
        vacuumed,
        before,
        after,
        space_saved_mb,
    })
}

async fn count_deletions(
    conn: &mut SqliteConnection,
    keep_ids: &[i64],
    options: &CleanupOptions,
) -> Result<DeletionCounts, sqlx::Error> {
    Ok(DeletionCounts {
        jobs: count(conn, outside_kept("SELECT COUNT(*) FROM jobs WHERE scrape_id", keep_ids)).await?,
        proposals: count(
            conn,
            outside_kept("SELECT COUNT(*) FROM proposals WHERE scrape_id", keep_ids),
        )
        .await?,
        scraped_data: count(conn, outside_kept("SELECT COUNT(*) FROM scraped_data WHERE id", keep_ids))
            .await?,
        cover_letters: count(conn, doomed_cover_letters("SELECT COUNT(*)", keep_ids)).await?,
        analytics: count(conn, old_analytics("SELECT COUNT(*)", options.analytics_retention_days))
            .await?,
        keywords: count(conn, rare_keywords("SELECT COUNT(*)", options.min_keyword_frequency))
            .await?,
    })
}

async fn apply_deletions(
    conn: &mut SqliteConnection,
    keep_ids: &[i64],
    options: &CleanupOptions,
) -> Result<DeletionCounts, sqlx::Error> {
    // Counted up front: deleting jobs cascades to their cover letters.
    let cover_letters = count(conn, doomed_cover_letters("SELECT COUNT(*)", keep_ids)).await?;

    let jobs = execute(conn, outside_kept("DELETE FROM jobs WHERE scrape_id", keep_ids)).await?;
    info!("Deleted {jobs} jobs from old scrapes");
    let proposals = execute(conn, outside_kept("DELETE FROM proposals WHERE scrape_id", keep_ids)).await?;
    info!("Deleted {proposals} proposals from old scrapes");
    let scraped_data = execute(conn, outside_kept("DELETE FROM scraped_data WHERE id", keep_ids)).await?;
    info!("Deleted {scraped_data} old scrapes");

    execute(conn, doomed_cover_letters("DELETE", keep_ids)).await?;
    info!("Deleted {cover_letters} orphaned cover letters");

    let analytics = execute(conn, old_analytics("DELETE", options.analytics_retention_days)).await?;
    info!(
        "Deleted {analytics} analytics records older than {} days",
        options.analytics_retention_days
    );
    let keywords = execute(conn, rare_keywords("DELETE", options.min_keyword_frequency)).await?;
    info!(
        "Deleted {keywords} keywords with frequency <= {}",
        options.min_keyword_frequency
    );

    Ok(DeletionCounts {
        jobs,
        proposals,
        scraped_data,
        cover_letters,
        analytics,
        keywords,
    })
}

/// `<prefix> NOT IN (<kept ids>)`. Rows with a NULL column never match.
fn outside_kept<'a>(prefix: &str, keep_ids: &[i64]) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(prefix);
    query.push(" NOT IN (");
    let mut ids = query.separated(", ");
    for id in keep_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
    query
}

/// Cover letters whose job is missing or belongs to a dropped scrape.
fn doomed_cover_letters<'a>(verb: &str, keep_ids: &[i64]) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(format!(
        "{verb} FROM cover_letters WHERE job_id NOT IN (SELECT id FROM jobs WHERE scrape_id IS NULL OR scrape_id IN ("
    ));
    let mut ids = query.separated(", ");
    for id in keep_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated("))");
    query
}

fn old_analytics<'a>(verb: &str, days: u32) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(format!(
        "{verb} FROM analytics WHERE created_timestamp < datetime('now', "
    ));
    query.push_bind(format!("-{days} days")).push(")");
    query
}

fn rare_keywords<'a>(verb: &str, min_frequency: u32) -> QueryBuilder<'a, Sqlite> {
    let mut query = QueryBuilder::new(format!("{verb} FROM keywords WHERE frequency <= "));
    query.push_bind(i64::from(min_frequency));
    query
}

async fn count(conn: &mut SqliteConnection, mut query: QueryBuilder<'_, Sqlite>) -> Result<u64, sqlx::Error> {
    let n: i64 = query.build_query_scalar().fetch_one(&mut *conn).await?;
    Ok(n.max(0) as u64)
}

async fn execute(conn: &mut SqliteConnection, mut query: QueryBuilder<'_, Sqlite>) -> Result<u64, sqlx::Error> {
    Ok(query.build().execute(&mut *conn).await?.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::jobs::repository::{add_job, sample_job};

    fn options(keep: u32) -> CleanupOptions {
        CleanupOptions {
            keep_scrapes: keep,
            analytics_retention_days: 30,
            min_keyword_frequency: 1,
            vacuum: false,
            dry_run: false,
        }
    }

    /// Three scrapes (oldest first), one job each, a cover letter on the oldest job,
    /// one old and one fresh metric, one rare and one frequent keyword.
    async fn seeded() -> SqlitePool {
        let pool = test_pool().await;
        for (i, ts) in ["2025-01-01 00:00:00", "2025-01-02 00:00:00", "2025-01-03 00:00:00"]
            .iter()
            .enumerate()
        {
            let scrape_id = sqlx::query(
                "INSERT INTO scraped_data (scrape_type, raw_content, scrape_timestamp) VALUES ('browser', '<html/>', ?)",
            )
            .bind(*ts)
            .execute(&pool)
            .await
            .unwrap()
            .last_insert_rowid();
            let job_id = add_job(&pool, Some(scrape_id), &sample_job(&format!("~{i}"), "Job"))
                .await
                .unwrap()
                .unwrap();
            sqlx::query("INSERT INTO proposals (scrape_id, job_title) VALUES (?, 'p')")
                .bind(scrape_id)
                .execute(&pool)
                .await
                .unwrap();
            if i == 0 {
                sqlx::query(
                    "INSERT INTO cover_letters (job_id, ai_provider, cover_letter_text) VALUES (?, 'template', 'x')",
                )
                .bind(job_id)
                .execute(&pool)
                .await
                .unwrap();
            }
        }
        sqlx::query(
            "INSERT INTO analytics (metric_name, metric_value, created_timestamp) VALUES ('old', '1', '2020-01-01 00:00:00'), ('new', '1', CURRENT_TIMESTAMP)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO keywords (keyword, frequency) VALUES ('rare', 1), ('common', 5)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_cleanup_keeps_latest_scrapes() {
        let pool = seeded().await;
        let report = run_cleanup(&pool, options(2)).await.unwrap();

        assert_eq!(report.scrapes_kept, 2);
        assert_eq!(
            report.deleted,
            DeletionCounts {
                jobs: 1,
                proposals: 1,
                scraped_data: 1,
                cover_letters: 1,
                analytics: 1,
                keywords: 1,
            }
        );
        assert_eq!(report.before.count("scraped_data"), 3);
        assert_eq!(report.after.count("scraped_data"), 2);
        assert_eq!(report.after.count("jobs"), 2);
        assert_eq!(report.after.count("cover_letters"), 0);
        assert_eq!(report.after.count("keywords"), 1);
        assert_eq!(report.after.oldest_scrape.as_deref(), Some("2025-01-02 00:00:00"));
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let pool = seeded().await;
        let report = run_cleanup(
            &pool,
            CleanupOptions {
                dry_run: true,
                vacuum: true,
                ..options(1)
            },
        )
        .await
        .unwrap();

        assert!(report.dry_run);
        assert!(!report.vacuumed);
        assert_eq!(report.deleted.scraped_data, 2);
        assert_eq!(report.deleted.jobs, 2);
        assert_eq!(report.deleted.cover_letters, 1);
        assert_eq!(report.after.count("scraped_data"), 3);
        assert_eq!(report.after.count("cover_letters"), 1);
    }

    #[tokio::test]
    async fn test_cleanup_without_scrapes_fails() {
        let pool = test_pool().await;
        assert!(matches!(
            run_cleanup(&pool, options(50)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unlinked_jobs_survive() {
        let pool = seeded().await;
        add_job(&pool, None, &sample_job("~free", "Unlinked")).await.unwrap();

        let report = run_cleanup(&pool, options(1)).await.unwrap();
        assert_eq!(report.deleted.jobs, 2);
        assert_eq!(report.after.count("jobs"), 2);
    }

    #[tokio::test]
    async fn test_vacuum_runs() {
        let pool = seeded().await;
        let report = run_cleanup(
            &pool,
            CleanupOptions {
                vacuum: true,
                ..options(3)
            },
        )
        .await
        .unwrap();
        assert!(report.vacuumed);
        assert_eq!(report.deleted.scraped_data, 0);
    }
}
