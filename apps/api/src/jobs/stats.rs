use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::jobs::repository::JOB_COLUMNS;
use crate::models::job::{decode_skills, JobRow, JobView};
use crate::models::proposal::ProposalRow;
use crate::proposals::PROPOSAL_COLUMNS;

const TOP_SKILLS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub total_scrapes: i64,
    pub total_jobs: i64,
    pub total_proposals: i64,
    /// Active scrapes taken in the last 7 days.
    pub recent_scrapes: i64,
    pub jobs_by_type: Vec<LabelCount>,
    /// Most frequent skills among jobs parsed in the last 30 days.
    pub top_skills: Vec<LabelCount>,
    /// Active scrapes per day over the last 7 days, oldest day first.
    pub scrapes_by_day: Vec<LabelCount>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LabelCount {
    pub label: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSnapshot {
    pub export_timestamp: DateTime<Utc>,
    pub stats: DashboardStats,
    pub jobs: Vec<JobView>,
    pub proposals: Vec<ProposalRow>,
}

pub async fn dashboard_stats(pool: &SqlitePool) -> Result<DashboardStats, sqlx::Error> {
    let total_scrapes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM scraped_data WHERE status = 'active'")
            .fetch_one(pool)
            .await?;
    let total_jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
        .fetch_one(pool)
        .await?;
    let total_proposals: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM proposals")
        .fetch_one(pool)
        .await?;
    let recent_scrapes: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM scraped_data WHERE status = 'active' AND scrape_timestamp >= datetime('now', '-7 days')",
    )
    .fetch_one(pool)
    .await?;

    let jobs_by_type = label_counts(
        sqlx::query_as(
            r#"
            SELECT job_type, COUNT(*) AS count
            FROM jobs
            WHERE job_type IS NOT NULL
            GROUP BY job_type
            ORDER BY count DESC, job_type
            "#,
        )
        .fetch_all(pool)
        .await?,
    );

    let skill_rows: Vec<Option<String>> = sqlx::query_scalar(
        "SELECT skills FROM jobs WHERE skills IS NOT NULL AND parsed_timestamp >= datetime('now', '-30 days')",
    )
    .fetch_all(pool)
    .await?;
    let top_skills = top_skills(skill_rows.iter().map(|raw| decode_skills(raw.as_deref())));

    let scrapes_by_day = label_counts(
        sqlx::query_as(
            r#"
            SELECT DATE(scrape_timestamp) AS day, COUNT(*) AS count
            FROM scraped_data
            WHERE status = 'active' AND scrape_timestamp >= datetime('now', '-7 days')
            GROUP BY day
            ORDER BY day
            "#,
        )
        .fetch_all(pool)
        .await?,
    );

    Ok(DashboardStats {
        total_scrapes,
        total_jobs,
        total_proposals,
        recent_scrapes,
        jobs_by_type,
        top_skills,
        scrapes_by_day,
    })
}

/// Stats plus every job and proposal in one document, oldest rows first.
pub async fn export_snapshot(pool: &SqlitePool) -> Result<ExportSnapshot, sqlx::Error> {
    let jobs_sql = format!("SELECT {JOB_COLUMNS} FROM jobs ORDER BY id");
    let jobs = sqlx::query_as::<_, JobRow>(&jobs_sql).fetch_all(pool).await?;
    let proposals_sql = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals ORDER BY id");
    let proposals = sqlx::query_as::<_, ProposalRow>(&proposals_sql)
        .fetch_all(pool)
        .await?;

    Ok(ExportSnapshot {
        export_timestamp: Utc::now(),
        stats: dashboard_stats(pool).await?,
        jobs: jobs.into_iter().map(JobView::from).collect(),
        proposals,
    })
}

fn label_counts(rows: Vec<(String, i64)>) -> Vec<LabelCount> {
    rows.into_iter()
        .map(|(label, count)| LabelCount { label, count })
        .collect()
}

/// Counts skills across jobs; ties are broken alphabetically.
fn top_skills(skill_lists: impl Iterator<Item = Vec<String>>) -> Vec<LabelCount> {
    let mut counts: HashMap<String, i64> = HashMap::new();
    for skill in skill_lists.flatten() {
        let skill = skill.trim();
        if skill.is_empty() {
            continue;
        }
        *counts.entry(skill.to_string()).or_insert(0) += 1;
    }

    let mut ranked = label_counts(counts.into_iter().collect());
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    ranked.truncate(TOP_SKILLS);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::jobs::repository::{add_job, sample_job};

    #[test]
    fn test_top_skills_ranking() {
        let lists = vec![
            vec!["Rust".to_string(), "SQL".to_string()],
            vec!["Rust".to_string(), "Axum".to_string(), "  ".to_string()],
            vec![String::new()],
        ];
        let ranked = top_skills(lists.into_iter());
        assert_eq!(
            ranked[0],
            LabelCount {
                label: "Rust".to_string(),
                count: 2
            }
        );
        assert_eq!(ranked[1].label, "Axum");
        assert_eq!(ranked.len(), 3);
    }

    #[tokio::test]
    async fn test_dashboard_stats() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO scraped_data (scrape_type, raw_content) VALUES ('browser', '<html/>')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO scraped_data (scrape_type, raw_content, status) VALUES ('browser', '<html/>', 'archived')",
        )
        .execute(&pool)
        .await
        .unwrap();
        add_job(&pool, Some(1), &sample_job("~1", "One")).await.unwrap();
        let mut hourly = sample_job("~2", "Two");
        hourly.job_info.job_type = Some("Hourly".to_string());
        add_job(&pool, Some(1), &hourly).await.unwrap();
        add_job(&pool, Some(1), &sample_job("~3", "Three")).await.unwrap();
        sqlx::query("INSERT INTO jobs (job_title, skills) VALUES ('Broken', 'not json')")
            .execute(&pool)
            .await
            .unwrap();

        let stats = dashboard_stats(&pool).await.unwrap();
        assert_eq!(stats.total_scrapes, 1);
        assert_eq!(stats.recent_scrapes, 1);
        assert_eq!(stats.total_jobs, 4);
        assert_eq!(stats.total_proposals, 0);
        assert_eq!(stats.jobs_by_type[0].label, "Fixed price");
        assert_eq!(stats.jobs_by_type[0].count, 2);
        assert_eq!(stats.top_skills[0].count, 3);
        assert_eq!(stats.scrapes_by_day.len(), 1);
        assert_eq!(stats.scrapes_by_day[0].count, 1);
    }

    #[tokio::test]
    async fn test_export_snapshot_contains_jobs() {
        let pool = test_pool().await;
        add_job(&pool, None, &sample_job("~1", "One")).await.unwrap();

        let snapshot = export_snapshot(&pool).await.unwrap();
        assert_eq!(snapshot.jobs.len(), 1);
        assert!(snapshot.proposals.is_empty());
        assert_eq!(snapshot.stats.total_jobs, 1);
    }

    #[tokio::test]
    async fn test_export_snapshot_has_every_row() {
        let pool = test_pool().await;
        sqlx::query(
            r#"
            WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 1005)
            INSERT INTO jobs (job_uid, job_title) SELECT 'uid-' || i, 'Job ' || i FROM n
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            r#"
            WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < 1002)
            INSERT INTO proposals (job_title) SELECT 'Proposal ' || i FROM n
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        let snapshot = export_snapshot(&pool).await.unwrap();
        assert_eq!(snapshot.stats.total_jobs, 1005);
        assert_eq!(snapshot.jobs.len(), 1005);
        assert_eq!(snapshot.proposals.len(), 1002);
        assert_eq!(snapshot.jobs[0].title, "Job 1");
    }
}
