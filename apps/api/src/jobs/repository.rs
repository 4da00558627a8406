use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::models::job::{decode_skills, JobBrief, JobRow, JobView, ParsedJob};

pub(crate) const JOB_COLUMNS: &str = "id, scrape_id, job_uid, job_title, job_url, posted_time, job_type, \
     experience_level, budget, hourly_rate_min, hourly_rate_max, duration, skills, description, \
     parsed_timestamp";

/// Skills shown per job in list views.
const SUMMARY_SKILLS: usize = 5;

/// Compact job listing row.
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: i64,
    pub title: String,
    pub job_type: Option<String>,
    pub budget: Option<String>,
    pub experience_level: Option<String>,
    pub skills: Vec<String>,
    pub parsed_timestamp: DateTime<Utc>,
}

#[derive(FromRow)]
struct JobSummaryRow {
    id: i64,
    job_title: String,
    job_type: Option<String>,
    budget: Option<String>,
    experience_level: Option<String>,
    skills: Option<String>,
    parsed_timestamp: DateTime<Utc>,
}

impl From<JobSummaryRow> for JobSummary {
    fn from(row: JobSummaryRow) -> Self {
        let mut skills = decode_skills(row.skills.as_deref());
        skills.truncate(SUMMARY_SKILLS);
        JobSummary {
            id: row.id,
            title: row.job_title,
            job_type: row.job_type,
            budget: row.budget,
            experience_level: row.experience_level,
            skills,
            parsed_timestamp: row.parsed_timestamp,
        }
    }
}

/// Inserts a parsed job. Returns `None` when a job with the same UID already exists.
pub async fn add_job(
    pool: &SqlitePool,
    scrape_id: Option<i64>,
    job: &ParsedJob,
) -> Result<Option<i64>, sqlx::Error> {
    let skills = serde_json::to_string(&job.skills).unwrap_or_else(|_| "[]".to_string());
    let info = &job.job_info;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO jobs
            (scrape_id, job_uid, job_title, job_url, posted_time, job_type, experience_level,
             budget, hourly_rate_min, hourly_rate_max, duration, skills, description)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(scrape_id)
    .bind(&job.job_uid)
    .bind(&job.title)
    .bind(&job.url)
    .bind(&job.posted_time)
    .bind(&info.job_type)
    .bind(&info.experience_level)
    .bind(&info.budget)
    .bind(&info.hourly_rate_min)
    .bind(&info.hourly_rate_max)
    .bind(&info.duration)
    .bind(skills)
    .bind(&job.description)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        debug!("Skipping duplicate job {:?}", job.job_uid);
        return Ok(None);
    }
    Ok(Some(result.last_insert_rowid()))
}

pub async fn get_job(pool: &SqlitePool, id: i64) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Most recently parsed jobs, skills capped for list display.
pub async fn recent_jobs(pool: &SqlitePool, limit: i64) -> Result<Vec<JobSummary>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobSummaryRow>(
        r#"
        SELECT id, job_title, job_type, budget, experience_level, skills, parsed_timestamp
        FROM jobs
        ORDER BY parsed_timestamp DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(JobSummary::from).collect())
}

/// Most recently parsed jobs with every stored field.
pub async fn detailed_jobs(pool: &SqlitePool, limit: i64) -> Result<Vec<JobView>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs ORDER BY parsed_timestamp DESC, id DESC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(JobView::from).collect())
}

pub async fn latest_jobs(pool: &SqlitePool, limit: i64) -> Result<Vec<JobBrief>, sqlx::Error> {
    sqlx::query_as::<_, JobBrief>(
        "SELECT id, job_title, description FROM jobs ORDER BY parsed_timestamp DESC, id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn latest_job_without_cover_letter(
    pool: &SqlitePool,
) -> Result<Option<JobRow>, sqlx::Error> {
    sqlx::query_as::<_, JobRow>(&format!(
        r#"
        SELECT {JOB_COLUMNS} FROM jobs j
        WHERE NOT EXISTS (SELECT 1 FROM cover_letters cl WHERE cl.job_id = j.id)
        ORDER BY j.parsed_timestamp DESC, j.id DESC
        LIMIT 1
        "#
    ))
    .fetch_optional(pool)
    .await
}

pub async fn count_jobs_without_cover_letter(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM jobs j WHERE NOT EXISTS (SELECT 1 FROM cover_letters cl WHERE cl.job_id = j.id)",
    )
    .fetch_one(pool)
    .await
}

/// Bumps the frequency of every skill seen, creating keywords on first sight.
pub async fn record_skill_keywords(pool: &SqlitePool, skills: &[String]) -> Result<(), sqlx::Error> {
    for skill in skills.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
        sqlx::query(
            r#"
            INSERT INTO keywords (keyword, category, frequency, last_seen)
            VALUES (?, 'skill', 1, CURRENT_TIMESTAMP)
            ON CONFLICT(keyword) DO UPDATE SET
                frequency = frequency + 1,
                last_seen = CURRENT_TIMESTAMP
            "#,
        )
        .bind(skill)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn record_metric(
    pool: &SqlitePool,
    name: &str,
    value: &str,
    category: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO analytics (metric_name, metric_value, category) VALUES (?, ?, ?)")
        .bind(name)
        .bind(value)
        .bind(category)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn sample_job(uid: &str, title: &str) -> ParsedJob {
    use crate::models::job::JobInfo;

    ParsedJob {
        job_uid: Some(uid.to_string()),
        title: title.to_string(),
        url: Some(format!("https://www.upwork.com/jobs/{uid}")),
        posted_time: Some("Posted 1 hour ago".to_string()),
        job_info: JobInfo {
            job_type: Some("Fixed price".to_string()),
            budget: Some("1,500.00".to_string()),
            experience_level: Some("Intermediate".to_string()),
            ..Default::default()
        },
        description: Some(format!("{title} description")),
        skills: vec!["Rust".to_string(), "SQL".to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_add_job_ignores_duplicate_uid() {
        let pool = test_pool().await;
        let job = sample_job("~01", "Rust API");

        let first = add_job(&pool, None, &job).await.unwrap();
        let second = add_job(&pool, None, &job).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_jobs_without_uid_are_all_kept() {
        let pool = test_pool().await;
        let mut job = sample_job("~01", "No uid");
        job.job_uid = None;

        assert!(add_job(&pool, None, &job).await.unwrap().is_some());
        assert!(add_job(&pool, None, &job).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_get_job_round_trips_fields() {
        let pool = test_pool().await;
        let id = add_job(&pool, None, &sample_job("~02", "Scraper"))
            .await
            .unwrap()
            .unwrap();

        let row = get_job(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.job_title, "Scraper");
        assert_eq!(row.job_type.as_deref(), Some("Fixed price"));
        assert_eq!(row.skill_list(), vec!["Rust", "SQL"]);
        assert!(get_job(&pool, id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recent_jobs_caps_skills() {
        let pool = test_pool().await;
        let mut job = sample_job("~03", "Many skills");
        job.skills = (1..=8).map(|i| format!("skill-{i}")).collect();
        add_job(&pool, None, &job).await.unwrap();

        let jobs = recent_jobs(&pool, 10).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].skills.len(), 5);
        assert_eq!(jobs[0].skills[0], "skill-1");
    }

    #[tokio::test]
    async fn test_latest_jobs_newest_first() {
        let pool = test_pool().await;
        add_job(&pool, None, &sample_job("~a", "First")).await.unwrap();
        add_job(&pool, None, &sample_job("~b", "Second")).await.unwrap();

        let jobs = latest_jobs(&pool, 1).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_title, "Second");
    }

    #[tokio::test]
    async fn test_pending_cover_letter_lookup() {
        let pool = test_pool().await;
        assert!(latest_job_without_cover_letter(&pool).await.unwrap().is_none());

        let first = add_job(&pool, None, &sample_job("~a", "First"))
            .await
            .unwrap()
            .unwrap();
        let second = add_job(&pool, None, &sample_job("~b", "Second"))
            .await
            .unwrap()
            .unwrap();
        sqlx::query(
            "INSERT INTO cover_letters (job_id, ai_provider, cover_letter_text) VALUES (?, 'template', 'Hi')",
        )
        .bind(second)
        .execute(&pool)
        .await
        .unwrap();

        let pending = latest_job_without_cover_letter(&pool).await.unwrap().unwrap();
        assert_eq!(pending.id, first);
        assert_eq!(count_jobs_without_cover_letter(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_record_skill_keywords_upserts() {
        let pool = test_pool().await;
        let skills = vec!["Rust".to_string(), " ".to_string(), "SQL".to_string()];
        record_skill_keywords(&pool, &skills).await.unwrap();
        record_skill_keywords(&pool, &["Rust".to_string()]).await.unwrap();

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT keyword, frequency FROM keywords ORDER BY keyword")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(rows, vec![("Rust".to_string(), 2), ("SQL".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_record_metric() {
        let pool = test_pool().await;
        record_metric(&pool, "jobs_parsed", "12", Some("scraping"))
            .await
            .unwrap();

        let (name, value, category): (String, String, Option<String>) =
            sqlx::query_as("SELECT metric_name, metric_value, category FROM analytics")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(name, "jobs_parsed");
        assert_eq!(value, "12");
        assert_eq!(category.as_deref(), Some("scraping"));
    }
}
