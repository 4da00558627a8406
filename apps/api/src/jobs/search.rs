use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::models::job::decode_skills;

const DESCRIPTION_PREVIEW_CHARS: usize = 200;
const DEFAULT_SEARCH_LIMIT: i64 = 100;

/// Filters for `GET /api/v1/jobs/search`. Every filter is optional; they combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSearch {
    pub keyword: Option<String>,
    pub job_type: Option<String>,
    /// Compared against the fixed budget or, for hourly jobs, the top of the rate range.
    pub min_budget: Option<f64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub job_type: Option<String>,
    pub budget: Option<String>,
    pub hourly_rate_min: Option<String>,
    pub hourly_rate_max: Option<String>,
    pub experience_level: Option<String>,
    pub skills: Vec<String>,
    pub description: Option<String>,
    pub parsed_timestamp: DateTime<Utc>,
}

#[derive(FromRow)]
struct SearchRow {
    id: i64,
    job_title: String,
    job_url: Option<String>,
    job_type: Option<String>,
    budget: Option<String>,
    hourly_rate_min: Option<String>,
    hourly_rate_max: Option<String>,
    experience_level: Option<String>,
    skills: Option<String>,
    description: Option<String>,
    parsed_timestamp: DateTime<Utc>,
}

pub async fn search_jobs(pool: &SqlitePool, search: &JobSearch) -> Result<Vec<SearchHit>, sqlx::Error> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT id, job_title, job_url, job_type, budget, hourly_rate_min, hourly_rate_max, \
         experience_level, skills, description, parsed_timestamp FROM jobs WHERE 1 = 1",
    );

    if let Some(keyword) = search.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        let pattern = format!("%{keyword}%");
        query
            .push(" AND (job_title LIKE ")
            .push_bind(pattern.clone())
            .push(" OR description LIKE ")
            .push_bind(pattern.clone())
            .push(" OR skills LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(job_type) = search.job_type.as_deref().filter(|t| !t.is_empty()) {
        query.push(" AND job_type = ").push_bind(job_type.to_string());
    }

    if let Some(min_budget) = search.min_budget {
        query
            .push(" AND (CAST(REPLACE(budget, ',', '') AS REAL) >= ")
            .push_bind(min_budget)
            .push(" OR CAST(REPLACE(hourly_rate_max, ',', '') AS REAL) >= ")
            .push_bind(min_budget)
            .push(")");
    }

    query
        .push(" ORDER BY parsed_timestamp DESC, id DESC LIMIT ")
        .push_bind(search.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).max(1));

    let rows: Vec<SearchRow> = query.build_query_as().fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| SearchHit {
            id: row.id,
            title: row.job_title,
            url: row.job_url,
            job_type: row.job_type,
            budget: row.budget,
            hourly_rate_min: row.hourly_rate_min,
            hourly_rate_max: row.hourly_rate_max,
            experience_level: row.experience_level,
            skills: decode_skills(row.skills.as_deref()),
            description: row.description.as_deref().map(preview),
            parsed_timestamp: row.parsed_timestamp,
        })
        .collect())
}

fn preview(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_PREVIEW_CHARS {
        return text.to_string();
    }
    let head: String = text.chars().take(DESCRIPTION_PREVIEW_CHARS).collect();
    format!("{head}...")
}
