use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Fields pulled out of the job-info list of a tile (type, rate, budget, level, duration).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate_min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hourly_rate_max: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// A job posting as extracted from HTML, before it is stored.
///
/// The JSON shape (`title`, `url`, `job_info.type`, ...) is also the import format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedJob {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_uid: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_time: Option<String>,
    #[serde(default)]
    pub job_info: JobInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: i64,
    pub scrape_id: Option<i64>,
    pub job_uid: Option<String>,
    pub job_title: String,
    pub job_url: Option<String>,
    pub posted_time: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub budget: Option<String>,
    pub hourly_rate_min: Option<String>,
    pub hourly_rate_max: Option<String>,
    pub duration: Option<String>,
    /// JSON array text. Read through [`JobRow::skill_list`].
    pub skills: Option<String>,
    pub description: Option<String>,
    pub parsed_timestamp: DateTime<Utc>,
}

impl JobRow {
    /// Decodes the stored skills array. Malformed JSON yields an empty list.
    pub fn skill_list(&self) -> Vec<String> {
        decode_skills(self.skills.as_deref())
    }
}

pub fn decode_skills(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

/// API view of a stored job with skills decoded.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: i64,
    pub scrape_id: Option<i64>,
    pub job_uid: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub posted_time: Option<String>,
    pub job_type: Option<String>,
    pub experience_level: Option<String>,
    pub budget: Option<String>,
    pub hourly_rate_min: Option<String>,
    pub hourly_rate_max: Option<String>,
    pub duration: Option<String>,
    pub skills: Vec<String>,
    pub description: Option<String>,
    pub parsed_timestamp: DateTime<Utc>,
}

impl From<JobRow> for JobView {
    fn from(row: JobRow) -> Self {
        let skills = row.skill_list();
        JobView {
            id: row.id,
            scrape_id: row.scrape_id,
            job_uid: row.job_uid,
            title: row.job_title,
            url: row.job_url,
            posted_time: row.posted_time,
            job_type: row.job_type,
            experience_level: row.experience_level,
            budget: row.budget,
            hourly_rate_min: row.hourly_rate_min,
            hourly_rate_max: row.hourly_rate_max,
            duration: row.duration,
            skills,
            description: row.description,
            parsed_timestamp: row.parsed_timestamp,
        }
    }
}

/// Minimal job tuple handed to downstream generators.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct JobBrief {
    pub id: i64,
    pub job_title: String,
    pub description: Option<String>,
}
