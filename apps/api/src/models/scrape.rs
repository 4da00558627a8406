use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Where a scrape came from. Stored as lowercase text in `scraped_data.scrape_type`.
pub const SCRAPE_TYPE_BROWSER: &str = "browser";
pub const SCRAPE_TYPE_IMPORTED: &str = "imported";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScrapeRow {
    pub id: i64,
    pub scrape_type: String,
    pub source_url: Option<String>,
    pub scrape_timestamp: DateTime<Utc>,
    pub raw_content: String,
    pub file_path: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}

/// Scrape metadata without the (large) raw HTML body.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScrapeSummary {
    pub id: i64,
    pub scrape_type: String,
    pub source_url: Option<String>,
    pub scrape_timestamp: DateTime<Utc>,
    pub content_length: i64,
    pub file_path: Option<String>,
    pub status: String,
    pub notes: Option<String>,
}

/// Input for a new row in `scraped_data`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScrape {
    #[serde(default = "default_scrape_type")]
    pub scrape_type: String,
    pub raw_content: String,
    pub source_url: Option<String>,
    pub file_path: Option<String>,
    pub notes: Option<String>,
}

fn default_scrape_type() -> String {
    SCRAPE_TYPE_BROWSER.to_string()
}
