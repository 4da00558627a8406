use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default except the optional Anthropic key.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub raw_html_dir: PathBuf,
    /// Directory of parser output documents loaded by the bulk import.
    pub parsed_json_dir: PathBuf,
    pub default_source_url: String,
    /// Enables the LLM cover letter writer and chat responder when present.
    pub anthropic_api_key: Option<String>,
    /// Classify chat phases with the model instead of cue phrases. Needs the API key.
    pub llm_phase_classifier: bool,
    pub cleanup: CleanupConfig,
}

/// Retention and schedule settings for database maintenance.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub enabled: bool,
    pub keep_scrapes: u32,
    pub analytics_retention_days: u32,
    pub min_keyword_frequency: u32,
    pub interval_hours: u32,
    pub vacuum: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_scrapes: 50,
            analytics_retention_days: 30,
            min_keyword_frequency: 1,
            interval_hours: 24,
            vacuum: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = CleanupConfig::default();

        Ok(Config {
            database_url: env_or("DATABASE_URL", "sqlite://upwork_data.db?mode=rwc"),
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            raw_html_dir: PathBuf::from(env_or("RAW_HTML_DIR", "data/data_raw")),
            parsed_json_dir: PathBuf::from(env_or("PARSED_JSON_DIR", "data/data_parsed")),
            default_source_url: env_or(
                "DEFAULT_SOURCE_URL",
                "https://www.upwork.com/search/jobs/",
            ),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            llm_phase_classifier: parse_env("ENABLE_LLM_PHASE_CLASSIFIER", false)?,
            cleanup: CleanupConfig {
                enabled: parse_env("CLEANUP_ENABLED", defaults.enabled)?,
                keep_scrapes: parse_env("KEEP_SCRAPES", defaults.keep_scrapes)?,
                analytics_retention_days: parse_env(
                    "ANALYTICS_RETENTION_DAYS",
                    defaults.analytics_retention_days,
                )?,
                min_keyword_frequency: parse_env(
                    "MIN_KEYWORD_FREQUENCY",
                    defaults.min_keyword_frequency,
                )?,
                interval_hours: parse_env("CLEANUP_INTERVAL_HOURS", defaults.interval_hours)?,
                vacuum: parse_env("VACUUM_ON_CLEANUP", defaults.vacuum)?,
            },
        })
    }
}

/// Fixed configuration for tests: no API key, cleanup without VACUUM.
#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "sqlite::memory:".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
        raw_html_dir: PathBuf::from("data/data_raw"),
        parsed_json_dir: PathBuf::from("data/data_parsed"),
        default_source_url: "https://www.upwork.com/search/jobs/".to_string(),
        anthropic_api_key: None,
        llm_phase_classifier: false,
        cleanup: CleanupConfig {
            vacuum: false,
            ..CleanupConfig::default()
        },
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}
