use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use tracing::info;

/// Tables counted by [`database_stats`], in report order.
pub const PIPELINE_TABLES: &[&str] = &[
    "scraped_data",
    "jobs",
    "proposals",
    "cover_letters",
    "analytics",
    "keywords",
    "chat_sessions",
    "chat_messages",
];

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS scraped_data (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scrape_type TEXT NOT NULL,
        source_url TEXT,
        scrape_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        raw_content TEXT NOT NULL,
        file_path TEXT,
        status TEXT DEFAULT 'active',
        notes TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scrape_id INTEGER,
        job_uid TEXT UNIQUE,
        job_title TEXT NOT NULL,
        job_url TEXT,
        posted_time TEXT,
        job_type TEXT,
        experience_level TEXT,
        budget TEXT,
        hourly_rate_min TEXT,
        hourly_rate_max TEXT,
        duration TEXT,
        skills TEXT,
        description TEXT,
        parsed_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (scrape_id) REFERENCES scraped_data (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS proposals (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scrape_id INTEGER,
        job_title TEXT,
        proposal_text TEXT,
        bid_amount TEXT,
        proposal_status TEXT,
        submitted_date TEXT,
        client_feedback TEXT,
        response_rate TEXT,
        parsed_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (scrape_id) REFERENCES scraped_data (id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS analytics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        metric_name TEXT NOT NULL,
        metric_value TEXT NOT NULL,
        metric_date TEXT DEFAULT CURRENT_DATE,
        category TEXT,
        created_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS keywords (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        keyword TEXT NOT NULL UNIQUE,
        category TEXT,
        frequency INTEGER DEFAULT 1,
        last_seen DATETIME DEFAULT CURRENT_TIMESTAMP,
        importance_score REAL DEFAULT 1.0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cover_letters (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        job_id INTEGER NOT NULL,
        ai_provider TEXT NOT NULL,
        cover_letter_text TEXT NOT NULL,
        generated_timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
        status TEXT DEFAULT 'generated',
        rating INTEGER,
        notes TEXT,
        FOREIGN KEY (job_id) REFERENCES jobs (id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_sessions (
        session_id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        platform TEXT NOT NULL DEFAULT 'upwork',
        participant TEXT,
        phase TEXT,
        phase_confidence REAL,
        phase_updated_at DATETIME,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        last_activity DATETIME DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS chat_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        sender_type TEXT NOT NULL,
        text TEXT NOT NULL,
        sent_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        FOREIGN KEY (session_id) REFERENCES chat_sessions (session_id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS maintenance_runs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ran_at DATETIME DEFAULT CURRENT_TIMESTAMP,
        status TEXT NOT NULL,
        scrapes_kept INTEGER NOT NULL DEFAULT 0,
        details TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_scraped_data_type_ts ON scraped_data (scrape_type, scrape_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_scrape_id ON jobs (scrape_id)",
    "CREATE INDEX IF NOT EXISTS idx_jobs_parsed_ts ON jobs (parsed_timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_cover_letters_job_id ON cover_letters (job_id)",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages (session_id, id)",
];

/// Creates the SQLite connection pool and makes sure the schema exists.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    info!("Connecting to SQLite at {database_url}...");

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("Invalid DATABASE_URL: {database_url}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .context("Failed to open SQLite database")?;

    init_schema(&pool).await?;

    info!("SQLite connection pool established");
    Ok(pool)
}

/// Creates every table and index if missing. Idempotent.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to apply schema")?;
    }
    Ok(())
}

/// Row counts and size information for the whole database.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DatabaseStats {
    pub table_counts: Vec<TableCount>,
    pub db_size_mb: f64,
    pub oldest_scrape: Option<String>,
    pub newest_scrape: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TableCount {
    pub table: String,
    pub count: i64,
}

impl DatabaseStats {
    pub fn count(&self, table: &str) -> i64 {
        self.table_counts
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.count)
            .unwrap_or(0)
    }
}

pub async fn database_stats(pool: &SqlitePool) -> Result<DatabaseStats, sqlx::Error> {
    let mut table_counts = Vec::with_capacity(PIPELINE_TABLES.len());
    for table in PIPELINE_TABLES {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
        table_counts.push(TableCount {
            table: table.to_string(),
            count,
        });
    }

    let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
        .fetch_one(pool)
        .await?;
    let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
        .fetch_one(pool)
        .await?;
    let db_size_mb = round2((page_count * page_size) as f64 / 1024.0 / 1024.0);

    let (oldest_scrape, newest_scrape): (Option<String>, Option<String>) = sqlx::query_as(
        "SELECT CAST(MIN(scrape_timestamp) AS TEXT), CAST(MAX(scrape_timestamp) AS TEXT) FROM scraped_data",
    )
    .fetch_one(pool)
    .await?;

    Ok(DatabaseStats {
        table_counts,
        db_size_mb,
        oldest_scrape,
        newest_scrape,
    })
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Single-connection in-memory pool with the full schema, for tests.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    pool
}
