//! Storing raw scrapes and turning them into job rows.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::jobs::repository::{add_job, record_metric, record_skill_keywords};
use crate::models::job::ParsedJob;
use crate::models::scrape::{
    NewScrape, ScrapeRow, ScrapeSummary, SCRAPE_TYPE_BROWSER, SCRAPE_TYPE_IMPORTED,
};
use crate::scraping::parser::{parse_html, parse_job_listings_lenient, PageMetadata};

/// Raw pages written by the browser capture script are named `browser_scrape_*.html`.
pub const BROWSER_SCRAPE_PREFIX: &str = "browser_scrape_";

/// Result of saving the newest raw HTML file from disk.
#[derive(Debug, Clone, Serialize)]
pub struct SavedFile {
    pub scrape_id: i64,
    pub file_path: String,
    pub content_length: usize,
    pub has_job_content: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScrapeParseReport {
    pub scrape_id: i64,
    pub metadata: PageMetadata,
    pub jobs_parsed: usize,
    pub jobs_added: usize,
    pub jobs: Vec<ParsedJob>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub scrape_id: Option<i64>,
    pub jobs_received: usize,
    pub jobs_added: usize,
}

/// A parser output document: page metadata (kept as-is) plus jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub jobs: Vec<ParsedJob>,
}

/// Outcome of migrating a directory of saved browser pages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub files_found: usize,
    pub files_processed: usize,
    pub total_jobs_migrated: usize,
    pub processed_files: Vec<String>,
    /// Already migrated, or no jobs could be read from them.
    pub skipped_files: Vec<String>,
    pub failed_files: Vec<String>,
}

/// Outcome of loading a directory of parser output documents.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkImportReport {
    pub files_found: usize,
    pub files_loaded: usize,
    pub jobs_added: usize,
    pub skipped_files: Vec<String>,
    pub failed_files: Vec<String>,
}

pub async fn save_scrape(pool: &SqlitePool, scrape: &NewScrape) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO scraped_data (scrape_type, source_url, raw_content, file_path, notes) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&scrape.scrape_type)
    .bind(&scrape.source_url)
    .bind(&scrape.raw_content)
    .bind(&scrape.file_path)
    .bind(&scrape.notes)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    info!(
        "Stored {} scrape {id} ({} bytes)",
        scrape.scrape_type,
        scrape.raw_content.len()
    );
    Ok(id)
}

pub async fn get_scrape(pool: &SqlitePool, id: i64) -> Result<ScrapeRow, AppError> {
    sqlx::query_as::<_, ScrapeRow>(
        r#"
        SELECT id, scrape_type, source_url, scrape_timestamp, raw_content, file_path,
               COALESCE(status, 'active') AS status, notes
        FROM scraped_data
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Scrape {id} not found")))
}

pub async fn latest_browser_scrape(pool: &SqlitePool) -> Result<Option<ScrapeSummary>, sqlx::Error> {
    sqlx::query_as::<_, ScrapeSummary>(
        r#"
        SELECT id, scrape_type, source_url, scrape_timestamp,
               LENGTH(raw_content) AS content_length, file_path,
               COALESCE(status, 'active') AS status, notes
        FROM scraped_data
        WHERE scrape_type = ?
        ORDER BY scrape_timestamp DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(SCRAPE_TYPE_BROWSER)
    .fetch_optional(pool)
    .await
}

async fn read_dir_or_not_found(dir: &Path) -> Result<tokio::fs::ReadDir, AppError> {
    match tokio::fs::read_dir(dir).await {
        Ok(entries) => Ok(entries),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::NotFound(format!(
            "Directory {} does not exist",
            dir.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Regular files in `dir` named `{prefix}*.{extension}`, sorted by name.
async fn list_files(dir: &Path, prefix: &str, extension: &str) -> Result<Vec<PathBuf>, AppError> {
    let mut entries = read_dir_or_not_found(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let matches_name = path.extension().and_then(|ext| ext.to_str()) == Some(extension)
            && file_name(&path).starts_with(prefix);
        if matches_name && entry.metadata().await?.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

async fn is_file_stored(pool: &SqlitePool, file_path: &str) -> Result<bool, sqlx::Error> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scraped_data WHERE file_path = ?")
        .bind(file_path)
        .fetch_one(pool)
        .await?;
    Ok(count > 0)
}

/// Newest `*.html` file in `dir` by modification time.
pub async fn find_latest_html_file(dir: &Path) -> Result<PathBuf, AppError> {
    let mut entries = read_dir_or_not_found(dir).await?;

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("html") {
            continue;
        }
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified()?;
        if latest.as_ref().map_or(true, |(newest, _)| modified > *newest) {
            latest = Some((modified, path));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| AppError::NotFound(format!("No HTML files found in {}", dir.display())))
}

/// Stores the newest raw HTML file as a browser scrape.
pub async fn save_latest_html_file(
    pool: &SqlitePool,
    dir: &Path,
    source_url: &str,
) -> Result<SavedFile, AppError> {
    let path = find_latest_html_file(dir).await?;
    info!("Loading latest raw HTML file {}", path.display());

    let html = tokio::fs::read_to_string(&path).await?;
    let content_length = html.chars().count();
    let name = file_name(&path);
    let has_job_content = looks_like_job_page(&html);
    if !has_job_content {
        warn!("{name} does not look like a job listing page");
    }

    let file_path = path.to_string_lossy().into_owned();
    let scrape_id = save_scrape(
        pool,
        &NewScrape {
            scrape_type: SCRAPE_TYPE_BROWSER.to_string(),
            raw_content: html,
            source_url: Some(source_url.to_string()),
            file_path: Some(file_path.clone()),
            notes: Some(format!(
                "Browser scrape from {name} - {content_length} chars"
            )),
        },
    )
    .await?;

    Ok(SavedFile {
        scrape_id,
        file_path,
        content_length,
        has_job_content,
    })
}

pub fn looks_like_job_page(html: &str) -> bool {
    html.contains("job-tile") || html.to_lowercase().contains("job")
}

/// Parses a stored scrape. With `persist`, jobs, skill keywords and a `jobs_parsed`
/// metric are written.
pub async fn parse_scrape(
    pool: &SqlitePool,
    scrape_id: i64,
    persist: bool,
) -> Result<ScrapeParseReport, AppError> {
    let scrape = get_scrape(pool, scrape_id).await?;
    let outcome = parse_html(&scrape.raw_content, scrape.file_path.as_deref());
    info!(
        "Parsed scrape {scrape_id}: {} jobs from {} bytes",
        outcome.jobs.len(),
        outcome.parsing_stats.html_length
    );

    let jobs_added = if persist {
        store_jobs(pool, Some(scrape_id), &outcome.jobs).await?
    } else {
        0
    };

    Ok(ScrapeParseReport {
        scrape_id,
        jobs_parsed: outcome.jobs.len(),
        jobs_added,
        metadata: outcome.metadata,
        jobs: outcome.jobs,
    })
}

/// Persists jobs parsed elsewhere. Without an explicit scrape they are linked to
/// the latest browser scrape, or left unlinked when there is none.
pub async fn import_parsed_jobs(
    pool: &SqlitePool,
    scrape_id: Option<i64>,
    jobs: &[ParsedJob],
) -> Result<ImportReport, AppError> {
    let scrape_id = match scrape_id {
        Some(id) => Some(get_scrape(pool, id).await?.id),
        None => latest_browser_scrape(pool).await?.map(|s| s.id),
    };
    if scrape_id.is_none() {
        warn!("No browser scrape to link {} imported jobs to", jobs.len());
    }

    let jobs_added = store_jobs(pool, scrape_id, jobs).await?;
    Ok(ImportReport {
        scrape_id,
        jobs_received: jobs.len(),
        jobs_added,
    })
}

/// Stores a parsed document as an `imported` scrape and inserts its jobs.
pub async fn import_parsed_document(
    pool: &SqlitePool,
    document: &ParsedDocument,
    file_path: Option<String>,
) -> Result<ImportReport, AppError> {
    let raw_content = serde_json::to_string(document)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to encode document: {e}")))?;
    let source_url = document
        .metadata
        .get("url")
        .and_then(|url| url.as_str())
        .filter(|url| !url.is_empty())
        .map(String::from);

    let scrape_id = save_scrape(
        pool,
        &NewScrape {
            scrape_type: SCRAPE_TYPE_IMPORTED.to_string(),
            raw_content,
            source_url,
            file_path,
            notes: Some(format!("Imported {} parsed jobs", document.jobs.len())),
        },
    )
    .await?;

    let jobs_added = store_jobs(pool, Some(scrape_id), &document.jobs).await?;
    Ok(ImportReport {
        scrape_id: Some(scrape_id),
        jobs_received: document.jobs.len(),
        jobs_added,
    })
}

/// Migrates every `browser_scrape_*.html` file in `dir` that is not stored yet.
///
/// Each file becomes a browser scrape and its jobs are read with the lenient parser.
/// A file that cannot be read or stored is logged and skipped.
pub async fn migrate_html_dir(pool: &SqlitePool, dir: &Path) -> Result<MigrationReport, AppError> {
    let files = list_files(dir, BROWSER_SCRAPE_PREFIX, "html").await?;
    info!("Found {} browser scrape HTML files in {}", files.len(), dir.display());

    let mut report = MigrationReport {
        files_found: files.len(),
        ..MigrationReport::default()
    };
    for path in files {
        let name = file_name(&path);
        match migrate_html_file(pool, &path).await {
            Ok(Some(jobs_added)) => {
                info!("Migrated {jobs_added} jobs from {name}");
                report.total_jobs_migrated += jobs_added;
                report.processed_files.push(name);
            }
            Ok(None) => report.skipped_files.push(name),
            Err(e) => {
                warn!("Failed to migrate {name}: {e}");
                report.failed_files.push(name);
            }
        }
    }
    report.files_processed = report.processed_files.len();

    info!(
        "Migration finished: {} jobs from {} files",
        report.total_jobs_migrated, report.files_processed
    );
    Ok(report)
}

/// Returns the number of jobs added, or `None` when the file was skipped.
async fn migrate_html_file(pool: &SqlitePool, path: &Path) -> Result<Option<usize>, AppError> {
    let file_path = path.to_string_lossy().into_owned();
    let name = file_name(path);
    if is_file_stored(pool, &file_path).await? {
        debug!("{name} was already migrated");
        return Ok(None);
    }

    let html = tokio::fs::read_to_string(path).await?;
    let jobs = parse_job_listings_lenient(&html);
    if jobs.is_empty() {
        info!("No jobs found in {name}");
        return Ok(None);
    }

    let scrape_id = save_scrape(
        pool,
        &NewScrape {
            scrape_type: SCRAPE_TYPE_BROWSER.to_string(),
            raw_content: html,
            source_url: Some(format!("file://{file_path}")),
            file_path: Some(file_path),
            notes: Some(format!("Migrated browser scrape from {name}")),
        },
    )
    .await?;

    Ok(Some(store_jobs(pool, Some(scrape_id), &jobs).await?))
}

/// Reads one parser output file and imports it as a document.
pub async fn load_parsed_file(pool: &SqlitePool, path: &Path) -> Result<ImportReport, AppError> {
    let text = tokio::fs::read_to_string(path).await?;
    let document: ParsedDocument = serde_json::from_str(&text)
        .map_err(|e| AppError::Parse(format!("{}: {e}", file_name(path))))?;
    import_parsed_document(pool, &document, Some(path.to_string_lossy().into_owned())).await
}

/// Loads every `*.json` parser output in `dir` that has not been imported before.
pub async fn load_parsed_dir(pool: &SqlitePool, dir: &Path) -> Result<BulkImportReport, AppError> {
    let files = list_files(dir, "", "json").await?;
    let mut report = BulkImportReport {
        files_found: files.len(),
        ..BulkImportReport::default()
    };

    for path in files {
        let name = file_name(&path);
        if is_file_stored(pool, &path.to_string_lossy()).await? {
            report.skipped_files.push(name);
            continue;
        }
        match load_parsed_file(pool, &path).await {
            Ok(imported) => {
                info!("Loaded {name}: {} jobs", imported.jobs_added);
                report.files_loaded += 1;
                report.jobs_added += imported.jobs_added;
            }
            Err(e) => {
                warn!("Error loading {name}: {e}");
                report.failed_files.push(name);
            }
        }
    }

    Ok(report)
}

async fn store_jobs(
    pool: &SqlitePool,
    scrape_id: Option<i64>,
    jobs: &[ParsedJob],
) -> Result<usize, sqlx::Error> {
    let mut added = 0;
    for job in jobs {
        if add_job(pool, scrape_id, job).await?.is_some() {
            added += 1;
            record_skill_keywords(pool, &job.skills).await?;
        }
    }

    record_metric(pool, "jobs_parsed", &added.to_string(), Some("scraping")).await?;
    info!(
        "Stored {added} of {} jobs ({} duplicates skipped)",
        jobs.len(),
        jobs.len() - added
    );
    Ok(added)
}
