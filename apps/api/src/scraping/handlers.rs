use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::errors::AppError;
use crate::extract::OptionalJson;
use crate::models::job::ParsedJob;
use crate::models::scrape::{NewScrape, ScrapeSummary};
use crate::scraping::ingest::{
    import_parsed_document, import_parsed_jobs, latest_browser_scrape, load_parsed_dir,
    migrate_html_dir, parse_scrape, save_latest_html_file, save_scrape, BulkImportReport,
    ImportReport, MigrationReport, ParsedDocument, SavedFile, ScrapeParseReport,
};
use crate::scraping::parser::{parse_html, ParseOutcome};
use crate::state::AppState;

#[derive(Serialize)]
pub struct CreatedScrape {
    pub scrape_id: i64,
}

#[derive(Deserialize, Default)]
pub struct LatestFileRequest {
    pub source_url: Option<String>,
}

/// Body of the directory endpoints. Without `dir` the configured directory is used.
#[derive(Deserialize, Default)]
pub struct DirectoryRequest {
    pub dir: Option<PathBuf>,
}

#[derive(Deserialize)]
pub struct PersistQuery {
    #[serde(default)]
    pub persist: bool,
}

#[derive(Deserialize)]
pub struct ParseRequest {
    pub html: String,
    pub source: Option<String>,
}

#[derive(Deserialize)]
pub struct ImportJobsRequest {
    pub scrape_id: Option<i64>,
    pub jobs: Vec<ParsedJob>,
}

#[derive(Deserialize)]
pub struct ImportDocumentRequest {
    pub document: ParsedDocument,
    pub file_path: Option<String>,
}

/// POST /api/v1/scrapes
pub async fn handle_save_scrape(
    State(state): State<AppState>,
    Json(mut req): Json<NewScrape>,
) -> Result<(StatusCode, Json<CreatedScrape>), AppError> {
    if req.raw_content.trim().is_empty() {
        return Err(AppError::Validation("raw_content cannot be empty".to_string()));
    }
    if req.source_url.is_none() {
        req.source_url = Some(state.config.default_source_url.clone());
    }
    let scrape_id = save_scrape(&state.db, &req).await?;
    Ok((StatusCode::CREATED, Json(CreatedScrape { scrape_id })))
}

/// POST /api/v1/scrapes/latest-file
pub async fn handle_save_latest_file(
    State(state): State<AppState>,
    req: OptionalJson<LatestFileRequest>,
) -> Result<(StatusCode, Json<SavedFile>), AppError> {
    let req = req.or_default();
    let source_url = req
        .source_url
        .unwrap_or_else(|| state.config.default_source_url.clone());
    let saved = save_latest_html_file(&state.db, &state.config.raw_html_dir, &source_url).await?;
    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /api/v1/scrapes/latest
pub async fn handle_latest_scrape(
    State(state): State<AppState>,
) -> Result<Json<ScrapeSummary>, AppError> {
    latest_browser_scrape(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No browser scrapes stored yet".to_string()))
}

/// POST /api/v1/scrapes/:id/parse
pub async fn handle_parse_scrape(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<PersistQuery>,
) -> Result<Json<ScrapeParseReport>, AppError> {
    let report = parse_scrape(&state.db, id, params.persist).await?;
    Ok(Json(report))
}

/// POST /api/v1/parse
pub async fn handle_parse_html(Json(req): Json<ParseRequest>) -> Result<Json<ParseOutcome>, AppError> {
    if req.html.trim().is_empty() {
        return Err(AppError::Validation("html cannot be empty".to_string()));
    }
    Ok(Json(parse_html(&req.html, req.source.as_deref())))
}

/// POST /api/v1/jobs/import
pub async fn handle_import_jobs(
    State(state): State<AppState>,
    Json(req): Json<ImportJobsRequest>,
) -> Result<Json<ImportReport>, AppError> {
    if req.jobs.iter().any(|job| job.title.trim().is_empty()) {
        return Err(AppError::Validation("every job needs a title".to_string()));
    }
    let report = import_parsed_jobs(&state.db, req.scrape_id, &req.jobs).await?;
    Ok(Json(report))
}

/// POST /api/v1/jobs/import-document
pub async fn handle_import_document(
    State(state): State<AppState>,
    Json(req): Json<ImportDocumentRequest>,
) -> Result<Json<ImportReport>, AppError> {
    let report = import_parsed_document(&state.db, &req.document, req.file_path).await?;
    Ok(Json(report))
}

/// POST /api/v1/scrapes/migrate
pub async fn handle_migrate_html(
    State(state): State<AppState>,
    req: OptionalJson<DirectoryRequest>,
) -> Result<Json<MigrationReport>, AppError> {
    let dir = req
        .or_default()
        .dir
        .unwrap_or_else(|| state.config.raw_html_dir.clone());
    let report = migrate_html_dir(&state.db, &dir).await?;
    Ok(Json(report))
}

/// POST /api/v1/jobs/import-directory
pub async fn handle_import_directory(
    State(state): State<AppState>,
    req: OptionalJson<DirectoryRequest>,
) -> Result<Json<BulkImportReport>, AppError> {
    let dir = req
        .or_default()
        .dir
        .unwrap_or_else(|| state.config.parsed_json_dir.clone());
    let report = load_parsed_dir(&state.db, &dir).await?;
    Ok(Json(report))
}
