pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::cover_letters::handlers as cover_letters;
use crate::jobs::handlers as jobs;
use crate::maintenance::handlers as maintenance;
use crate::proposals::handlers as proposals;
use crate::scraping::handlers as scraping;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Scrapes and parsing
        .route("/api/v1/scrapes", post(scraping::handle_save_scrape))
        .route(
            "/api/v1/scrapes/latest-file",
            post(scraping::handle_save_latest_file),
        )
        .route("/api/v1/scrapes/latest", get(scraping::handle_latest_scrape))
        .route("/api/v1/scrapes/migrate", post(scraping::handle_migrate_html))
        .route("/api/v1/scrapes/:id/parse", post(scraping::handle_parse_scrape))
        .route("/api/v1/parse", post(scraping::handle_parse_html))
        .route("/api/v1/jobs/import", post(scraping::handle_import_jobs))
        .route(
            "/api/v1/jobs/import-document",
            post(scraping::handle_import_document),
        )
        .route(
            "/api/v1/jobs/import-directory",
            post(scraping::handle_import_directory),
        )
        // Jobs and reporting
        .route("/api/v1/jobs", get(jobs::handle_list_jobs))
        .route("/api/v1/jobs/search", get(jobs::handle_search_jobs))
        .route(
            "/api/v1/jobs/pending-cover-letter",
            get(jobs::handle_pending_cover_letter),
        )
        .route("/api/v1/jobs/:id", get(jobs::handle_get_job))
        .route(
            "/api/v1/jobs/:id/cover-letters",
            get(jobs::handle_job_cover_letters),
        )
        .route("/api/v1/stats", get(jobs::handle_dashboard_stats))
        .route("/api/v1/export", get(jobs::handle_export))
        .route(
            "/api/v1/proposals",
            post(proposals::handle_add_proposal).get(proposals::handle_list_proposals),
        )
        // Cover letters
        .route(
            "/api/v1/cover-letters/generate",
            post(cover_letters::handle_generate),
        )
        .route("/api/v1/cover-letters", get(cover_letters::handle_recent))
        .route(
            "/api/v1/cover-letters/:id",
            patch(cover_letters::handle_update_status).delete(cover_letters::handle_delete),
        )
        // Chat
        .route(
            "/api/v1/chat/sessions",
            post(chat::handle_create_session).get(chat::handle_list_sessions),
        )
        .route(
            "/api/v1/chat/sessions/:id/messages",
            post(chat::handle_add_message),
        )
        .route(
            "/api/v1/chat/sessions/:id/phase",
            post(chat::handle_detect_phase),
        )
        .route(
            "/api/v1/chat/sessions/:id/respond",
            post(chat::handle_respond),
        )
        .route("/api/v1/chat/phase/predict", post(chat::handle_predict))
        // Maintenance
        .route(
            "/api/v1/maintenance/cleanup",
            post(maintenance::handle_cleanup),
        )
        .route("/api/v1/maintenance/status", get(maintenance::handle_status))
        .with_state(state)
}
