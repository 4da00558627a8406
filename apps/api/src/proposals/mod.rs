pub mod handlers;

use sqlx::SqlitePool;

use crate::errors::AppError;
use crate::models::proposal::{NewProposal, ProposalRow};
use crate::scraping::ingest::get_scrape;

pub(crate) const PROPOSAL_COLUMNS: &str = "id, scrape_id, job_title, proposal_text, bid_amount, \
     proposal_status, submitted_date, client_feedback, response_rate, parsed_timestamp";

/// Stores a proposal. A given `scrape_id` must refer to a stored scrape.
pub async fn add_proposal(
    pool: &SqlitePool,
    scrape_id: Option<i64>,
    proposal: &NewProposal,
) -> Result<i64, AppError> {
    if let Some(id) = scrape_id {
        get_scrape(pool, id).await?;
    }

    let result = sqlx::query(
        r#"
        INSERT INTO proposals
            (scrape_id, job_title, proposal_text, bid_amount, proposal_status,
             submitted_date, client_feedback, response_rate)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(scrape_id)
    .bind(&proposal.job_title)
    .bind(&proposal.text)
    .bind(&proposal.bid_amount)
    .bind(&proposal.status)
    .bind(&proposal.submitted_date)
    .bind(&proposal.client_feedback)
    .bind(&proposal.response_rate)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn recent_proposals(pool: &SqlitePool, limit: i64) -> Result<Vec<ProposalRow>, sqlx::Error> {
    sqlx::query_as::<_, ProposalRow>(&format!(
        "SELECT {PROPOSAL_COLUMNS} FROM proposals ORDER BY parsed_timestamp DESC, id DESC LIMIT ?"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}
