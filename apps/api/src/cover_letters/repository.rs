use sqlx::SqlitePool;
use tracing::info;

use crate::errors::AppError;
use crate::models::cover_letter::{CoverLetterRow, CoverLetterStatus, CoverLetterWithJob};

const COVER_LETTER_COLUMNS: &str = "id, job_id, ai_provider, cover_letter_text, generated_timestamp, \
     COALESCE(status, 'generated') AS status, rating, notes";

pub async fn add_cover_letter(
    pool: &SqlitePool,
    job_id: i64,
    ai_provider: &str,
    text: &str,
    notes: Option<&str>,
) -> Result<i64, AppError> {
    let job_exists: Option<i64> = sqlx::query_scalar("SELECT id FROM jobs WHERE id = ?")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;
    if job_exists.is_none() {
        return Err(AppError::NotFound(format!("Job {job_id} not found")));
    }

    let result = sqlx::query(
        "INSERT INTO cover_letters (job_id, ai_provider, cover_letter_text, notes) VALUES (?, ?, ?, ?)",
    )
    .bind(job_id)
    .bind(ai_provider)
    .bind(text)
    .bind(notes)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    info!("Saved {ai_provider} cover letter {id} for job {job_id}");
    Ok(id)
}

/// Cover letters for one job, newest first.
pub async fn cover_letters_for_job(
    pool: &SqlitePool,
    job_id: i64,
) -> Result<Vec<CoverLetterRow>, sqlx::Error> {
    sqlx::query_as::<_, CoverLetterRow>(&format!(
        "SELECT {COVER_LETTER_COLUMNS} FROM cover_letters WHERE job_id = ? ORDER BY generated_timestamp DESC, id DESC"
    ))
    .bind(job_id)
    .fetch_all(pool)
    .await
}

pub async fn recent_cover_letters(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<CoverLetterWithJob>, sqlx::Error> {
    sqlx::query_as::<_, CoverLetterWithJob>(
        r#"
        SELECT cl.id, cl.job_id, cl.ai_provider, cl.cover_letter_text, cl.generated_timestamp,
               COALESCE(cl.status, 'generated') AS status, cl.rating, cl.notes,
               j.job_title, j.job_type, j.budget
        FROM cover_letters cl
        JOIN jobs j ON j.id = cl.job_id
        ORDER BY cl.generated_timestamp DESC, cl.id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Sets the review status. `rating` and `notes` are only overwritten when given.
pub async fn update_cover_letter_status(
    pool: &SqlitePool,
    id: i64,
    status: CoverLetterStatus,
    rating: Option<i64>,
    notes: Option<&str>,
) -> Result<(), AppError> {
    if let Some(rating) = rating {
        if !(1..=5).contains(&rating) {
            return Err(AppError::Validation(format!(
                "rating must be between 1 and 5, got {rating}"
            )));
        }
    }

    let result = sqlx::query(
        r#"
        UPDATE cover_letters
        SET status = ?, rating = COALESCE(?, rating), notes = COALESCE(?, notes)
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(rating)
    .bind(notes)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Cover letter {id} not found")));
    }
    Ok(())
}

pub async fn delete_cover_letter(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM cover_letters WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Cover letter {id} not found")));
    }
    info!("Deleted cover letter {id}");
    Ok(())
}
