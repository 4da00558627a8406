//! Cover letter writers: pluggable, trait-based generators for a single job.
//!
//! Default: `TemplateCoverLetterWriter` (deterministic, no network).
//! `LlmCoverLetterWriter` continues the same prompt through the Anthropic API and is
//! selected at startup when an API key is configured.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::cover_letters::prompts::{
    cover_letter_prompt, letter_opening, COVER_LETTER_MARKER, COVER_LETTER_SYSTEM,
};
use crate::cover_letters::repository::add_cover_letter;
use crate::errors::AppError;
use crate::jobs::repository::{count_jobs_without_cover_letter, latest_job_without_cover_letter};
use crate::llm_client::LlmClient;
use crate::models::job::JobRow;
use crate::scraping::fields::HOURLY;

const MAX_SENTENCES: usize = 6;
const MIN_SENTENCE_CHARS: usize = 10;
const SIGNATURE: &str = "\n\nBest regards,\n[Your Name]";
const SIGN_OFFS: &[&str] = &["Best regards", "Sincerely", "Thank you"];

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Carried in `AppState` as `Arc<dyn CoverLetterWriter>`.
#[async_trait]
pub trait CoverLetterWriter: Send + Sync {
    /// Stored in `cover_letters.ai_provider`.
    fn provider(&self) -> &'static str;

    async fn write(&self, job: &JobRow) -> Result<String, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// TemplateCoverLetterWriter
// ────────────────────────────────────────────────────────────────────────────

pub struct TemplateCoverLetterWriter;

#[async_trait]
impl CoverLetterWriter for TemplateCoverLetterWriter {
    fn provider(&self) -> &'static str {
        "template"
    }

    async fn write(&self, job: &JobRow) -> Result<String, AppError> {
        Ok(clean_cover_letter(&template_letter(job)))
    }
}

fn template_letter(job: &JobRow) -> String {
    let mut sentences = vec![letter_opening(&job.job_title)];

    let skills = job.skill_list();
    if skills.is_empty() {
        sentences.push(
            "I have delivered projects like this before and know what it takes to ship them well."
                .to_string(),
        );
    } else {
        let skills = skills.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        sentences.push(format!(
            "I work with {skills} every day and have delivered similar projects for other clients."
        ));
    }

    match (job.job_type.as_deref(), &job.budget, &job.hourly_rate_max) {
        (Some(HOURLY), _, Some(max)) => {
            let min = job.hourly_rate_min.as_deref().unwrap_or(max);
            sentences.push(format!(
                "The posted rate of ${min} to ${max} per hour works well for me."
            ));
        }
        (_, Some(budget), _) => {
            sentences.push(format!("The ${budget} budget fits the scope as described."));
        }
        _ => {}
    }

    if let Some(level) = &job.experience_level {
        sentences.push(format!(
            "My background matches the {level} level you are looking for."
        ));
    }

    sentences.push(
        "I would be glad to discuss the details and can start right away.".to_string(),
    );
    sentences.join(" ")
}

// ────────────────────────────────────────────────────────────────────────────
// LlmCoverLetterWriter
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmCoverLetterWriter(pub LlmClient);

#[async_trait]
impl CoverLetterWriter for LlmCoverLetterWriter {
    fn provider(&self) -> &'static str {
        "anthropic"
    }

    async fn write(&self, job: &JobRow) -> Result<String, AppError> {
        let prompt = cover_letter_prompt(job);
        let response = self
            .0
            .call(&prompt, COVER_LETTER_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))?;
        let continuation = response
            .text()
            .ok_or_else(|| AppError::Llm("empty cover letter response".to_string()))?;

        let letter = if continuation.contains(COVER_LETTER_MARKER) {
            continuation.to_string()
        } else {
            format!("{}\n{}", letter_opening(&job.job_title), continuation)
        };
        Ok(clean_cover_letter(&letter))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Text cleanup
// ────────────────────────────────────────────────────────────────────────────

/// Normalizes generated letter text.
///
/// Keeps what follows the "Cover Letter:" marker, keeps a leading "Dear ...," greeting
/// on its own line, then keeps at most six sentences longer than ten characters with
/// whitespace collapsed. The result ends in sentence punctuation and gets a signature
/// unless it already signs off.
pub fn clean_cover_letter(text: &str) -> String {
    let text = match text.split_once(COVER_LETTER_MARKER) {
        Some((_, after)) => after,
        None => text,
    }
    .trim();

    let (greeting, body) = split_greeting(text);

    let mut result = split_sentences(body)
        .into_iter()
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| s.chars().count() > MIN_SENTENCE_CHARS)
        .take(MAX_SENTENCES)
        .collect::<Vec<_>>()
        .join(" ");

    if !result.is_empty() && !result.ends_with(['.', '!', '?']) {
        result.push('.');
    }

    let mut letter = match greeting {
        Some(greeting) => format!("{greeting}\n\n{result}"),
        None => result,
    };
    if !SIGN_OFFS.iter().any(|phrase| letter.contains(phrase)) {
        letter.push_str(SIGNATURE);
    }
    letter
}

fn split_greeting(text: &str) -> (Option<&str>, &str) {
    if let Some((first, rest)) = text.split_once('\n') {
        let first = first.trim();
        if first.starts_with("Dear ") && first.ends_with(',') {
            return (Some(first), rest);
        }
    }
    (None, text)
}

/// Splits on `.`, `!` or `?` followed by whitespace or the end of the text.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                sentences.push(text[start..end].trim());
                start = end;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline step
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// Every job already has a cover letter.
    NothingToDo { pending: i64 },
    Generated {
        cover_letter_id: i64,
        job_id: i64,
        job_title: String,
        ai_provider: String,
        cover_letter_text: String,
        /// Jobs still waiting after this one.
        pending: i64,
    },
}

/// Writes and stores a cover letter for the most recent job that has none.
pub async fn generate_for_next_job(
    pool: &SqlitePool,
    writer: &dyn CoverLetterWriter,
) -> Result<GenerationOutcome, AppError> {
    let Some(job) = latest_job_without_cover_letter(pool).await? else {
        info!("All jobs already have cover letters");
        return Ok(GenerationOutcome::NothingToDo { pending: 0 });
    };

    info!(
        "Generating {} cover letter for job {}: {}",
        writer.provider(),
        job.id,
        job.job_title
    );
    let text = writer.write(&job).await?;

    let notes = format!("Generated on {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    let cover_letter_id =
        add_cover_letter(pool, job.id, writer.provider(), &text, Some(&notes)).await?;
    let pending = count_jobs_without_cover_letter(pool).await?;

    Ok(GenerationOutcome::Generated {
        cover_letter_id,
        job_id: job.id,
        job_title: job.job_title,
        ai_provider: writer.provider().to_string(),
        cover_letter_text: text,
        pending,
    })
}
