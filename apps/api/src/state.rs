use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::chat::phase::{KeywordPhaseClassifier, LlmPhaseClassifier, PhaseClassifier};
use crate::chat::responses::{ChatResponder, LlmChatResponder};
use crate::config::Config;
use crate::cover_letters::writer::{
    CoverLetterWriter, LlmCoverLetterWriter, TemplateCoverLetterWriter,
};
use crate::llm_client::{self, LlmClient};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    /// Default: KeywordPhaseClassifier. Swap via ENABLE_LLM_PHASE_CLASSIFIER.
    pub phase_classifier: Arc<dyn PhaseClassifier>,
    /// Template writer unless an Anthropic key is configured.
    pub cover_letter_writer: Arc<dyn CoverLetterWriter>,
    /// `None` means `ai` replies fall back to templates.
    pub chat_responder: Option<Arc<dyn ChatResponder>>,
}

impl AppState {
    /// Picks the generation backends from `config`.
    pub fn new(db: SqlitePool, config: Config) -> Result<Self> {
        let llm = match &config.anthropic_api_key {
            Some(key) => {
                let client = LlmClient::new(key.clone())?;
                info!("LLM client initialized (model: {})", llm_client::MODEL);
                Some(client)
            }
            None => {
                info!("ANTHROPIC_API_KEY not set, using template generators");
                None
            }
        };

        let phase_classifier: Arc<dyn PhaseClassifier> =
            match (&llm, config.llm_phase_classifier) {
                (Some(client), true) => Arc::new(LlmPhaseClassifier(client.clone())),
                (None, true) => {
                    warn!("ENABLE_LLM_PHASE_CLASSIFIER needs ANTHROPIC_API_KEY, using keywords");
                    Arc::new(KeywordPhaseClassifier)
                }
                _ => Arc::new(KeywordPhaseClassifier),
            };

        let cover_letter_writer: Arc<dyn CoverLetterWriter> = match &llm {
            Some(client) => Arc::new(LlmCoverLetterWriter(client.clone())),
            None => Arc::new(TemplateCoverLetterWriter),
        };

        let chat_responder = llm
            .map(|client| Arc::new(LlmChatResponder(client)) as Arc<dyn ChatResponder>);

        Ok(Self {
            db,
            config,
            phase_classifier,
            cover_letter_writer,
            chat_responder,
        })
    }
}
