//! Conversation phase detection.
//!
//! `AppState` holds an `Arc<dyn PhaseClassifier>`. The default `KeywordPhaseClassifier`
//! scores cue phrases per phase, weights later messages higher and turns the scores
//! into probabilities with a softmax. `LlmPhaseClassifier` asks the model for a label
//! instead and is opt-in via `ENABLE_LLM_PHASE_CLASSIFIER`.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::chat::prompts::phase_classification_prompt;
use crate::chat::repository::{build_context, recent_messages, resolve_session, update_session_phase};
use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::LlmClient;

/// Messages fed to the classifier when detecting a session's phase.
pub const PHASE_CONTEXT_MESSAGES: i64 = 10;

// ────────────────────────────────────────────────────────────────────────────
// Phase labels
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InitialResponse,
    AskDetails,
    KnowledgeCheck,
    LanguageConfirm,
    RateNegotiation,
    DeadlineSamples,
    StructureClarification,
    ContractAcceptance,
    // Only used to pick response templates, never predicted.
    ScopeClarification,
    TimelineDiscussion,
    RequirementsDiscussion,
    ProjectAcceptance,
    FollowUp,
    GeneralInquiry,
}

impl Phase {
    /// Labels a classifier can predict, in tie-break order.
    pub const CLASSIFIER_LABELS: [Phase; 8] = [
        Phase::InitialResponse,
        Phase::AskDetails,
        Phase::KnowledgeCheck,
        Phase::LanguageConfirm,
        Phase::RateNegotiation,
        Phase::DeadlineSamples,
        Phase::StructureClarification,
        Phase::ContractAcceptance,
    ];

    const ALL: [Phase; 14] = [
        Phase::InitialResponse,
        Phase::AskDetails,
        Phase::KnowledgeCheck,
        Phase::LanguageConfirm,
        Phase::RateNegotiation,
        Phase::DeadlineSamples,
        Phase::StructureClarification,
        Phase::ContractAcceptance,
        Phase::ScopeClarification,
        Phase::TimelineDiscussion,
        Phase::RequirementsDiscussion,
        Phase::ProjectAcceptance,
        Phase::FollowUp,
        Phase::GeneralInquiry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::InitialResponse => "initial_response",
            Phase::AskDetails => "ask_details",
            Phase::KnowledgeCheck => "knowledge_check",
            Phase::LanguageConfirm => "language_confirm",
            Phase::RateNegotiation => "rate_negotiation",
            Phase::DeadlineSamples => "deadline_samples",
            Phase::StructureClarification => "structure_clarification",
            Phase::ContractAcceptance => "contract_acceptance",
            Phase::ScopeClarification => "scope_clarification",
            Phase::TimelineDiscussion => "timeline_discussion",
            Phase::RequirementsDiscussion => "requirements_discussion",
            Phase::ProjectAcceptance => "project_acceptance",
            Phase::FollowUp => "follow_up",
            Phase::GeneralInquiry => "general_inquiry",
        }
    }

    pub fn from_label(label: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|phase| phase.as_str() == label)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Classifier trait
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasePrediction {
    pub phase: Phase,
    /// Probability of `phase`, rounded to 4 decimals.
    pub confidence: f64,
    pub all_probabilities: BTreeMap<String, f64>,
    pub model_type: String,
}

#[async_trait]
pub trait PhaseClassifier: Send + Sync {
    async fn predict(&self, context: &str) -> Result<PhasePrediction, AppError>;

    async fn predict_batch(&self, contexts: &[String]) -> Result<Vec<PhasePrediction>, AppError> {
        let mut predictions = Vec::with_capacity(contexts.len());
        for context in contexts {
            predictions.push(self.predict(context).await?);
        }
        Ok(predictions)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordPhaseClassifier
// ────────────────────────────────────────────────────────────────────────────

/// Cue phrases per classifier label, already normalized (lowercase words, single spaces).
const PHASE_CUES: [(Phase, &[&str]); 8] = [
    (
        Phase::InitialResponse,
        &[
            "hello", "hey", "available", "are you free", "saw your application",
            "saw your proposal", "interested in working", "reaching out",
        ],
    ),
    (
        Phase::AskDetails,
        &[
            "can you handle", "we need content", "technical topics", "more details",
            "experience with", "portfolio", "project involves", "tell me about",
        ],
    ),
    (
        Phase::KnowledgeCheck,
        &[
            "explain", "rtp", "how does", "what does", "difference between", "what is",
            "familiar with", "do you know",
        ],
    ),
    (
        Phase::LanguageConfirm,
        &[
            "language", "languages", "english", "dutch", "german", "spanish", "native",
            "fluent", "translate",
        ],
    ),
    (
        Phase::RateNegotiation,
        &[
            "budget", "rate", "rates", "$", "per word", "per hour", "price", "pricing",
            "pay", "cost",
        ],
    ),
    (
        Phase::DeadlineSamples,
        &[
            "deadline", "first batch", "by monday", "by friday", "deliver", "delivery",
            "timeline", "sample", "samples", "asap", "when can you",
        ],
    ),
    (
        Phase::StructureClarification,
        &[
            "h1", "h2", "h2s", "h3", "faq", "seo", "structure", "format", "headings",
            "section", "word count",
        ],
    ),
    (
        Phase::ContractAcceptance,
        &[
            "contract", "accept", "accepted", "offer", "hire", "hired", "milestone",
            "to start", "sending the",
        ],
    ),
];

/// Deterministic, dependency-free classifier.
pub struct KeywordPhaseClassifier;

#[async_trait]
impl PhaseClassifier for KeywordPhaseClassifier {
    async fn predict(&self, context: &str) -> Result<PhasePrediction, AppError> {
        Ok(classify_by_cues(context))
    }
}

fn classify_by_cues(context: &str) -> PhasePrediction {
    let lines: Vec<String> = context
        .lines()
        .map(normalize)
        .filter(|line| !line.trim().is_empty())
        .collect();

    // Later messages count more; the newest line has weight 1.
    let mut scores = [0.0_f64; 8];
    let n = lines.len() as f64;
    for (i, line) in lines.iter().enumerate() {
        let weight = (i as f64 + 1.0) / n;
        for (slot, (_, cues)) in scores.iter_mut().zip(PHASE_CUES.iter()) {
            let hits = cues
                .iter()
                .filter(|cue| line.contains(&format!(" {cue} ")))
                .count();
            *slot += weight * hits as f64;
        }
    }

    let probabilities = softmax(&scores);
    let best = probabilities
        .iter()
        .enumerate()
        .fold(0, |best, (i, p)| if *p > probabilities[best] { i } else { best });

    PhasePrediction {
        phase: PHASE_CUES[best].0,
        confidence: round4(probabilities[best]),
        all_probabilities: PHASE_CUES
            .iter()
            .zip(probabilities.iter())
            .map(|((phase, _), p)| (phase.as_str().to_string(), round4(*p)))
            .collect(),
        model_type: "keyword".to_string(),
    }
}

/// Lowercases, keeps alphanumerics and `$` as tokens, pads with spaces for whole-token matching.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if c == '$' {
            out.push_str(" $ ");
        } else if c != '\'' && c != '\u{2019}' {
            out.push(' ');
        }
    }
    format!(" {} ", out.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ────────────────────────────────────────────────────────────────────────────
// LlmPhaseClassifier
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LabelledPhase {
    phase: String,
    confidence: f64,
}

/// Model-backed classifier. Blank contexts never reach the API.
pub struct LlmPhaseClassifier(pub LlmClient);

#[async_trait]
impl PhaseClassifier for LlmPhaseClassifier {
    async fn predict(&self, context: &str) -> Result<PhasePrediction, AppError> {
        if context.trim().is_empty() {
            return Ok(classify_by_cues(context));
        }

        let labels: Vec<&str> = Phase::CLASSIFIER_LABELS.iter().map(Phase::as_str).collect();
        let answer: LabelledPhase = self
            .0
            .call_json(&phase_classification_prompt(context, &labels), JSON_ONLY_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(format!("Phase classification failed: {e}")))?;

        labelled_prediction(&answer)
    }
}

/// Spreads the remaining probability mass evenly over the other labels.
fn labelled_prediction(answer: &LabelledPhase) -> Result<PhasePrediction, AppError> {
    let phase = Phase::from_label(answer.phase.trim())
        .filter(|p| Phase::CLASSIFIER_LABELS.contains(p))
        .ok_or_else(|| AppError::Llm(format!("Unknown phase label '{}'", answer.phase)))?;
    let confidence = answer.confidence.clamp(0.0, 1.0);
    let rest = (1.0 - confidence) / (Phase::CLASSIFIER_LABELS.len() - 1) as f64;

    Ok(PhasePrediction {
        phase,
        confidence: round4(confidence),
        all_probabilities: Phase::CLASSIFIER_LABELS
            .iter()
            .map(|p| {
                let value = if *p == phase { confidence } else { rest };
                (p.as_str().to_string(), round4(value))
            })
            .collect(),
        model_type: "anthropic".to_string(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline step
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PhaseDetection {
    pub session_id: String,
    pub messages_used: usize,
    #[serde(flatten)]
    pub prediction: PhasePrediction,
}

/// Classifies the last messages of a session and stores the phase on it.
pub async fn detect_and_update_phase(
    pool: &SqlitePool,
    classifier: &dyn PhaseClassifier,
    session_ref: &str,
) -> Result<PhaseDetection, AppError> {
    let session = resolve_session(pool, session_ref).await?;
    let messages = recent_messages(pool, &session.session_id, PHASE_CONTEXT_MESSAGES).await?;
    if messages.is_empty() {
        return Err(AppError::Validation(format!(
            "Session {} has no messages",
            session.session_id
        )));
    }

    let prediction = classifier.predict(&build_context(&messages)).await?;
    update_session_phase(
        pool,
        &session.session_id,
        prediction.phase.as_str(),
        prediction.confidence,
    )
    .await?;

    info!(
        "Session {} phase: {} ({:.1}% confidence, {})",
        session.session_id,
        prediction.phase,
        prediction.confidence * 100.0,
        prediction.model_type
    );

    Ok(PhaseDetection {
        session_id: session.session_id,
        messages_used: messages.len(),
        prediction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::repository::{get_session, seeded_session, SENDER_CLIENT, SENDER_FREELANCER};
    use crate::db::test_pool;

    #[test]
    fn test_labelled_prediction_spreads_remaining_mass() {
        let answer = LabelledPhase {
            phase: "rate_negotiation".to_string(),
            confidence: 0.93,
        };
        let prediction = labelled_prediction(&answer).unwrap();
        assert_eq!(prediction.phase, Phase::RateNegotiation);
        assert_eq!(prediction.confidence, 0.93);
        assert_eq!(prediction.all_probabilities.len(), 8);
        assert_eq!(prediction.all_probabilities["ask_details"], 0.01);
        assert_eq!(prediction.model_type, "anthropic");
    }

    #[test]
    fn test_labelled_prediction_rejects_response_only_labels() {
        let answer = LabelledPhase {
            phase: "follow_up".to_string(),
            confidence: 0.8,
        };
        assert!(matches!(labelled_prediction(&answer), Err(AppError::Llm(_))));
    }

    async fn predict(text: &str) -> PhasePrediction {
        KeywordPhaseClassifier.predict(text).await.unwrap()
    }

    #[tokio::test]
    async fn test_reference_phrases() {
        let cases = [
            ("Hello! I saw your application. Are you available?", Phase::InitialResponse),
            ("We need content about casino games. Can you handle technical topics?", Phase::AskDetails),
            ("Can you explain what RTP means in slot machines?", Phase::KnowledgeCheck),
            ("Which language do you prefer - English or Dutch?", Phase::LanguageConfirm),
            ("Our budget is $0.06 per word. Does that work?", Phase::RateNegotiation),
            ("We need the first batch by Monday. Can you deliver?", Phase::DeadlineSamples),
            ("Each article needs H1, H2s, and FAQ section with SEO.", Phase::StructureClarification),
            ("I'm sending the contract now. Please accept to start.", Phase::ContractAcceptance),
        ];
        for (text, expected) in cases {
            assert_eq!(predict(text).await.phase, expected, "{text}");
        }
    }

    #[tokio::test]
    async fn test_no_cues_is_uniform_initial_response() {
        for context in ["", "client: ok"] {
            let prediction = predict(context).await;
            assert_eq!(prediction.phase, Phase::InitialResponse);
            assert_eq!(prediction.confidence, 0.125);
            assert!(prediction.all_probabilities.values().all(|p| *p == 0.125));
        }
    }

    #[tokio::test]
    async fn test_probabilities_cover_all_labels_and_sum_to_one() {
        let prediction = predict("client: Our budget is $50 per hour").await;
        assert_eq!(prediction.all_probabilities.len(), 8);
        let total: f64 = prediction.all_probabilities.values().sum();
        assert!((total - 1.0).abs() < 1e-3);
        assert_eq!(prediction.model_type, "keyword");
    }

    #[tokio::test]
    async fn test_latest_message_dominates() {
        let context = "client: Hello, are you available?\n\
                       freelancer: Yes!\n\
                       client: Great, our budget is $0.05 per word and the rate is fixed.";
        assert_eq!(predict(context).await.phase, Phase::RateNegotiation);
    }

    #[test]
    fn test_cue_matching_is_whole_token() {
        // "separate" must not trigger the "rate" cue.
        let prediction = classify_by_cues("Please keep these separate");
        assert_eq!(prediction.phase, Phase::InitialResponse);
        assert_eq!(prediction.confidence, 0.125);
    }

    #[test]
    fn test_phase_labels_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(Phase::from_label(phase.as_str()), Some(phase));
        }
        assert_eq!(Phase::from_label("unknown"), None);
        assert_eq!(
            serde_json::to_value(Phase::RateNegotiation).unwrap(),
            "rate_negotiation"
        );
    }

    #[tokio::test]
    async fn test_batch_prediction() {
        let predictions = KeywordPhaseClassifier
            .predict_batch(&["Can you explain RTP?".to_string(), String::new()])
            .await
            .unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].phase, Phase::KnowledgeCheck);
    }

    #[tokio::test]
    async fn test_detect_and_update_phase() {
        let pool = test_pool().await;
        let id = seeded_session(
            &pool,
            &[
                (SENDER_CLIENT, "Hello! Are you available?"),
                (SENDER_FREELANCER, "Yes, happy to help."),
                (SENDER_CLIENT, "Which language do you prefer - English or Dutch?"),
            ],
        )
        .await;

        let detection = detect_and_update_phase(&pool, &KeywordPhaseClassifier, "latest")
            .await
            .unwrap();
        assert_eq!(detection.session_id, id);
        assert_eq!(detection.messages_used, 3);
        assert_eq!(detection.prediction.phase, Phase::LanguageConfirm);

        let session = get_session(&pool, &id).await.unwrap();
        assert_eq!(session.phase.as_deref(), Some("language_confirm"));
        assert_eq!(session.phase_confidence, Some(detection.prediction.confidence));
    }

    #[tokio::test]
    async fn test_detect_requires_messages() {
        let pool = test_pool().await;
        let id = seeded_session(&pool, &[]).await;
        assert!(matches!(
            detect_and_update_phase(&pool, &KeywordPhaseClassifier, &id).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            detect_and_update_phase(&pool, &KeywordPhaseClassifier, "nope").await,
            Err(AppError::NotFound(_))
        ));
    }
}
