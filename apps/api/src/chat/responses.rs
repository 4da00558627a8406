//! Reply suggestions for a chat session whose phase has already been detected.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::chat::phase::{Phase, PHASE_CONTEXT_MESSAGES};
use crate::chat::prompts::{chat_reply_prompt, CHAT_REPLY_SYSTEM};
use crate::chat::repository::{build_context, recent_messages, resolve_session};
use crate::errors::AppError;
use crate::llm_client::LlmClient;

pub const DEFAULT_NUM_OPTIONS: usize = 3;

const CONTRACT_ACCEPTED: [&str; 3] = [
    "Contract accepted! Starting work now. You'll have it by the deadline.",
    "Thank you! I've accepted and will begin immediately.",
    "Great! Contract signed. I'm diving into the first batch now.",
];

/// Canned replies for a phase.
pub fn templates_for(phase: Phase) -> &'static [&'static str; 3] {
    match phase {
        Phase::InitialResponse => &[
            "Thank you for reaching out! I'm very interested. Could you tell me more about the project?",
            "Good day! I'm available. What are the main deliverables?",
            "Hello! I'd be happy to help. Can you share more details?",
        ],
        Phase::AskDetails => &[
            "Could you provide more details about the project scope?",
            "What specific requirements do you have in mind?",
            "I'd love to learn more about what you're looking for!",
        ],
        Phase::KnowledgeCheck => &[
            "Yes, I have extensive experience with that topic. Let me show you my expertise.",
            "Absolutely! I'm well-versed in that area. Would you like some examples?",
            "I'm confident in handling that subject. What specific aspects interest you?",
        ],
        Phase::LanguageConfirm => &[
            "I'm fluent in both languages. Which would you prefer for this project?",
            "I can work in either language comfortably. What's your preference?",
            "Both languages work for me. Which fits your target audience better?",
        ],
        Phase::RateNegotiation => &[
            "That rate works perfectly for me. When can we start?",
            "I'm comfortable with that pricing. What's the next step?",
            "Great! That rate is acceptable. Should we proceed with the contract?",
        ],
        Phase::DeadlineSamples => &[
            "Absolutely! I can deliver by that deadline. Should I start immediately?",
            "Yes, that timeline works perfectly. I'll prioritize your project.",
            "I can definitely meet that deadline. Let's get started!",
        ],
        Phase::StructureClarification => &[
            "Perfect! I understand the structure requirements. I'll follow that format exactly.",
            "Got it! I'll include all those elements in the proper structure.",
            "Understood! I'll make sure each piece follows that exact format.",
        ],
        Phase::ContractAcceptance | Phase::ProjectAcceptance => &CONTRACT_ACCEPTED,
        Phase::ScopeClarification => &[
            "Thank you! Could you clarify: which language(s) and how many words per week?",
            "Great! What language and what's the expected weekly volume?",
            "Perfect! What language? How many articles per week?",
        ],
        Phase::TimelineDiscussion => &[
            "Perfect! When would you need the first delivery?",
            "Got it! What's your preferred timeline for completion?",
            "Understood! When is the deadline? I can start immediately.",
        ],
        Phase::RequirementsDiscussion => &[
            "Could you share the content structure requirements? (H1, H2s, SEO, etc.)",
            "Do you have specific formatting requirements?",
            "What structure do you prefer for the articles?",
        ],
        Phase::FollowUp => &[
            "Just checking in - do you need any clarifications?",
            "Let me know if you have any questions!",
            "Feel free to reach out if you need anything!",
        ],
        Phase::GeneralInquiry => &[
            "Could you provide more details about what you're looking for?",
            "I'd be glad to assist! Can you clarify what you need?",
            "Let me know the specifics and I'll help!",
        ],
    }
}

/// Up to `n` template replies for a stored phase label. Unknown labels use general inquiry.
pub fn template_responses(label: &str, n: usize) -> Vec<String> {
    let phase = Phase::from_label(label).unwrap_or(Phase::GeneralInquiry);
    templates_for(phase)
        .iter()
        .take(n)
        .map(|s| s.to_string())
        .collect()
}

fn first_template(label: &str) -> String {
    let phase = Phase::from_label(label).unwrap_or(Phase::GeneralInquiry);
    templates_for(phase)[0].to_string()
}

// ────────────────────────────────────────────────────────────────────────────
// Model-written replies
// ────────────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait ChatResponder: Send + Sync {
    async fn respond(&self, prompt: &str) -> Result<String, AppError>;
}

pub struct LlmChatResponder(pub LlmClient);

#[async_trait]
impl ChatResponder for LlmChatResponder {
    async fn respond(&self, prompt: &str) -> Result<String, AppError> {
        let response = self
            .0
            .call(prompt, CHAT_REPLY_SYSTEM)
            .await
            .map_err(|e| AppError::Llm(e.to_string()))?;
        response
            .text()
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AppError::Llm("empty chat reply".to_string()))
    }
}

/// A model reply, or the first template when no responder is configured or it fails.
pub async fn ai_response(responder: Option<&dyn ChatResponder>, phase: &str, context: &str) -> String {
    let Some(responder) = responder else {
        warn!("No chat responder configured, using template reply");
        return first_template(phase);
    };

    match responder.respond(&chat_reply_prompt(phase, context)).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("AI reply failed, using template reply: {e}");
            first_template(phase)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline step
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Template,
    Ai,
    Both,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Reply {
    Template { responses: Vec<String> },
    Ai { responses: Vec<String> },
    Both {
        template_response: String,
        ai_response: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReply {
    pub session_id: String,
    pub phase: String,
    pub confidence: Option<f64>,
    #[serde(flatten)]
    pub reply: Reply,
    pub generated_at: DateTime<Utc>,
}

/// Builds reply suggestions from the phase stored on the session. No detection happens here.
pub async fn generate_reply(
    pool: &SqlitePool,
    responder: Option<&dyn ChatResponder>,
    session_ref: &str,
    mode: ResponseMode,
    num_options: usize,
) -> Result<GeneratedReply, AppError> {
    let session = resolve_session(pool, session_ref).await?;
    let Some(phase) = session.phase.clone() else {
        return Err(AppError::Validation(
            "Phase not detected yet. Run phase detection first.".to_string(),
        ));
    };

    let context = if mode == ResponseMode::Template {
        String::new()
    } else {
        build_context(&recent_messages(pool, &session.session_id, PHASE_CONTEXT_MESSAGES).await?)
    };

    let reply = match mode {
        ResponseMode::Template => Reply::Template {
            responses: template_responses(&phase, num_options),
        },
        ResponseMode::Ai => Reply::Ai {
            responses: vec![ai_response(responder, &phase, &context).await],
        },
        ResponseMode::Both => Reply::Both {
            template_response: first_template(&phase),
            ai_response: ai_response(responder, &phase, &context).await,
        },
    };
    info!("Generated {mode:?} reply for session {} ({phase})", session.session_id);

    Ok(GeneratedReply {
        session_id: session.session_id,
        phase,
        confidence: session.phase_confidence,
        reply,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::repository::{seeded_session, update_session_phase, SENDER_CLIENT};
    use crate::db::test_pool;

    struct EchoResponder;

    #[async_trait]
    impl ChatResponder for EchoResponder {
        async fn respond(&self, prompt: &str) -> Result<String, AppError> {
            Ok(format!("echo {}", prompt.len()))
        }
    }

    struct FailingResponder;

    #[async_trait]
    impl ChatResponder for FailingResponder {
        async fn respond(&self, _prompt: &str) -> Result<String, AppError> {
            Err(AppError::Llm("offline".to_string()))
        }
    }

    #[test]
    fn test_template_responses_count_and_fallback() {
        assert_eq!(template_responses("rate_negotiation", 3).len(), 3);
        assert_eq!(template_responses("rate_negotiation", 10).len(), 3);
        assert_eq!(
            template_responses("rate_negotiation", 1),
            vec!["That rate works perfectly for me. When can we start?"]
        );
        assert_eq!(
            template_responses("something_else", 1),
            vec!["Could you provide more details about what you're looking for?"]
        );
        assert!(template_responses("follow_up", 0).is_empty());
    }

    #[test]
    fn test_acceptance_labels_share_templates() {
        assert_eq!(
            templates_for(Phase::ContractAcceptance),
            templates_for(Phase::ProjectAcceptance)
        );
    }

    #[tokio::test]
    async fn test_ai_response_falls_back() {
        let template = "Could you provide more details about the project scope?";
        assert_eq!(ai_response(None, "ask_details", "ctx").await, template);
        assert_eq!(
            ai_response(Some(&FailingResponder), "ask_details", "ctx").await,
            template
        );
        assert!(ai_response(Some(&EchoResponder), "ask_details", "ctx")
            .await
            .starts_with("echo "));
    }

    #[tokio::test]
    async fn test_generate_requires_detected_phase() {
        let pool = test_pool().await;
        let id = seeded_session(&pool, &[(SENDER_CLIENT, "Hello")]).await;
        assert!(matches!(
            generate_reply(&pool, None, &id, ResponseMode::Template, 3).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_modes() {
        let pool = test_pool().await;
        let id = seeded_session(&pool, &[(SENDER_CLIENT, "Our budget is $0.06 per word.")]).await;
        update_session_phase(&pool, &id, "rate_negotiation", 0.74)
            .await
            .unwrap();

        let template = generate_reply(&pool, None, "latest", ResponseMode::Template, 2)
            .await
            .unwrap();
        assert_eq!(template.confidence, Some(0.74));
        match &template.reply {
            Reply::Template { responses } => assert_eq!(responses.len(), 2),
            other => panic!("unexpected reply {other:?}"),
        }

        let both = generate_reply(&pool, Some(&EchoResponder), &id, ResponseMode::Both, 3)
            .await
            .unwrap();
        let json = serde_json::to_value(&both).unwrap();
        assert_eq!(json["mode"], "both");
        assert_eq!(
            json["template_response"],
            "That rate works perfectly for me. When can we start?"
        );
        assert!(json["ai_response"].as_str().unwrap().starts_with("echo "));
    }
}
