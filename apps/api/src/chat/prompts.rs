// Prompt text for model-written chat replies.

/// Only the tail of the conversation goes into the prompt.
pub const CONTEXT_TAIL_CHARS: usize = 500;

pub const CHAT_REPLY_SYSTEM: &str = "You are a professional freelancer replying to a client \
    in a freelance marketplace chat. Reply with the message text only: no quotes, \
    no greeting line, no signature.";

const CHAT_REPLY_PROMPT_TEMPLATE: &str = r#"You are a professional freelancer responding to a client in an Upwork chat conversation.

CONVERSATION CONTEXT:
{context}

PHASE DETECTION RESULT:
The conversation has been analyzed and the client is in the "{phase}" phase.

PHASE MEANINGS:
- initial_response: Client is asking if you're available for work
- ask_details: Client wants more information about project scope
- knowledge_check: Client is testing your expertise in specific topics
- language_confirm: Client is asking about language preferences
- rate_negotiation: Client is discussing pricing and budget
- deadline_samples: Client is asking about delivery timelines
- structure_clarification: Client wants to know about content format/structure
- contract_acceptance: Client is ready to hire and wants you to accept contract

YOUR TASK:
Write a professional, friendly response that addresses the "{phase}" phase appropriately.
- Keep it concise (1-3 sentences)
- Sound natural and conversational
- Be enthusiastic and professional
- Directly address what the client needs in this phase

Response:"#;

const PHASE_CLASSIFICATION_PROMPT_TEMPLATE: &str = r#"Classify the current phase of this freelance marketplace chat.

CONVERSATION CONTEXT:
{context}

Pick exactly one label from: {labels}

Return JSON: {"phase": "<label>", "confidence": <number between 0 and 1>}"#;

/// Prompt for the model-backed phase classifier. Sent with the JSON-only system prompt.
pub fn phase_classification_prompt(context: &str, labels: &[&str]) -> String {
    PHASE_CLASSIFICATION_PROMPT_TEMPLATE
        .replace("{labels}", &labels.join(", "))
        .replace("{context}", context_tail(context))
}

pub fn chat_reply_prompt(phase: &str, context: &str) -> String {
    CHAT_REPLY_PROMPT_TEMPLATE
        .replace("{context}", context_tail(context))
        .replace("{phase}", phase)
}

/// Last [`CONTEXT_TAIL_CHARS`] characters of the context.
fn context_tail(context: &str) -> &str {
    let count = context.chars().count();
    if count <= CONTEXT_TAIL_CHARS {
        return context;
    }
    let start = context
        .char_indices()
        .nth(count - CONTEXT_TAIL_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &context[start..]
}
