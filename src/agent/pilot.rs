// src/agent/pilot.rs
// The Pilot: a single-step strategist that either instructs the Executor
// or replies to the user.

use tracing::warn;

use crate::llm::{LlmClient, Message, complete_text};

/// What the Pilot decided this turn
#[derive(Debug, Clone, PartialEq)]
pub enum PilotDecision {
    Executor(String),
    Reply(String),
}

/// Canned reply after repeated model failures.
pub const APOLOGY_REPLY: &str =
    "I'm sorry - I wasn't able to work through that request. Please try rephrasing it.";

/// Canned reply when the step budget runs out.
pub const STEP_CAP_REPLY: &str =
    "I wasn't able to complete this request within my step budget. Here is how far I got.";

/// Ask the model for the next step. Empty or errored completions are
/// retried with the same history; exhaustion yields the canned apology.
pub async fn decide(
    llm: &dyn LlmClient,
    system_prompt: &str,
    history: &[Message],
    known_tools: &[String],
) -> PilotDecision {
    let mut messages = vec![Message::system(system_prompt)];
    messages.extend_from_slice(history);

    match complete_text(llm, &messages, "pilot").await {
        Ok(text) => parse_decision(&text, known_tools),
        Err(e) => {
            warn!(error = %e, "Pilot gave no usable completion");
            PilotDecision::Reply(APOLOGY_REPLY.to_string())
        }
    }
}

/// Parse the Pilot's completion. With no recognizable prefix, fall back to
/// a heuristic: a mention of any known tool name means the model intended
/// an instruction.
pub fn parse_decision(text: &str, known_tools: &[String]) -> PilotDecision {
    let trimmed = text.trim();

    for line in trimmed.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("EXECUTOR:") {
            let rest = rest.trim();
            if !rest.is_empty() {
                return PilotDecision::Executor(rest.to_string());
            }
        }
        if line.starts_with("REPLY:") {
            // the reply may span the rest of the completion
            let start = text.find("REPLY:").expect("prefix just matched") + "REPLY:".len();
            let rest = text[start..].trim();
            if !rest.is_empty() {
                return PilotDecision::Reply(rest.to_string());
            }
        }
    }

    if known_tools.iter().any(|tool| trimmed.contains(tool.as_str())) {
        return PilotDecision::Executor(trimmed.to_string());
    }
    PilotDecision::Reply(trimmed.to_string())
}
