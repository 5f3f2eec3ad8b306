// src/llm/mod.rs
// LLM provider layer: shared types, clients, and the provider factory

pub mod factory;
pub mod gemini;
pub mod http_client;
pub mod openai_compat;
pub mod provider;
pub mod types;

pub use factory::ProviderFactory;
pub use provider::{LlmClient, Provider};
pub use types::{ChatResult, FunctionCall, FunctionDef, Message, Tool, ToolCall, Usage};

use anyhow::Result;
use tracing::warn;

use crate::error::AgentError;

/// Completion attempts before a caller falls back to its canned reply.
pub const COMPLETION_ATTEMPTS: u32 = 3;

/// Request a plain-text completion, retrying empty or errored responses.
/// The same messages are sent on every attempt.
pub async fn complete_text(
    client: &dyn LlmClient,
    messages: &[Message],
    label: &str,
) -> Result<String, AgentError> {
    let mut last_error = String::from("no completion");

    for attempt in 1..=COMPLETION_ATTEMPTS {
        match client.chat(messages.to_vec(), None).await {
            Ok(result) => {
                if let Some(text) = result.text() {
                    return Ok(text.to_string());
                }
                last_error = "empty completion".to_string();
            }
            Err(e) => last_error = e.to_string(),
        }
        warn!(
            label = label,
            attempt,
            error = %last_error,
            "Completion failed, retrying"
        );
    }

    Err(AgentError::LlmEmptyOrError(format!(
        "{}: {}",
        label, last_error
    )))
}
