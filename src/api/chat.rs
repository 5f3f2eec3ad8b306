// src/api/chat.rs
// SSE chat endpoint: multi-provider chat with the MCP tool pool attached

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::extract::unwrap_response;
use crate::llm::{LlmClient, Message, Provider};
use crate::state::AppState;

use super::events::{EventSink, ServerEvent, emit};
use super::{EVENT_CHANNEL_CAPACITY, sse_response};

/// Tool rounds allowed per chat message
const MAX_TOOL_ROUNDS: usize = 8;

/// How much tool output a chat turn gets to keep
const TOOL_RESULT_MAX_CHARS: usize = 30_000;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<Message>,
    /// Provider override; the factory default applies when absent
    #[serde(default)]
    pub provider: Option<String>,
}

/// POST /chat
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let llm = request
            .provider
            .as_deref()
            .and_then(Provider::from_str)
            .and_then(|p| state.llm.get_provider(p))
            .unwrap_or_else(|| state.llm.default_client());

        process_chat(&state, llm.as_ref(), request, &tx).await;
    });

    sse_response(rx)
}

async fn process_chat(
    state: &AppState,
    llm: &dyn LlmClient,
    request: ChatRequest,
    tx: &EventSink,
) {
    let mut messages = vec![Message::system(
        "You are a helpful assistant with access to external tools. Use them when \
         they help answer the question; answer directly when they don't.",
    )];
    messages.extend(request.history.clone());
    messages.push(Message::user(&request.message));

    let tools = state.mcp.tool_declarations(llm.tool_limit()).await;
    let tools = if tools.is_empty() { None } else { Some(tools) };

    info!(
        provider = %llm.provider_type(),
        tool_count = tools.as_ref().map(Vec::len).unwrap_or(0),
        "Chat request"
    );

    for round in 0..MAX_TOOL_ROUNDS {
        let result = match llm.chat(messages.clone(), tools.clone()).await {
            Ok(result) => result,
            Err(e) => {
                emit(tx, ServerEvent::Error { message: e.to_string() }).await;
                return;
            }
        };

        let Some(tool_calls) = result.tool_calls.clone().filter(|c| !c.is_empty()) else {
            let content = result.content.clone().unwrap_or_default();
            if !content.is_empty() {
                emit(tx, ServerEvent::Delta { content: content.clone() }).await;
            }
            messages.push(Message::assistant(content.clone()));
            finish(tx, &messages, content).await;
            return;
        };

        info!(round, calls = tool_calls.len(), "Chat tool round");
        messages.push(Message::assistant_with_tool_calls(
            result.content.clone(),
            tool_calls.clone(),
        ));

        for call in &tool_calls {
            emit(
                tx,
                ServerEvent::ToolCalling {
                    tool: call.function.name.clone(),
                },
            )
            .await;

            let args = serde_json::from_str(&call.function.arguments)
                .unwrap_or_else(|_| serde_json::json!({}));

            let reply = match state.mcp.call(&call.function.name, args).await {
                Ok(raw) => {
                    emit(
                        tx,
                        ServerEvent::ToolSuccess {
                            tool: call.function.name.clone(),
                            variable: None,
                        },
                    )
                    .await;
                    let payload = unwrap_response(&raw);
                    truncate(
                        &serde_json::to_string(&payload).unwrap_or_else(|_| payload.to_string()),
                        TOOL_RESULT_MAX_CHARS,
                    )
                }
                Err(e) => {
                    warn!(tool = %call.function.name, error = %e, "Chat tool failed");
                    emit(
                        tx,
                        ServerEvent::ToolError {
                            tool: call.function.name.clone(),
                            error: e.to_string(),
                        },
                    )
                    .await;
                    format!("{{\"error\": \"{}\"}}", e)
                }
            };

            messages.push(Message::tool_result(call.id.clone(), reply));
        }
    }

    warn!(rounds = MAX_TOOL_ROUNDS, "Chat hit the tool-round budget");
    finish(
        tx,
        &messages,
        "I ran out of tool budget before finishing; here is what I have so far.".to_string(),
    )
    .await;
}

async fn finish(tx: &EventSink, messages: &[Message], content: String) {
    let history: Vec<serde_json::Value> = messages
        .iter()
        .skip(1) // system prompt stays server-side
        .filter_map(|m| serde_json::to_value(m).ok())
        .collect();

    emit(
        tx,
        ServerEvent::Complete {
            dsl: Vec::new(),
            message: content,
            history,
        },
    )
    .await;
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}
