// src/api/agent_run.rs
// SSE endpoint that drives the Pilot system for one user message

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::info;

use crate::agent::run_pilot_session;
use crate::state::AppState;

use super::events::{ServerEvent, emit};
use super::{EVENT_CHANNEL_CAPACITY, sse_response};

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    pub message: String,
    /// Conversation as the client has it; length <= 1 starts a fresh session
    #[serde(default)]
    pub history: Vec<Value>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// POST /tool-calling-agent
pub async fn tool_calling_agent(
    State(state): State<AppState>,
    Json(request): Json<AgentRequest>,
) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let session_id = request.session_id.as_deref().unwrap_or("default");
        info!(
            session_id,
            inbound_history = request.history.len(),
            "Pilot request"
        );

        let session = state
            .sessions
            .session_for(session_id, request.history.len())
            .await;
        let mut session = session.lock().await;

        let llm = state.llm.default_client();
        let outcome = run_pilot_session(
            llm.as_ref(),
            &state.catalog,
            &state.mcp,
            &mut session,
            &request.message,
            &tx,
        )
        .await;

        let history: Vec<Value> = outcome
            .history
            .iter()
            .filter_map(|m| serde_json::to_value(m).ok())
            .collect();

        emit(
            &tx,
            ServerEvent::Complete {
                dsl: outcome.dsl,
                message: outcome.message,
                history,
            },
        )
        .await;
    });

    sse_response(rx)
}
