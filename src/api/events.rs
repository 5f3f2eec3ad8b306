// src/api/events.rs
// Typed SSE event envelope. Every event serializes as
// `data: {"type": <kind>, ...fields}\n\n` on the wire.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// Events streamed to the client while a request is being processed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    // Pilot loop
    PilotThinking {
        turn: u32,
    },
    PilotResponse {
        message: String,
    },
    PilotInstructingExecutor {
        instruction: String,
    },
    ExecutorCallingTool {
        tool: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        variable: Option<String>,
    },
    ExecutorToolResult {
        success: bool,
        report: String,
    },

    // Tool layer
    ToolCalling {
        tool: String,
    },
    ToolSuccess {
        tool: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        variable: Option<String>,
    },
    ToolError {
        tool: String,
        error: String,
    },

    // Data analysis
    AnalysisPhase {
        phase: String,
    },
    AnalysisOperationResult {
        operation: String,
        result: String,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },

    // UI rendering
    UiCreating {
        kind: String,
    },

    // Learning
    ToolCall {
        tool: String,
        args: Value,
    },
    ToolResponse {
        tool: String,
        preview: String,
    },
    SubtoolCreated {
        id: String,
        name: String,
    },
    InputDocumented {
        tool: String,
        input: String,
    },

    // Chat streaming
    Delta {
        content: String,
    },

    // Terminal events
    Complete {
        dsl: Vec<String>,
        message: String,
        history: Vec<Value>,
    },
    Error {
        message: String,
    },
}

/// Sender half of a request's event channel. Send failures mean the client
/// went away; the work finishes but nothing more is emitted.
pub type EventSink = mpsc::Sender<ServerEvent>;

/// Send an event, ignoring a disconnected receiver.
pub async fn emit(sink: &EventSink, event: ServerEvent) {
    let _ = sink.send(event).await;
}
