// src/api/mcps.rs
// JSON introspection: connected MCPs with learning status, learning
// previews, and the rendered agent prompts.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;

use crate::agent::executor::select_tool_docs;
use crate::agent::prompts::{executor_prompt, pilot_prompt};
use crate::learning::{prompt::learning_prompt, render_learning_preview};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct McpStatus {
    pub name: String,
    pub connected: bool,
    pub tool_count: usize,
    pub learned: bool,
    pub sub_tool_count: usize,
}

/// GET /mcps
pub async fn list_mcps(State(state): State<AppState>) -> Json<Vec<McpStatus>> {
    let connected = state.mcp.server_names().await;
    let learned = state.catalog.learned_mcps().await;

    let mut names: BTreeSet<String> = BTreeSet::new();
    names.extend(connected.iter().cloned());
    names.extend(learned.iter().cloned());

    let mut out = Vec::new();
    for name in names {
        let tool_count = state.mcp.tools_for_server(&name).await.len();
        let sub_tool_count = state
            .catalog
            .file_for(&name)
            .await
            .map(|f| f.sub_tools.len())
            .unwrap_or(0);
        out.push(McpStatus {
            connected: connected.contains(&name),
            learned: learned.contains(&name),
            tool_count,
            sub_tool_count,
            name,
        });
    }

    Json(out)
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub mcp: String,
}

/// GET /mcp-learning-preview?mcp=name
pub async fn learning_preview(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> impl IntoResponse {
    match state.catalog.file_for(&query.mcp).await {
        Some(file) => (StatusCode::OK, render_learning_preview(&file)),
        None => (
            StatusCode::NOT_FOUND,
            format!("no learnings for '{}'", query.mcp),
        ),
    }
}

/// GET /agent-prompts - the prompts exactly as the agents would see them
/// right now, with live tool and catalog state rendered in.
pub async fn agent_prompts(State(state): State<AppState>) -> Json<serde_json::Value> {
    let current_date = chrono::Local::now().format("%Y-%m-%d").to_string();
    let tool_summaries = state.catalog.summaries().await;

    let pilot = pilot_prompt(&tool_summaries, &[], &current_date);

    let executor_docs = select_tool_docs(&state.catalog, "").await;
    let executor = executor_prompt(&executor_docs);

    let servers = state.mcp.server_names().await;
    let tools = state.mcp.tools().await;
    let learning = learning_prompt(&servers, &tools);

    Json(json!({
        "pilot": pilot,
        "executor": executor,
        "learning": learning,
    }))
}
