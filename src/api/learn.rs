// src/api/learn.rs
// SSE endpoint that runs the learning pipeline for one or more MCPs

use axum::{
    extract::{Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::learning::learn_mcps;
use crate::state::AppState;

use super::events::{ServerEvent, emit};
use super::{EVENT_CHANNEL_CAPACITY, sse_response};

#[derive(Debug, Deserialize)]
pub struct LearnQuery {
    /// Comma-separated MCP names
    pub mcps: String,
}

/// GET /learn-mcp?mcps=a,b
pub async fn learn_mcp(
    State(state): State<AppState>,
    Query(query): Query<LearnQuery>,
) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let names: Vec<String> = query
            .mcps
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if names.is_empty() {
            emit(
                &tx,
                ServerEvent::Error {
                    message: "no MCP names given".into(),
                },
            )
            .await;
            return;
        }

        info!(mcps = ?names, "Learning run starting");
        let llm = state.llm.default_client();

        match learn_mcps(
            llm.as_ref(),
            &state.mcp,
            &state.learnings_dir,
            &names,
            &tx,
        )
        .await
        {
            Ok(files) => {
                // the new catalog takes effect without a restart
                if let Err(e) = state.catalog.reload().await {
                    error!(error = %e, "Catalog reload after learning failed");
                }

                let summary: Vec<String> = files
                    .iter()
                    .map(|f| format!("{} ({} sub-tools)", f.mcp_name, f.sub_tools.len()))
                    .collect();
                emit(
                    &tx,
                    ServerEvent::Complete {
                        dsl: Vec::new(),
                        message: format!("Learned: {}", summary.join(", ")),
                        history: Vec::new(),
                    },
                )
                .await;
            }
            Err(e) => {
                error!(error = %e, "Learning run failed");
                emit(
                    &tx,
                    ServerEvent::Error {
                        message: e.to_string(),
                    },
                )
                .await;
            }
        }
    });

    sse_response(rx)
}
