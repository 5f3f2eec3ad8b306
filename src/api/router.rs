// src/api/router.rs
// Route table and CORS for the server

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

use super::{agent_run, chat, learn, mcps};

/// Create the router with all endpoints. The canvas client runs on a
/// separate origin, so CORS stays permissive.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/chat", post(chat::chat))
        .route("/tool-calling-agent", post(agent_run::tool_calling_agent))
        .route("/mcps", get(mcps::list_mcps))
        .route("/mcp-learning-preview", get(mcps::learning_preview))
        .route("/agent-prompts", get(mcps::agent_prompts))
        .route("/learn-mcp", get(learn::learn_mcp))
        .layer(cors)
        .with_state(state)
}
