// src/state.rs
// Shared application state handed to every request handler

use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::SessionRegistry;
use crate::llm::ProviderFactory;
use crate::mcp::McpManager;
use crate::subtool::SubToolCatalog;

/// Process-wide services. Cheap to clone; everything mutable lives behind
/// its own lock.
#[derive(Clone)]
pub struct AppState {
    pub llm: Arc<ProviderFactory>,
    pub mcp: Arc<McpManager>,
    pub catalog: Arc<SubToolCatalog>,
    pub sessions: Arc<SessionRegistry>,
    pub learnings_dir: PathBuf,
}
