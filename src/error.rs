// src/error.rs
// Behavior-level error taxonomy for the orchestration core

use thiserror::Error;

/// Errors that cross subsystem boundaries.
///
/// The recovery policy is uniform: a session never crashes on a model or
/// tool failure. Everything except `ConfigMissingKeys` is converted into a
/// structured agent report so the Pilot can adapt or give up gracefully.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No provider API key present at startup. Fatal.
    #[error("no LLM provider API keys configured: set DEEPSEEK_API_KEY or GEMINI_API_KEY")]
    ConfigMissingKeys,

    /// An MCP server could not be reached. Logged and skipped, never fatal.
    #[error("MCP server '{server}' failed to connect: {reason}")]
    McpConnectFailed { server: String, reason: String },

    /// Lookup missed in the sanitized-name registry or the sub-tool catalog.
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// The parent MCP tool call behind a sub-tool failed.
    #[error("parent tool '{tool}' call failed: {reason}")]
    ParentCallFailed { tool: String, reason: String },

    /// The Executor's tool-call syntax could not be parsed.
    #[error("could not parse tool call: {0}")]
    ParseFailed(String),

    /// The model returned nothing usable after retries.
    #[error("LLM completion empty or errored: {0}")]
    LlmEmptyOrError(String),

    /// The Pilot loop hit its per-message turn budget.
    #[error("pilot step cap of {0} turns reached")]
    StepCapReached(u32),
}

impl AgentError {
    /// Short machine-readable kind, used in event payloads and agent reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::ConfigMissingKeys => "CONFIG_MISSING_KEYS",
            AgentError::McpConnectFailed { .. } => "MCP_CONNECT_FAILED",
            AgentError::ToolNotFound(_) => "TOOL_NOT_FOUND",
            AgentError::ParentCallFailed { .. } => "PARENT_CALL_FAILED",
            AgentError::ParseFailed(_) => "PARSE_FAILED",
            AgentError::LlmEmptyOrError(_) => "LLM_EMPTY_OR_ERROR",
            AgentError::StepCapReached(_) => "STEP_CAP_REACHED",
        }
    }
}
