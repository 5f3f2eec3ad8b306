// src/config.rs
// Environment-based configuration - single source of truth for all env vars

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, warn};

use crate::error::AgentError;

/// Command-line options for the server binary.
#[derive(Debug, Parser)]
#[command(name = "canvas-backend", about = "Agent orchestration server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Path to the MCP server configuration file
    #[arg(long, default_value = "mcp-config.json")]
    pub mcp_config: PathBuf,

    /// Directory holding per-MCP learning files
    #[arg(long, default_value = "learnings")]
    pub learnings_dir: PathBuf,
}

/// API keys loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// DeepSeek API key (DEEPSEEK_API_KEY)
    pub deepseek: Option<String>,
    /// Gemini/Google API key (GEMINI_API_KEY or GOOGLE_API_KEY)
    pub gemini: Option<String>,
}

impl ApiKeys {
    /// Load API keys from environment variables.
    pub fn from_env() -> Self {
        let deepseek = Self::read_key("DEEPSEEK_API_KEY");
        let gemini = Self::read_key("GEMINI_API_KEY").or_else(|| Self::read_key("GOOGLE_API_KEY"));

        let keys = Self { deepseek, gemini };
        keys.log_status();
        keys
    }

    /// Read a single API key from environment, filtering empty values
    fn read_key(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|k| !k.trim().is_empty())
    }

    /// Check if any LLM provider is available
    pub fn has_llm_provider(&self) -> bool {
        self.deepseek.is_some() || self.gemini.is_some()
    }

    /// The presence of any one key is enough to boot; none is fatal.
    pub fn require_any(&self) -> Result<(), AgentError> {
        if self.has_llm_provider() {
            Ok(())
        } else {
            Err(AgentError::ConfigMissingKeys)
        }
    }

    /// Log which API keys are available (without exposing values)
    fn log_status(&self) {
        let mut available = Vec::new();
        if self.deepseek.is_some() {
            available.push("DeepSeek");
        }
        if self.gemini.is_some() {
            available.push("Gemini");
        }

        if available.is_empty() {
            warn!("No API keys configured - the server cannot start without one");
        } else {
            debug!(keys = ?available, "API keys loaded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_keys_are_fatal() {
        let keys = ApiKeys::default();
        assert!(!keys.has_llm_provider());
        let err = keys.require_any().unwrap_err();
        assert_eq!(err.kind(), "CONFIG_MISSING_KEYS");
    }

    #[test]
    fn test_one_key_suffices() {
        let keys = ApiKeys {
            deepseek: Some("sk-test".into()),
            gemini: None,
        };
        assert!(keys.require_any().is_ok());
    }
}
