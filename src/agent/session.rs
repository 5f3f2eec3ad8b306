// src/agent/session.rs
// Per-session state for the Pilot system, keyed by session id in a
// process-wide registry. Nothing here survives a process restart.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::llm::Message;
use crate::vars::VariableStore;

/// History plus the variable store for one conversation
#[derive(Default)]
pub struct AgentSession {
    pub pilot_history: Vec<Message>,
    pub variables: VariableStore,
}

impl AgentSession {
    pub fn reset(&mut self) {
        self.pilot_history.clear();
        self.variables.clear();
    }
}

/// Process-wide map of sessions. Each session is its own lock so long
/// requests never serialize unrelated conversations.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<AgentSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the session for an id. An inbound history of length
    /// <= 1 marks a new conversation: per-session stores are cleared
    /// before the request is processed.
    pub async fn session_for(
        &self,
        session_id: &str,
        inbound_history_len: usize,
    ) -> Arc<Mutex<AgentSession>> {
        let session = {
            let mut sessions = self.sessions.write().await;
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(AgentSession::default())))
                .clone()
        };

        if inbound_history_len <= 1 {
            debug!(session_id, "New conversation, resetting session state");
            session.lock().await.reset();
        }

        session
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
