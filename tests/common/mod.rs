// tests/common/mod.rs
// A scripted LLM client for driving the agent loops without a network.

use async_trait::async_trait;
use canvas_backend::llm::{ChatResult, LlmClient, Message, Provider, Tool};
use std::collections::HashMap;
use std::sync::Mutex;

/// Routes completions by which agent is asking, recognized from the
/// system prompt, and replays a per-agent script. The last entry repeats
/// once a script runs out.
pub struct ScriptedLlm {
    scripts: Mutex<HashMap<&'static str, (Vec<String>, usize)>>,
}

/// (marker in the system prompt, role key)
const ROLES: &[(&str, &str)] = &[
    ("strategist", "pilot"),
    ("translate one instruction", "executor"),
    ("Compile the question", "planner"),
    ("Write the findings", "reporter"),
    ("Extract exactly", "extractor"),
];

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
        }
    }

    pub fn script(self, role: &'static str, responses: Vec<&str>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(role, (responses.into_iter().map(String::from).collect(), 0));
        self
    }

    fn role_of(messages: &[Message]) -> &'static str {
        let system = messages
            .first()
            .and_then(|m| m.content.as_deref())
            .unwrap_or("");
        for (marker, role) in ROLES {
            if system.contains(marker) {
                return role;
            }
        }
        "other"
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(
        &self,
        messages: Vec<Message>,
        _tools: Option<Vec<Tool>>,
    ) -> anyhow::Result<ChatResult> {
        let role = Self::role_of(&messages);
        let mut scripts = self.scripts.lock().unwrap();
        let (responses, cursor) = scripts
            .get_mut(role)
            .unwrap_or_else(|| panic!("no script for role '{}'", role));

        let index = (*cursor).min(responses.len().saturating_sub(1));
        *cursor += 1;
        let content = responses
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("empty script for role '{}'", role));

        Ok(ChatResult {
            request_id: format!("{}-{}", role, index),
            content: Some(content),
            reasoning_content: None,
            tool_calls: None,
            usage: None,
            duration_ms: 0,
        })
    }

    fn provider_type(&self) -> Provider {
        Provider::DeepSeek
    }

    fn model_name(&self) -> String {
        "scripted".into()
    }
}
