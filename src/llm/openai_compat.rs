// src/llm/openai_compat.rs
// OpenAI-compatible chat requests, response parsing, and the DeepSeek client

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

use super::http_client::LlmHttpClient;
use super::provider::{LlmClient, Provider};
use super::{ChatResult, FunctionCall, Message, Tool, ToolCall, Usage};

const DEEPSEEK_API_URL: &str = "https://api.deepseek.com/chat/completions";

/// OpenAI-style function-calling providers reject requests with more than
/// 128 tool declarations.
pub const OPENAI_COMPAT_TOOL_LIMIT: usize = 128;

/// Chat completion request (OpenAI-compatible format)
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>, // "auto" | "required" | "none"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: None,
            tool_choice: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set tools for function calling
    pub fn with_tools(mut self, tools: Option<Vec<Tool>>) -> Self {
        self.tools = tools;
        if self.tools.is_some() {
            self.tool_choice = Some("auto".into());
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Non-streaming chat response (OpenAI-compatible format)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ResponseChoice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ResponseToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: ResponseFunction,
}

#[derive(Debug, Deserialize)]
struct ResponseFunction {
    name: String,
    arguments: String,
}

/// Parse an OpenAI-compatible chat response into a ChatResult
pub fn parse_chat_response(
    response_body: &str,
    request_id: &str,
    duration_ms: u64,
) -> Result<ChatResult> {
    let data: ChatResponse = serde_json::from_str(response_body)
        .map_err(|e| anyhow!("Failed to parse chat response: {}", e))?;

    let choice = data.choices.into_iter().next();
    let (content, reasoning_content, tool_calls) = match choice {
        Some(c) => {
            let msg = c.message;
            let tc: Option<Vec<ToolCall>> = msg.tool_calls.map(|calls| {
                calls
                    .into_iter()
                    .map(|tc| ToolCall {
                        id: tc.id,
                        call_type: tc.call_type,
                        function: FunctionCall {
                            name: tc.function.name,
                            arguments: tc.function.arguments,
                        },
                    })
                    .collect()
            });
            (msg.content, msg.reasoning_content, tc)
        }
        None => (None, None, None),
    };

    Ok(ChatResult {
        request_id: request_id.to_owned(),
        content,
        reasoning_content,
        tool_calls,
        usage: data.usage,
        duration_ms,
    })
}

/// DeepSeek API client
pub struct DeepSeekClient {
    api_key: String,
    model: String,
    http: LlmHttpClient,
}

impl DeepSeekClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, Provider::DeepSeek.default_model().into())
    }

    pub fn with_model(api_key: String, model: String) -> Self {
        let http = LlmHttpClient::new(Duration::from_secs(300), Duration::from_secs(30));
        Self {
            api_key,
            model,
            http,
        }
    }

    /// Model-specific max_tokens limit: chat models cap at 8k output.
    fn max_tokens_for_model(model: &str) -> u32 {
        if model.contains("reasoner") { 65536 } else { 8192 }
    }

    #[instrument(skip(self, messages, tools), fields(model = %self.model, message_count = messages.len()))]
    async fn execute(&self, messages: Vec<Message>, tools: Option<Vec<Tool>>) -> Result<ChatResult> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let request = ChatRequest::new(self.model.clone(), messages)
            .with_tools(tools)
            .with_max_tokens(Self::max_tokens_for_model(&self.model));
        let body = serde_json::to_string(&request)?;

        let start = Instant::now();
        let auth = format!("Bearer {}", self.api_key);
        let response_body = self
            .http
            .post_with_retry(
                &request_id,
                DEEPSEEK_API_URL,
                &[("Authorization", auth.as_str())],
                body,
            )
            .await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = parse_chat_response(&response_body, &request_id, duration_ms)?;
        if let Some(ref u) = result.usage {
            debug!(
                request_id = %result.request_id,
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                duration_ms,
                "DeepSeek completion"
            );
        }
        Ok(result)
    }
}

#[async_trait]
impl LlmClient for DeepSeekClient {
    async fn chat(&self, messages: Vec<Message>, tools: Option<Vec<Tool>>) -> Result<ChatResult> {
        self.execute(messages, tools).await
    }

    fn provider_type(&self) -> Provider {
        Provider::DeepSeek
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }

    fn tool_limit(&self) -> Option<usize> {
        Some(OPENAI_COMPAT_TOOL_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_response() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": "Hello, world!"
                }
            }],
            "usage": {
                "prompt_tokens": 10,
                "completion_tokens": 5,
                "total_tokens": 15
            }
        }"#;

        let result = parse_chat_response(json, "test-123", 100).unwrap();
        assert_eq!(result.request_id, "test-123");
        assert_eq!(result.content, Some("Hello, world!".to_string()));
        assert!(result.tool_calls.is_none());
        assert_eq!(result.duration_ms, 100);
    }

    #[test]
    fn test_parse_response_with_tool_calls() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "search",
                            "arguments": "{\"query\": \"test\"}"
                        }
                    }]
                }
            }],
            "usage": null
        }"#;

        let result = parse_chat_response(json, "test", 50).unwrap();
        let calls = result.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "search");
    }

    #[test]
    fn test_parse_empty_choices() {
        let result = parse_chat_response(r#"{"choices": [], "usage": null}"#, "t", 1).unwrap();
        assert!(result.content.is_none());
        assert!(result.tool_calls.is_none());
    }

    #[test]
    fn test_parse_invalid_json_errors() {
        assert!(parse_chat_response("not json", "t", 1).is_err());
    }

    #[test]
    fn test_chat_request_tool_choice_auto() {
        let req = ChatRequest::new("m", vec![]).with_tools(Some(vec![Tool::function(
            "f",
            "d",
            serde_json::json!({}),
        )]));
        assert_eq!(req.tool_choice.as_deref(), Some("auto"));
    }

    #[test]
    fn test_max_tokens_for_model() {
        assert_eq!(DeepSeekClient::max_tokens_for_model("deepseek-chat"), 8192);
        assert_eq!(
            DeepSeekClient::max_tokens_for_model("deepseek-reasoner"),
            65536
        );
    }

    #[test]
    fn test_client_tool_limit() {
        let client = DeepSeekClient::new("key".into());
        assert_eq!(client.tool_limit(), Some(128));
        assert_eq!(client.provider_type(), Provider::DeepSeek);
        assert_eq!(client.model_name(), "deepseek-chat");
    }
}
