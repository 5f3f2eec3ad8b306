// src/llm/gemini.rs
// Gemini generateContent client with conversion to and from function declarations

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::http_client::LlmHttpClient;
use super::provider::{LlmClient, Provider};
use super::{ChatResult, FunctionCall, Message, Tool, ToolCall, Usage};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<FunctionDeclarations>>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String, // "user" | "model"
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
enum Part {
    #[serde(rename = "text")]
    Text(String),
    #[serde(rename = "functionCall")]
    FunctionCall { name: String, args: Value },
    #[serde(rename = "functionResponse")]
    FunctionResponse { name: String, response: Value },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionDeclarations {
    function_declarations: Vec<Declaration>,
}

#[derive(Debug, Serialize)]
struct Declaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// Response parts arrive as plain maps and may carry keys this client does
/// not model (thought signatures and the like); only text and function
/// calls matter here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<ResponseFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

/// Convert conversation messages into Gemini contents plus an optional
/// system instruction. Tool-result messages need the function name, which
/// Gemini keys responses by; it is recovered from the assistant tool calls
/// seen earlier in the same conversation.
fn convert_messages(messages: &[Message]) -> (Vec<Content>, Option<Content>) {
    let mut id_to_name: HashMap<String, String> = HashMap::new();
    for msg in messages {
        if let Some(calls) = &msg.tool_calls {
            for call in calls {
                id_to_name.insert(call.id.clone(), call.function.name.clone());
            }
        }
    }

    let mut contents = Vec::new();
    let mut system: Option<Content> = None;

    for msg in messages {
        match msg.role.as_str() {
            "system" => {
                system = Some(Content {
                    role: "user".into(),
                    parts: vec![Part::Text(msg.content.clone().unwrap_or_default())],
                });
            }
            "user" => contents.push(Content {
                role: "user".into(),
                parts: vec![Part::Text(msg.content.clone().unwrap_or_default())],
            }),
            "assistant" => {
                let mut parts = Vec::new();
                if let Some(text) = msg.content.as_deref()
                    && !text.is_empty()
                {
                    parts.push(Part::Text(text.to_string()));
                }
                if let Some(calls) = &msg.tool_calls {
                    for call in calls {
                        let args: Value = serde_json::from_str(&call.function.arguments)
                            .unwrap_or(Value::Object(Default::default()));
                        parts.push(Part::FunctionCall {
                            name: call.function.name.clone(),
                            args,
                        });
                    }
                }
                if parts.is_empty() {
                    parts.push(Part::Text(String::new()));
                }
                contents.push(Content {
                    role: "model".into(),
                    parts,
                });
            }
            "tool" => {
                let name = msg
                    .tool_call_id
                    .as_ref()
                    .and_then(|id| id_to_name.get(id))
                    .cloned()
                    .unwrap_or_else(|| "unknown".into());

                // Gemini requires the response to be a JSON object.
                let content_str = msg.content.as_deref().unwrap_or("");
                let response = match serde_json::from_str::<Value>(content_str) {
                    Ok(Value::Object(obj)) => Value::Object(obj),
                    Ok(other) => serde_json::json!({ "result": other }),
                    Err(_) => serde_json::json!({ "result": content_str }),
                };

                contents.push(Content {
                    role: "user".into(),
                    parts: vec![Part::FunctionResponse { name, response }],
                });
            }
            _ => {}
        }
    }

    (contents, system)
}

fn convert_tools(tools: &[Tool]) -> FunctionDeclarations {
    FunctionDeclarations {
        function_declarations: tools
            .iter()
            .map(|t| Declaration {
                name: t.function.name.clone(),
                description: t.function.description.clone(),
                parameters: t.function.parameters.clone(),
            })
            .collect(),
    }
}

/// Gemini API client
pub struct GeminiClient {
    api_key: String,
    model: String,
    http: LlmHttpClient,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, Provider::Gemini.default_model().into())
    }

    pub fn with_model(api_key: String, model: String) -> Self {
        let http = LlmHttpClient::new(Duration::from_secs(300), Duration::from_secs(30));
        Self {
            api_key,
            model,
            http,
        }
    }

    async fn execute(&self, messages: Vec<Message>, tools: Option<Vec<Tool>>) -> Result<ChatResult> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let (contents, system_instruction) = convert_messages(&messages);

        let request = GenerateRequest {
            contents,
            system_instruction,
            tools: tools
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| vec![convert_tools(t)]),
        };
        let body = serde_json::to_string(&request)?;
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);

        let start = Instant::now();
        let response_body = self
            .http
            .post_with_retry(
                &request_id,
                &url,
                &[("x-goog-api-key", self.api_key.as_str())],
                body,
            )
            .await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        let data: GenerateResponse = serde_json::from_str(&response_body)
            .map_err(|e| anyhow!("Failed to parse Gemini response: {}", e))?;

        let mut text = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        if let Some(content) = data.candidates.into_iter().next().and_then(|c| c.content) {
            for part in content.parts {
                if let Some(t) = part.text {
                    text.push_str(&t);
                }
                if let Some(call) = part.function_call {
                    // Gemini does not assign call ids; synthesize stable ones
                    tool_calls.push(ToolCall {
                        id: format!("call_{}", tool_calls.len()),
                        call_type: "function".into(),
                        function: FunctionCall {
                            name: call.name,
                            arguments: call.args.to_string(),
                        },
                    });
                }
            }
        }

        let usage = data.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        debug!(request_id = %request_id, duration_ms, "Gemini completion");

        Ok(ChatResult {
            request_id,
            content: if text.is_empty() { None } else { Some(text) },
            reasoning_content: None,
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            usage,
            duration_ms,
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn chat(&self, messages: Vec<Message>, tools: Option<Vec<Tool>>) -> Result<ChatResult> {
        self.execute(messages, tools).await
    }

    fn provider_type(&self) -> Provider {
        Provider::Gemini
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}
