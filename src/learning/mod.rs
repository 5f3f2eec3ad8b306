// src/learning/mod.rs
// Exploratory learning pipeline: an LLM probes the tools of one or more
// MCP servers through a tagged-block protocol, and what it verifies is
// persisted as a per-MCP sub-tool catalog.

pub mod emission;
pub mod prompt;
pub mod store;

pub use store::render_learning_preview;

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::api::events::{EventSink, ServerEvent, emit};
use crate::error::AgentError;
use crate::extract::unwrap_response;
use crate::llm::{LlmClient, Message, complete_text};
use crate::mcp::McpManager;
use crate::subtool::types::{DocumentedInput, LearningFile, OriginalTool, SubTool, Workflow};

use emission::{Emission, parse_emissions};

/// Completion budget for one learning run
pub const MAX_LEARNING_ITERATIONS: usize = 50;

/// How much of a fetched page the agent gets to see
const BROWSE_MAX_CHARS: usize = 20_000;

#[derive(Default)]
struct LearningState {
    sub_tools: Vec<SubTool>,
    documented_inputs: Vec<(String, DocumentedInput)>,
    workflows: Vec<(String, Workflow)>,
    insights: String,
    complete: bool,
}

/// Run a learning session over the named MCP servers and persist one
/// learning file per server. Returns the written files.
pub async fn learn_mcps(
    llm: &dyn LlmClient,
    mcp: &McpManager,
    learnings_dir: &Path,
    mcp_names: &[String],
    events: &EventSink,
) -> anyhow::Result<Vec<LearningFile>> {
    let mut tools = Vec::new();
    for name in mcp_names {
        tools.extend(mcp.tools_for_server(name).await);
    }
    if tools.is_empty() {
        return Err(AgentError::ToolNotFound(format!(
            "no connected tools for MCPs: {}",
            mcp_names.join(", ")
        ))
        .into());
    }

    let system = prompt::learning_prompt(mcp_names, &tools);
    let mut messages = vec![
        Message::system(system),
        Message::user(
            "Begin exploring. Probe the tools, then emit sub-tools for what you verify.",
        ),
    ];

    let mut state = LearningState::default();

    for iteration in 1..=MAX_LEARNING_ITERATIONS {
        let completion = complete_text(llm, &messages, "learning").await?;
        messages.push(Message::assistant(completion.clone()));

        let (emissions, problems) = parse_emissions(&completion);

        if emissions.is_empty() {
            let feedback = if problems.is_empty() {
                "No tagged block found. Respond with exactly one of [CALL_TOOL], \
                 [BROWSE_WEB], [INPUT_LEARNED], [SUB_TOOL], [WORKFLOW], or \
                 [LEARNING_COMPLETE]."
                    .to_string()
            } else {
                format!("Could not parse your block(s): {}", problems.join("; "))
            };
            messages.push(Message::user(feedback));
            continue;
        }

        let mut acknowledged = 0usize;
        for item in emissions {
            match item {
                Emission::CallTool { tool, args } => {
                    emit(
                        events,
                        ServerEvent::ToolCall {
                            tool: tool.clone(),
                            args: args.clone(),
                        },
                    )
                    .await;

                    let reply = match mcp.call(&tool, args).await {
                        Ok(raw) => {
                            let payload = unwrap_response(&raw);
                            let rendered = serde_json::to_string_pretty(&payload)
                                .unwrap_or_else(|_| payload.to_string());
                            emit(
                                events,
                                ServerEvent::ToolResponse {
                                    tool: tool.clone(),
                                    preview: truncate(&rendered, 400),
                                },
                            )
                            .await;
                            format!("Response from `{}`:\n```json\n{}\n```", tool, rendered)
                        }
                        Err(e) => {
                            emit(
                                events,
                                ServerEvent::ToolError {
                                    tool: tool.clone(),
                                    error: e.to_string(),
                                },
                            )
                            .await;
                            format!("Call to `{}` failed: {}", tool, e)
                        }
                    };
                    messages.push(Message::user(reply));
                }
                Emission::BrowseWeb { url } => {
                    let reply = match fetch_page(&url).await {
                        Ok(text) => format!("Content of {}:\n{}", url, text),
                        Err(e) => format!("Could not fetch {}: {}", url, e),
                    };
                    messages.push(Message::user(reply));
                }
                Emission::InputLearned(input) => {
                    emit(
                        events,
                        ServerEvent::InputDocumented {
                            tool: input.tool.clone(),
                            input: input.input.clone(),
                        },
                    )
                    .await;
                    let server = attribute(mcp, mcp_names, &input.tool).await;
                    state.documented_inputs.push((server, input));
                    acknowledged += 1;
                }
                Emission::SubTool(mut sub_tool) => {
                    emit(
                        events,
                        ServerEvent::SubtoolCreated {
                            id: sub_tool.id.clone(),
                            name: sub_tool.name.clone(),
                        },
                    )
                    .await;
                    let server = attribute(mcp, mcp_names, &sub_tool.parent_tool).await;
                    sub_tool.server_name = Some(server);
                    state.sub_tools.push(sub_tool);
                    acknowledged += 1;
                }
                Emission::Workflow(workflow) => {
                    let server = workflow
                        .steps
                        .first()
                        .map(|step| step_server(&state, step))
                        .unwrap_or(None)
                        .unwrap_or_else(|| mcp_names[0].clone());
                    state.workflows.push((server, workflow));
                    acknowledged += 1;
                }
                Emission::Complete { insights } => {
                    state.insights = insights;
                    state.complete = true;
                }
            }
        }

        if state.complete {
            info!(iterations = iteration, "Learning complete");
            break;
        }

        if acknowledged > 0 {
            messages.push(Message::user(format!(
                "Recorded {} item(s). Continue exploring or emit [LEARNING_COMPLETE].",
                acknowledged
            )));
        }
    }

    if !state.complete {
        warn!(
            budget = MAX_LEARNING_ITERATIONS,
            "Learning hit its iteration budget; persisting what was gathered"
        );
    }

    let files = partition(mcp, mcp_names, llm.model_name(), state).await;
    for file in &files {
        store::write_learning_file(learnings_dir, file).await?;
    }

    Ok(files)
}

/// Resolve which server a sanitized tool name belongs to. Falls back to
/// the first target MCP when the binding is gone.
async fn attribute(mcp: &McpManager, mcp_names: &[String], sanitized_tool: &str) -> String {
    if let Some(binding) = mcp.binding(sanitized_tool).await {
        return binding.server_name;
    }
    warn!(
        tool = sanitized_tool,
        "No binding for learned tool; attributing to first target MCP"
    );
    mcp_names[0].clone()
}

fn step_server(state: &LearningState, step: &str) -> Option<String> {
    state
        .sub_tools
        .iter()
        .find(|t| t.id == step)
        .and_then(|t| t.server_name.clone())
}

async fn partition(
    mcp: &McpManager,
    mcp_names: &[String],
    model_used: String,
    state: LearningState,
) -> Vec<LearningFile> {
    let learned_at = chrono::Utc::now().to_rfc3339();
    let mut files: HashMap<String, LearningFile> = HashMap::new();

    for name in mcp_names {
        let original_tools: Vec<OriginalTool> = mcp
            .tools_for_server(name)
            .await
            .into_iter()
            .map(|b| OriginalTool {
                name: b.original_name,
                description: b.description,
            })
            .collect();

        files.insert(
            name.clone(),
            LearningFile {
                mcp_name: name.clone(),
                version: 1,
                learned_at: learned_at.clone(),
                model_used: model_used.clone(),
                original_tools,
                sub_tools: Vec::new(),
                documented_inputs: Vec::new(),
                workflows: Vec::new(),
                insights: state.insights.clone(),
            },
        );
    }

    for sub_tool in state.sub_tools {
        let server = sub_tool.server_name.clone().unwrap_or_default();
        if let Some(file) = files.get_mut(&server) {
            file.sub_tools.push(sub_tool);
        } else if let Some(first) = mcp_names.first()
            && let Some(file) = files.get_mut(first)
        {
            file.sub_tools.push(sub_tool);
        }
    }
    for (server, input) in state.documented_inputs {
        if let Some(file) = files.get_mut(&server) {
            file.documented_inputs.push(input);
        }
    }
    for (server, workflow) in state.workflows {
        if let Some(file) = files.get_mut(&server) {
            file.workflows.push(workflow);
        }
    }

    let mut out: Vec<LearningFile> = files.into_values().collect();
    out.sort_by(|a, b| a.mcp_name.cmp(&b.mcp_name));
    out
}

async fn fetch_page(url: &str) -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()?;
    let body = client.get(url).send().await?.error_for_status()?.text().await?;
    Ok(truncate(&body, BROWSE_MAX_CHARS))
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated)", &text[..end])
}
