// src/agent/orchestrator.rs
// Drives one user message through the Pilot loop: the Pilot decides a
// step, the Executor runs it, and the report feeds the next decision,
// until the Pilot replies or the step budget runs out.

use tracing::{debug, info};

use crate::api::events::{EventSink, ServerEvent, emit};
use crate::llm::{LlmClient, Message};
use crate::mcp::McpManager;
use crate::subtool::SubToolCatalog;

use super::executor::run_instruction;
use super::pilot::{PilotDecision, STEP_CAP_REPLY, decide};
use super::prompts::{BUILTIN_TOOLS, pilot_prompt};
use super::session::AgentSession;

/// Pilot turns allowed per user message
pub const MAX_PILOT_TURNS: u32 = 10;

/// Everything one user message produced
#[derive(Debug)]
pub struct PilotRunOutcome {
    pub dsl: Vec<String>,
    pub message: String,
    pub history: Vec<Message>,
}

/// Run the Pilot loop for one inbound user message against one session.
pub async fn run_pilot_session(
    llm: &dyn LlmClient,
    catalog: &SubToolCatalog,
    mcp: &McpManager,
    session: &mut AgentSession,
    user_message: &str,
    events: &EventSink,
) -> PilotRunOutcome {
    session.pilot_history.push(Message::user(user_message));

    let mut known_tools: Vec<String> = Vec::new();
    for tool in catalog.all().await {
        known_tools.push(tool.id.clone());
        known_tools.push(tool.name.clone());
    }
    known_tools.extend(BUILTIN_TOOLS.iter().map(|(name, _)| name.to_string()));

    let tool_summaries = catalog.summaries().await;
    let current_date = chrono::Local::now().format("%Y-%m-%d").to_string();

    let mut dsl: Vec<String> = Vec::new();

    for turn in 1..=MAX_PILOT_TURNS {
        emit(events, ServerEvent::PilotThinking { turn }).await;

        let system = pilot_prompt(
            &tool_summaries,
            &session.variables.summaries(),
            &current_date,
        );
        let decision = decide(llm, &system, &session.pilot_history, &known_tools).await;

        match decision {
            PilotDecision::Reply(message) => {
                info!(turn, "Pilot replied");
                session
                    .pilot_history
                    .push(Message::assistant(format!("REPLY: {}", message)));
                emit(
                    events,
                    ServerEvent::PilotResponse {
                        message: message.clone(),
                    },
                )
                .await;
                return PilotRunOutcome {
                    dsl,
                    message,
                    history: session.pilot_history.clone(),
                };
            }
            PilotDecision::Executor(instruction) => {
                debug!(turn, instruction = %instruction, "Pilot instructed executor");
                session
                    .pilot_history
                    .push(Message::assistant(format!("EXECUTOR: {}", instruction)));
                emit(
                    events,
                    ServerEvent::PilotInstructingExecutor {
                        instruction: instruction.clone(),
                    },
                )
                .await;

                let outcome = run_instruction(
                    llm,
                    catalog,
                    mcp,
                    &mut session.variables,
                    &instruction,
                    events,
                )
                .await;
                dsl.extend(outcome.dsl.iter().cloned());

                let status = if outcome.success { "ok" } else { "failed" };
                session.pilot_history.push(Message::user(format!(
                    "Executor report ({}): {}",
                    status, outcome.report
                )));
            }
        }
    }

    let cap = crate::error::AgentError::StepCapReached(MAX_PILOT_TURNS);
    info!(kind = cap.kind(), "{}", cap);
    session
        .pilot_history
        .push(Message::assistant(format!("REPLY: {}", STEP_CAP_REPLY)));
    emit(
        events,
        ServerEvent::PilotResponse {
            message: STEP_CAP_REPLY.to_string(),
        },
    )
    .await;

    PilotRunOutcome {
        dsl,
        message: STEP_CAP_REPLY.to_string(),
        history: session.pilot_history.clone(),
    }
}
