// src/agent/prompts.rs
// System prompts for the Pilot and Executor agents

use crate::vars::VariableSummary;

/// Built-in tools the Executor can always call, next to learned sub-tools.
pub const BUILTIN_TOOLS: &[(&str, &str)] = &[
    (
        "llm",
        "llm(data: [var1, var2], question: \"...\") - run tabular analysis over stored \
         variables and push visuals to the canvas. Use for totals, comparisons, trends.",
    ),
    (
        "extractor",
        "extractor(data: [var1], extract: \"what to pull out\") - pull a specific value \
         or list out of stored variables into a new variable.",
    ),
    (
        "table",
        "table(title: \"...\", data: var_name) - show a variable as a table on the canvas.",
    ),
    (
        "line-chart",
        "line-chart(title: \"...\", x: var[field], y: var[field]) - plot one series.",
    ),
    (
        "card",
        "card(title: \"...\", value: var[field] or literal) - show one headline number.",
    ),
    (
        "alert",
        "alert(level: info|warning|error, message: \"...\") - show a notice on the canvas.",
    ),
];

/// The Pilot decides exactly one next step per turn.
pub fn pilot_prompt(
    tool_summaries: &[String],
    variables: &[VariableSummary],
    current_date: &str,
) -> String {
    let tools = if tool_summaries.is_empty() {
        "(no learned sub-tools; only built-ins are available)".to_string()
    } else {
        tool_summaries.join("\n")
    };

    let vars = if variables.is_empty() {
        "(none yet)".to_string()
    } else {
        variables
            .iter()
            .map(|v| {
                format!(
                    "- {} [{}]: {}",
                    v.name,
                    v.fields.join(", "),
                    v.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"You are the strategist of a data assistant. Today is {current_date}.

Each turn you receive the conversation so far and reply with exactly ONE of:

EXECUTOR: <one instruction in plain language>
REPLY: <final message to the user>

EXECUTOR rules:
- One action, one tool, one step. Never chain steps in a single instruction.
- Name the tool or sub-tool to use and which stored variables to use, in
  plain words. No code, no brackets, no argument syntax.
- Never invent data values. If something is unknown, instruct the executor
  to fetch or extract it first.

REPLY when the user's request is fully answered, or nothing more can be done.

Available tools (the executor knows their exact arguments):
{tools}

Built-in executor tools: llm (data analysis and visuals), extractor
(pull values out of variables), table, line-chart, card, alert (canvas).

Stored variables:
{vars}"#
    )
}

/// The Executor turns one Pilot instruction into one tool call.
pub fn executor_prompt(tool_docs: &str) -> String {
    format!(
        r#"You translate one instruction into exactly one tool call.

Reply in this shape and nothing else:

[variable_name:] tool_name(arg1: value1, arg2: value2)
DONE: <one-line report of what you did>

- `variable_name:` names the result when the call stores data; omit it for
  canvas tools (table, line-chart, card, alert) and for llm.
- Values are quoted strings, numbers, lists like [a, b], or references to a
  stored variable's field written var_name[field].
- Use only the tools documented below. If the instruction cannot be done
  with them, reply exactly: DONE: NEEDS_INFO <what is missing>

{tool_docs}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pilot_prompt_lists_variables_without_data() {
        let summaries = vec![VariableSummary {
            name: "traffic".into(),
            description: "Daily traffic".into(),
            fields: vec!["date".into(), "sessions".into()],
        }];
        let prompt = pilot_prompt(&["get_traffic (property, start): fetch traffic".into()], &summaries, "2025-11-20");
        assert!(prompt.contains("traffic [date, sessions]"));
        assert!(prompt.contains("get_traffic"));
        assert!(prompt.contains("2025-11-20"));
        assert!(prompt.contains("EXECUTOR:"));
    }

    #[test]
    fn test_pilot_prompt_empty_stores() {
        let prompt = pilot_prompt(&[], &[], "2025-11-20");
        assert!(prompt.contains("(none yet)"));
        assert!(prompt.contains("only built-ins"));
    }

    #[test]
    fn test_executor_prompt_carries_docs() {
        let prompt = executor_prompt("### get_traffic\ninputs: property");
        assert!(prompt.contains("get_traffic"));
        assert!(prompt.contains("DONE:"));
    }
}
