// src/learning/prompt.rs
// System prompt for the exploratory learning agent

use crate::mcp::ToolBinding;

/// Build the learning system prompt for one batch of tools.
pub fn learning_prompt(server_names: &[String], tools: &[ToolBinding]) -> String {
    let mut tool_docs = String::new();
    for tool in tools {
        tool_docs.push_str(&format!(
            "### {}\n{}\nInput schema:\n```json\n{}\n```\n\n",
            tool.sanitized_name,
            tool.description,
            serde_json::to_string_pretty(&tool.input_schema).unwrap_or_else(|_| "{}".into())
        ));
    }

    format!(
        r#"You are exploring the tool server(s) {servers} to learn how their tools
actually behave, then distilling what you find into focused sub-tools.

Respond with exactly one tagged block per message:

[CALL_TOOL]
{{"tool": "<sanitized tool name>", "args": {{...}}}}
Call a tool to probe it. The full response comes back as the next message.

[BROWSE_WEB]
{{"url": "https://..."}}
Fetch a documentation page when a tool's inputs need outside context.

[INPUT_LEARNED]
{{"tool": "<tool>", "input": "<arg name>", "description": "...", "example": ...}}
Record what you learned about one input.

[SUB_TOOL]
{{"id": "<snake_case_id>", "name": "...", "description": "...",
  "parent_tool": "<sanitized tool name>", "parent_default_args": {{...}},
  "inputs": [{{"name": "...", "type": "enum|string|number|date|reference|format",
              "required": true, "description": "...",
              "map_to_parent_arg": "<dotted.path[0].into.args>",
              "options": [...], "source": {{"tool": "...", "from_path": "..."}}}}],
  "json_path": "<projection>",
  "output_fields": [{{"name": "...", "path": "...", "type": "...", "description": "..."}}],
  "requires_first": [{{"sub_tool": "...", "reason": "...", "extract_field": "...", "from_path": "..."}}],
  "output_example": ...}}
Emit one focused sub-tool once you have verified the call shape works.

[WORKFLOW]
{{"id": "...", "userTask": "...", "category": "...", "steps": ["sub_tool_id", ...],
  "answerTemplate": "...", "decisionPoints": ["..."]}}
Record a multi-step recipe a user would actually ask for.

[LEARNING_COMPLETE]
{{"insights": "..."}}
Finish when the useful surface is covered.

Rules:
- Probe before you emit: every sub-tool must be backed by a call you made.
- Tool responses you see are already unwrapped from their transport
  envelope. Write every json_path and output field path against the JSON
  exactly as it appears in the response message, never against any outer
  envelope.
- Prefer a few high-value sub-tools over exhaustive coverage. Each one
  should answer a concrete user question.
- Reference inputs (type "reference") must name the sub-tool and path that
  produce their values.

## Tools

{tool_docs}"#,
        servers = server_names.join(", "),
        tool_docs = tool_docs
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prompt_includes_tools_and_rules() {
        let tools = vec![ToolBinding {
            server_name: "ga".into(),
            original_name: "run_report".into(),
            sanitized_name: "ga__run_report".into(),
            description: "Runs a GA4 report".into(),
            input_schema: json!({"type": "object", "properties": {"property": {"type": "string"}}}),
        }];
        let prompt = learning_prompt(&["ga".to_string()], &tools);
        assert!(prompt.contains("ga__run_report"));
        assert!(prompt.contains("Runs a GA4 report"));
        assert!(prompt.contains("[LEARNING_COMPLETE]"));
        assert!(prompt.contains("already unwrapped"));
    }
}
