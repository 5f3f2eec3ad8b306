// src/agent/executor.rs
// The Executor: turns one Pilot instruction into one concrete tool call,
// runs it, and reports back. Dispatch covers learned sub-tools, the
// analysis pipeline, the extractor, and the canvas tools.

use serde_json::Value;
use std::collections::HashMap;

use crate::analysis::run_analysis;
use crate::api::events::{EventSink, ServerEvent, emit};
use crate::error::AgentError;
use crate::llm::{LlmClient, Message, complete_text};
use crate::mcp::McpManager;
use crate::render::{Visual, render_visual, table_from_pairs};
use crate::subtool::{SubTool, SubToolCatalog, execute_sub_tool};
use crate::vars::{Variable, VariableStore};

use super::call_syntax::{CallArg, CallValue, ToolInvocation, parse_invocation};
use super::prompts::{BUILTIN_TOOLS, executor_prompt};

/// What one Executor turn produced
#[derive(Debug)]
pub struct ExecutorOutcome {
    /// The report the Pilot sees
    pub report: String,
    pub success: bool,
    /// Canvas strings produced this step
    pub dsl: Vec<String>,
}

impl ExecutorOutcome {
    fn failure(report: impl Into<String>) -> Self {
        Self {
            report: report.into(),
            success: false,
            dsl: Vec::new(),
        }
    }

    fn success_with(report: impl Into<String>, dsl: Vec<String>) -> Self {
        Self {
            report: report.into(),
            success: true,
            dsl,
        }
    }
}

/// Run one Pilot instruction end to end.
pub async fn run_instruction(
    llm: &dyn LlmClient,
    catalog: &SubToolCatalog,
    mcp: &McpManager,
    vars: &mut VariableStore,
    instruction: &str,
    events: &EventSink,
) -> ExecutorOutcome {
    let docs = select_tool_docs(catalog, instruction).await;

    let messages = vec![
        Message::system(executor_prompt(&docs)),
        Message::user(instruction.to_string()),
    ];

    let completion = match complete_text(llm, &messages, "executor").await {
        Ok(text) => text,
        Err(e) => return ExecutorOutcome::failure(format!("Executor failed: {}", e)),
    };

    if let Some(needs) = needs_info(&completion) {
        return ExecutorOutcome::failure(format!("NEEDS_INFO: {}", needs));
    }

    let invocation = match parse_invocation(&completion) {
        Ok(invocation) => invocation,
        Err(e) => {
            // a parse failure is reported to the Pilot; the session does
            // not advance
            return ExecutorOutcome::failure(format!(
                "Could not parse the tool call ({}). Rephrase the instruction as one step.",
                e
            ));
        }
    };

    emit(
        events,
        ServerEvent::ExecutorCallingTool {
            tool: invocation.tool_name.clone(),
            variable: invocation.variable_name.clone(),
        },
    )
    .await;

    let outcome = dispatch(llm, catalog, mcp, vars, invocation, events).await;

    emit(
        events,
        ServerEvent::ExecutorToolResult {
            success: outcome.success,
            report: outcome.report.clone(),
        },
    )
    .await;

    outcome
}

/// `DONE: NEEDS_INFO ...` without a call means the Executor gave up.
fn needs_info(completion: &str) -> Option<String> {
    if completion.contains('(') {
        return None;
    }
    completion
        .lines()
        .find_map(|l| l.trim().strip_prefix("DONE:"))
        .map(str::trim)
        .and_then(|r| r.strip_prefix("NEEDS_INFO"))
        .map(|r| r.trim().to_string())
}

/// Tool documents the instruction plausibly mentions: substring match over
/// sub-tool ids and names plus the built-in tool names.
pub async fn select_tool_docs(catalog: &SubToolCatalog, instruction: &str) -> String {
    let lowered = instruction.to_lowercase();
    let mut docs = String::new();

    let all = catalog.all().await;
    let matched: Vec<&SubTool> = all
        .iter()
        .filter(|tool| {
            lowered.contains(&tool.id.to_lowercase())
                || lowered.contains(&tool.name.to_lowercase())
        })
        .collect();

    if matched.is_empty() {
        if !all.is_empty() {
            docs.push_str("## Sub-tools\n");
            for tool in &all {
                docs.push_str(&format!("- {}\n", tool.summary()));
            }
            docs.push('\n');
        }
    } else {
        docs.push_str("## Sub-tools\n\n");
        for tool in matched {
            docs.push_str(&render_sub_tool_doc(tool));
        }
    }

    docs.push_str("## Built-ins\n");
    for (_, doc) in BUILTIN_TOOLS {
        docs.push_str(&format!("- {}\n", doc));
    }

    docs
}

fn render_sub_tool_doc(tool: &SubTool) -> String {
    let mut doc = format!("### {}\n{}\n", tool.id, tool.description);
    for input in &tool.inputs {
        doc.push_str(&format!(
            "- {} ({:?}{}): {}{}\n",
            input.name,
            input.input_type,
            if input.required { ", required" } else { "" },
            input.description,
            input
                .options
                .as_ref()
                .map(|o| format!(" options: {}", o.join("|")))
                .unwrap_or_default()
        ));
    }
    if !tool.output_fields.is_empty() {
        let fields: Vec<&str> = tool.output_fields.iter().map(|f| f.name.as_str()).collect();
        doc.push_str(&format!("Returns fields: {}\n", fields.join(", ")));
    }
    if !tool.requires_first.is_empty() {
        for dep in &tool.requires_first {
            doc.push_str(&format!("Requires first: {} ({})\n", dep.sub_tool, dep.reason));
        }
    }
    doc.push('\n');
    doc
}

async fn dispatch(
    llm: &dyn LlmClient,
    catalog: &SubToolCatalog,
    mcp: &McpManager,
    vars: &mut VariableStore,
    invocation: ToolInvocation,
    events: &EventSink,
) -> ExecutorOutcome {
    match invocation.tool_name.as_str() {
        "llm" => run_analysis_call(llm, vars, &invocation, events).await,
        "extractor" => run_extractor(llm, vars, &invocation).await,
        "table" | "line-chart" | "card" | "alert" => {
            run_ui_tool(vars, &invocation, events).await
        }
        _ => run_sub_tool_call(catalog, mcp, vars, invocation, events).await,
    }
}

// ---------------------------------------------------------------------------
// argument resolution

/// Resolve a parsed value into concrete JSON, inlining variable data.
fn resolve_value(value: &CallValue, vars: &VariableStore) -> Result<Value, String> {
    match value {
        CallValue::Text(t) => Ok(Value::String(t.clone())),
        CallValue::Number(n) => Ok(serde_json::json!(n)),
        CallValue::Bool(b) => Ok(Value::Bool(*b)),
        CallValue::Reference { var, field } => {
            let variable = vars
                .get(var)
                .ok_or_else(|| format!("no stored variable named '{}'", var))?;
            variable
                .field(field)
                .ok_or_else(|| format!("variable '{}' has no field '{}'", var, field))
        }
        CallValue::Word(word) => Ok(match vars.get(word) {
            Some(variable) => variable.actual_data.clone(),
            None => Value::String(word.clone()),
        }),
        CallValue::List(items) => {
            let resolved = items
                .iter()
                .map(|item| resolve_value(item, vars))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::Array(resolved))
        }
    }
}

/// Names referenced by a `data: [...]` argument.
fn data_ref_names(arg: &CallValue) -> Vec<String> {
    let mut names = Vec::new();
    match arg {
        CallValue::List(items) => {
            for item in items {
                names.extend(data_ref_names(item));
            }
        }
        CallValue::Word(w) => names.push(w.clone()),
        CallValue::Reference { var, .. } => names.push(var.clone()),
        CallValue::Text(t) => names.push(t.clone()),
        _ => {}
    }
    names
}

fn named_arg<'a>(invocation: &'a ToolInvocation, name: &str) -> Option<&'a CallValue> {
    invocation
        .args
        .iter()
        .find(|a| a.name.as_deref() == Some(name))
        .map(|a| &a.value)
}

fn arg_text(value: &CallValue) -> String {
    match value {
        CallValue::Text(t) => t.clone(),
        CallValue::Word(w) => w.clone(),
        CallValue::Number(n) => format!("{}", n),
        CallValue::Bool(b) => b.to_string(),
        other => format!("{:?}", other),
    }
}

// ---------------------------------------------------------------------------
// dispatch targets

async fn run_sub_tool_call(
    catalog: &SubToolCatalog,
    mcp: &McpManager,
    vars: &mut VariableStore,
    invocation: ToolInvocation,
    events: &EventSink,
) -> ExecutorOutcome {
    let Some(sub_tool) = catalog.get(&invocation.tool_name).await else {
        return ExecutorOutcome::failure(format!(
            "NEEDS_INFO: no tool named '{}' is available",
            invocation.tool_name
        ));
    };

    let supplied = match collect_sub_tool_args(&sub_tool, &invocation.args, vars) {
        Ok(map) => map,
        Err(e) => return ExecutorOutcome::failure(e),
    };

    emit(
        events,
        ServerEvent::ToolCalling {
            tool: sub_tool.id.clone(),
        },
    )
    .await;

    match execute_sub_tool(catalog, mcp, &sub_tool.id, &supplied).await {
        Ok(outcome) => {
            let name = invocation
                .variable_name
                .clone()
                .unwrap_or_else(|| format!("{}_result", sub_tool.id));

            let fields: Vec<String> = outcome
                .schema
                .keys()
                .map(|f| format!("{}[{}]", name, f))
                .collect();

            vars.put(Variable {
                name: name.clone(),
                schema: outcome.schema,
                actual_data: outcome.actual_data,
                description: outcome.description,
                created_by: sub_tool.id.clone(),
            });

            emit(
                events,
                ServerEvent::ToolSuccess {
                    tool: sub_tool.id.clone(),
                    variable: Some(name.clone()),
                },
            )
            .await;

            let mut report = format!("Stored in '{}'.", name);
            if !fields.is_empty() {
                report.push_str(&format!(" Available: {}", fields.join(", ")));
            }
            if outcome.extraction_fallback {
                report.push_str(" (projection missed; raw payload stored)");
            }
            ExecutorOutcome::success_with(report, Vec::new())
        }
        Err(e) => {
            emit(
                events,
                ServerEvent::ToolError {
                    tool: sub_tool.id.clone(),
                    error: e.to_string(),
                },
            )
            .await;
            match e {
                AgentError::ToolNotFound(_) => {
                    ExecutorOutcome::failure(format!("NEEDS_INFO: {}", e))
                }
                other => ExecutorOutcome::failure(format!("Tool call failed: {}", other)),
            }
        }
    }
}

/// Named args bind by input name; positional args map to the declared
/// inputs in order.
fn collect_sub_tool_args(
    sub_tool: &SubTool,
    args: &[CallArg],
    vars: &VariableStore,
) -> Result<HashMap<String, Value>, String> {
    let mut supplied = HashMap::new();
    let mut positional = 0usize;

    for arg in args {
        let input_name = match &arg.name {
            Some(name) => name.clone(),
            None => {
                let declared = sub_tool
                    .inputs
                    .get(positional)
                    .map(|i| i.name.clone())
                    .ok_or_else(|| {
                        format!(
                            "'{}' takes {} input(s) but got more positional arguments",
                            sub_tool.id,
                            sub_tool.inputs.len()
                        )
                    })?;
                positional += 1;
                declared
            }
        };

        let value = resolve_value(&arg.value, vars).map_err(|e| format!("NEEDS_INFO: {}", e))?;
        supplied.insert(input_name, value);
    }

    Ok(supplied)
}

async fn run_analysis_call(
    llm: &dyn LlmClient,
    vars: &VariableStore,
    invocation: &ToolInvocation,
    events: &EventSink,
) -> ExecutorOutcome {
    let Some(data) = named_arg(invocation, "data").or_else(|| {
        invocation
            .args
            .first()
            .filter(|a| a.name.is_none())
            .map(|a| &a.value)
    }) else {
        return ExecutorOutcome::failure("llm needs a data: [variables] argument");
    };
    let refs = data_ref_names(data);
    if refs.is_empty() {
        return ExecutorOutcome::failure("llm got an empty data list");
    }

    let question = named_arg(invocation, "question")
        .map(arg_text)
        .unwrap_or_default();
    if question.is_empty() {
        return ExecutorOutcome::failure("llm needs a question: \"...\" argument");
    }

    match run_analysis(llm, vars, &refs, &question, events).await {
        Ok(outcome) => {
            // the Pilot only sees the summary; visuals go to the canvas
            ExecutorOutcome::success_with(outcome.summary, outcome.dsl)
        }
        Err(e) => ExecutorOutcome::failure(format!("Analysis failed: {}", e)),
    }
}

async fn run_extractor(
    llm: &dyn LlmClient,
    vars: &mut VariableStore,
    invocation: &ToolInvocation,
) -> ExecutorOutcome {
    let Some(data) = named_arg(invocation, "data") else {
        return ExecutorOutcome::failure("extractor needs a data: [variables] argument");
    };
    let instruction = named_arg(invocation, "extract")
        .map(arg_text)
        .unwrap_or_default();
    if instruction.is_empty() {
        return ExecutorOutcome::failure("extractor needs an extract: \"...\" argument");
    }

    let mut inlined = String::new();
    for name in data_ref_names(data) {
        match vars.get(&name) {
            Some(variable) => {
                let rendered = serde_json::to_string_pretty(&variable.actual_data)
                    .unwrap_or_else(|_| variable.actual_data.to_string());
                inlined.push_str(&format!("## {}\n```json\n{}\n```\n", name, rendered));
            }
            None => {
                return ExecutorOutcome::failure(format!(
                    "NEEDS_INFO: no stored variable named '{}'",
                    name
                ));
            }
        }
    }

    let messages = vec![
        Message::system(
            "Extract exactly what is asked from the data. Reply with the value alone - \
             JSON when structured, plain text when scalar. Reply NOT_FOUND if the data \
             does not contain it.",
        ),
        Message::user(format!("{}\nExtract: {}", inlined, instruction)),
    ];

    let response = match complete_text(llm, &messages, "extractor").await {
        Ok(text) => text,
        Err(e) => return ExecutorOutcome::failure(format!("Extractor failed: {}", e)),
    };

    if response.trim().starts_with("NOT_FOUND") {
        return ExecutorOutcome::failure("NOT_FOUND");
    }

    let data_value =
        serde_json::from_str::<Value>(response.trim()).unwrap_or(Value::String(response.trim().to_string()));
    let name = invocation
        .variable_name
        .clone()
        .unwrap_or_else(|| "extracted".to_string());

    vars.put(Variable {
        name: name.clone(),
        schema: Default::default(),
        actual_data: data_value,
        description: instruction,
        created_by: "extractor".into(),
    });

    ExecutorOutcome::success_with(format!("Stored in '{}'", name), Vec::new())
}

async fn run_ui_tool(
    vars: &VariableStore,
    invocation: &ToolInvocation,
    events: &EventSink,
) -> ExecutorOutcome {
    let title = named_arg(invocation, "title").map(arg_text).unwrap_or_default();

    let visual = match invocation.tool_name.as_str() {
        "card" => {
            let Some(value) = named_arg(invocation, "value") else {
                return ExecutorOutcome::failure("card needs a value argument");
            };
            match resolve_value(value, vars) {
                Ok(resolved) => Visual::Card {
                    title,
                    value: render_scalar(&resolved),
                },
                Err(e) => return ExecutorOutcome::failure(format!("NEEDS_INFO: {}", e)),
            }
        }
        "alert" => {
            let level = named_arg(invocation, "level").map(arg_text).unwrap_or_else(|| "info".into());
            let message = named_arg(invocation, "message").map(arg_text).unwrap_or_default();
            if message.is_empty() {
                return ExecutorOutcome::failure("alert needs a message argument");
            }
            Visual::Alert { level, message }
        }
        "line-chart" => {
            let (Some(x), Some(y)) = (named_arg(invocation, "x"), named_arg(invocation, "y"))
            else {
                return ExecutorOutcome::failure("line-chart needs x and y arguments");
            };
            match (column_of(x, vars), column_of(y, vars)) {
                (Ok(x), Ok(y)) => Visual::LineChart { title, x, y },
                (Err(e), _) | (_, Err(e)) => {
                    return ExecutorOutcome::failure(format!("NEEDS_INFO: {}", e));
                }
            }
        }
        "table" => {
            let Some(data) = named_arg(invocation, "data") else {
                return ExecutorOutcome::failure("table needs a data argument");
            };
            match table_visual(title, data, vars) {
                Ok(visual) => visual,
                Err(e) => return ExecutorOutcome::failure(format!("NEEDS_INFO: {}", e)),
            }
        }
        _ => unreachable!("dispatch only routes canvas tools here"),
    };

    emit(
        events,
        ServerEvent::UiCreating {
            kind: visual.kind().into(),
        },
    )
    .await;

    let dsl = render_visual(&visual);
    ExecutorOutcome::success_with("Displayed to user.", vec![dsl])
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::Array(items) if items.len() == 1 => render_scalar(&items[0]),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn column_of(value: &CallValue, vars: &VariableStore) -> Result<Vec<Value>, String> {
    match resolve_value(value, vars)? {
        Value::Array(items) => Ok(items),
        scalar => Ok(vec![scalar]),
    }
}

fn table_visual(title: String, data: &CallValue, vars: &VariableStore) -> Result<Visual, String> {
    match data {
        CallValue::Reference { var, field } => {
            let variable = vars.get(var).ok_or_else(|| format!("no stored variable named '{}'", var))?;
            let cells = variable
                .field(field)
                .and_then(|v| v.as_array().cloned())
                .ok_or_else(|| format!("variable '{}' has no field '{}'", var, field))?;
            let (columns, rows) = table_from_pairs(&[(field.clone(), cells)]);
            Ok(Visual::Table { title, columns, rows })
        }
        CallValue::Word(name) => {
            let variable = vars.get(name).ok_or_else(|| format!("no stored variable named '{}'", name))?;
            let columns = if variable.schema.is_empty() {
                match &variable.actual_data {
                    Value::Array(items) => items
                        .iter()
                        .find_map(|i| i.as_object())
                        .map(|o| o.keys().cloned().collect())
                        .unwrap_or_default(),
                    _ => Vec::new(),
                }
            } else {
                variable.field_names()
            };
            if columns.is_empty() {
                return Err(format!("variable '{}' has no tabular data", name));
            }

            let records: Vec<&Value> = match &variable.actual_data {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            let rows: Vec<Vec<Value>> = records
                .iter()
                .map(|record| {
                    columns
                        .iter()
                        .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            Ok(Visual::Table { title, columns, rows })
        }
        other => Err(format!("table data must reference a variable, got {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::call_syntax::parse_invocation;
    use crate::vars::FieldSpec;
    use serde_json::json;
    use std::collections::BTreeMap;
    use tokio::sync::mpsc;

    fn traffic_vars() -> VariableStore {
        let mut vars = VariableStore::new();
        let mut schema = BTreeMap::new();
        schema.insert("date".to_string(), FieldSpec::default());
        schema.insert("sessions".to_string(), FieldSpec::default());
        vars.put(Variable {
            name: "traffic".into(),
            schema,
            actual_data: json!([
                {"date": "2025-11-01", "sessions": 42},
                {"date": "2025-11-02", "sessions": 55}
            ]),
            description: "Daily traffic".into(),
            created_by: "get_traffic".into(),
        });
        vars
    }

    fn sink() -> EventSink {
        mpsc::channel(64).0
    }

    #[test]
    fn test_resolve_reference_inlines_column() {
        let vars = traffic_vars();
        let value = CallValue::Reference {
            var: "traffic".into(),
            field: "sessions".into(),
        };
        assert_eq!(resolve_value(&value, &vars).unwrap(), json!([42, 55]));
    }

    #[test]
    fn test_resolve_word_prefers_variable() {
        let vars = traffic_vars();
        let resolved = resolve_value(&CallValue::Word("traffic".into()), &vars).unwrap();
        assert!(resolved.is_array());

        let literal = resolve_value(&CallValue::Word("hello".into()), &vars).unwrap();
        assert_eq!(literal, json!("hello"));
    }

    #[test]
    fn test_data_ref_names_from_list() {
        let value = CallValue::List(vec![
            CallValue::Word("a".into()),
            CallValue::Reference {
                var: "b".into(),
                field: "f".into(),
            },
        ]);
        assert_eq!(data_ref_names(&value), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_ui_card_from_literal() {
        let vars = traffic_vars();
        let invocation = parse_invocation(r#"card(title: "Total", value: 97)"#).unwrap();
        let outcome = run_ui_tool(&vars, &invocation, &sink()).await;
        assert!(outcome.success);
        assert_eq!(outcome.report, "Displayed to user.");
        assert_eq!(outcome.dsl, vec!["[card title=\"Total\" value=\"97.0\"]"]);
    }

    #[tokio::test]
    async fn test_ui_line_chart_from_references() {
        let vars = traffic_vars();
        let invocation =
            parse_invocation(r#"line-chart(title: "Sessions", x: traffic[date], y: traffic[sessions])"#)
                .unwrap();
        let outcome = run_ui_tool(&vars, &invocation, &sink()).await;
        assert!(outcome.success);
        assert!(outcome.dsl[0].starts_with("[line-chart title=\"Sessions\""));
        assert!(outcome.dsl[0].contains("x=\"2025-11-01,2025-11-02\""));
        assert!(outcome.dsl[0].contains("y=\"42,55\""));
    }

    #[tokio::test]
    async fn test_ui_table_from_variable() {
        let vars = traffic_vars();
        let invocation = parse_invocation(r#"table(title: "Traffic", data: traffic)"#).unwrap();
        let outcome = run_ui_tool(&vars, &invocation, &sink()).await;
        assert!(outcome.success);
        assert!(outcome.dsl[0].contains("columns=\"date|sessions\""));
        assert!(outcome.dsl[0].contains("2025-11-01|42"));
    }

    #[tokio::test]
    async fn test_ui_unknown_variable_needs_info() {
        let vars = VariableStore::new();
        let invocation = parse_invocation("table(title: \"x\", data: ghost)").unwrap();
        let outcome = run_ui_tool(&vars, &invocation, &sink()).await;
        assert!(!outcome.success);
        assert!(outcome.report.contains("NEEDS_INFO"));
    }

    #[test]
    fn test_collect_positional_args_map_in_order() {
        let sub_tool: SubTool = serde_json::from_value(json!({
            "id": "t",
            "name": "t",
            "parent_tool": "p",
            "inputs": [
                {"name": "property", "map_to_parent_arg": "property"},
                {"name": "start", "map_to_parent_arg": "start"}
            ]
        }))
        .unwrap();
        let vars = VariableStore::new();
        let invocation = parse_invocation(r#"x: t("123", "2025-11-01")"#).unwrap();

        let supplied = collect_sub_tool_args(&sub_tool, &invocation.args, &vars).unwrap();
        assert_eq!(supplied["property"], json!("123"));
        assert_eq!(supplied["start"], json!("2025-11-01"));
    }

    #[test]
    fn test_collect_too_many_positionals_errors() {
        let sub_tool: SubTool = serde_json::from_value(json!({
            "id": "t",
            "name": "t",
            "parent_tool": "p",
            "inputs": [{"name": "a", "map_to_parent_arg": "a"}]
        }))
        .unwrap();
        let vars = VariableStore::new();
        let invocation = parse_invocation("x: t(1, 2)").unwrap();
        assert!(collect_sub_tool_args(&sub_tool, &invocation.args, &vars).is_err());
    }

    #[test]
    fn test_needs_info_detection() {
        assert_eq!(
            needs_info("DONE: NEEDS_INFO the property id is unknown"),
            Some("the property id is unknown".to_string())
        );
        assert_eq!(needs_info("tool(a: 1)\nDONE: ok"), None);
    }
}
