// src/analysis/runner.rs
// Drives the two-pass analysis pipeline: planner completion -> deterministic
// execution -> reporter completion -> rendered visuals plus a summary.

use anyhow::Result;
use tracing::{debug, info};

use crate::api::events::{EventSink, ServerEvent, emit};
use crate::error::AgentError;
use crate::llm::{LlmClient, Message, complete_text};
use crate::render::render_visual;
use crate::vars::VariableStore;

use super::ops::{OperationOutcome, execute_plan};
use super::plan::parse_plan;
use super::preview::render_preview;
use super::report::parse_report;
use super::value::{AnalysisStore, AnalysisValue};

/// Result of one `llm(data, question)` call
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// What the Pilot gets told
    pub summary: String,
    /// Rendered visuals for the canvas
    pub dsl: Vec<String>,
    pub operations: Vec<OperationOutcome>,
}

const PLANNER_GUIDE: &str = r#"Compile the question into a plan: one operation per line, of the form
  output_name: operation(arguments)  # optional comment

Operations:
  sum(var[col])  average(var[col])  max(var[col])  min(var[col])  count(var[col])
  difference(a, b)  ratio(a, b)  percentage(a, b)  pct_change(old, new)
  filter(var[col], "<op> <value>")   with ops  >  <  >=  <=  =  !=
  sort_asc(var[col])  sort_desc(var[col])
  add(var[col], number)  subtract(var[col], number)  multiply(var[col], number)  divide(var[col], number)
  add(a[col], b[col])  subtract(a[col], b[col])  multiply(a[col], b[col])  divide(a[col], b[col])
  table(Label: ref_or_list, Label: ref_or_list, ...)

Arguments may be var[col] references, names of earlier outputs, plain
numbers, quoted strings, or ["literal", "lists"]. Output names must be new
identifiers. Reply with the plan only - no prose before or after."#;

const REPORTER_GUIDE: &str = r#"Write the findings for the user. Reply in exactly this shape:

[report]
VISUAL_1: card
title: <short label>
value: <result name or literal>

VISUAL_2: line-chart
title: <short label>
x: <column reference>
y: <column reference>

VISUAL_3: table
title: <short label>
data: <table result name>
[/report]
[summary]<two or three sentences for the assistant driving this session>[/summary]

Use only the visuals the data supports - one card for a headline number, a
line-chart for a series over an ordered axis, a table for grouped rows.
Reference results by name; never copy data values by hand."#;

/// Run the full pipeline over the referenced variables.
pub async fn run_analysis(
    llm: &dyn LlmClient,
    vars: &VariableStore,
    data_refs: &[String],
    question: &str,
    events: &EventSink,
) -> Result<AnalysisOutcome, AgentError> {
    // fresh store per invocation
    let mut analysis = AnalysisStore::new();

    emit(events, ServerEvent::AnalysisPhase { phase: "planning".into() }).await;

    let plan_text = complete_text(llm, &planner_messages(vars, data_refs, question), "analysis-planner").await?;
    debug!(plan = %plan_text, "Planner output");

    let (lines, parse_errors) = parse_plan(&plan_text);
    if lines.is_empty() {
        return Err(AgentError::LlmEmptyOrError(format!(
            "planner produced no runnable operations ({} bad lines)",
            parse_errors.len()
        )));
    }

    emit(events, ServerEvent::AnalysisPhase { phase: "executing".into() }).await;

    let operations = execute_plan(&lines, &mut analysis, vars);
    for op in &operations {
        emit(
            events,
            ServerEvent::AnalysisOperationResult {
                operation: op.line.clone(),
                result: op.result.clone(),
                ok: op.ok,
                note: op.note.clone(),
            },
        )
        .await;
    }

    emit(events, ServerEvent::AnalysisPhase { phase: "reporting".into() }).await;

    let report_text = complete_text(
        llm,
        &reporter_messages(&analysis, &operations, question),
        "analysis-reporter",
    )
    .await?;
    let report = parse_report(&report_text, &analysis, vars);

    let mut dsl = Vec::new();
    for visual in &report.visuals {
        emit(events, ServerEvent::UiCreating { kind: visual.kind().into() }).await;
        dsl.push(render_visual(visual));
    }

    let mut summary = report.summary;
    if summary.is_empty() {
        summary = "Analysis complete.".to_string();
    }
    if !report.problems.is_empty() {
        info!(problems = ?report.problems, "Reporter visuals dropped");
    }

    Ok(AnalysisOutcome {
        summary,
        dsl,
        operations,
    })
}

fn planner_messages(vars: &VariableStore, data_refs: &[String], question: &str) -> Vec<Message> {
    let mut previews = String::new();
    for name in data_refs {
        match vars.get(name) {
            Some(variable) => {
                previews.push_str(&render_preview(variable));
                previews.push('\n');
            }
            None => {
                previews.push_str(&format!("{}: (no such variable)\n", name));
            }
        }
    }

    let user = format!(
        "Data:\n{}\nQuestion: {}\n\nWrite the plan.",
        previews, question
    );

    vec![Message::system(PLANNER_GUIDE), Message::user(user)]
}

fn reporter_messages(
    analysis: &AnalysisStore,
    operations: &[OperationOutcome],
    question: &str,
) -> Vec<Message> {
    let mut results = String::new();
    for op in operations {
        if op.ok {
            // numbers are inlined; columns and tables go by name
            let shown = match analysis.get(&op.output) {
                Some(AnalysisValue::Number(_)) => op.result.clone(),
                Some(other) => format!("{} ({})", op.output, other.kind()),
                None => op.result.clone(),
            };
            results.push_str(&format!("{} = {}\n", op.line, shown));
            if let Some(note) = &op.note {
                results.push_str(&format!("  note: {}\n", note));
            }
        } else {
            results.push_str(&format!("{} FAILED: {}\n", op.line, op.result));
        }
    }

    let user = format!(
        "Question: {}\n\nExecuted operations:\n{}\nWrite the report.",
        question, results
    );

    vec![Message::system(REPORTER_GUIDE), Message::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::{FieldSpec, Variable};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn sales_vars() -> VariableStore {
        let mut vars = VariableStore::new();
        let mut schema = BTreeMap::new();
        schema.insert("revenue".to_string(), FieldSpec::default());
        vars.put(Variable {
            name: "q1_sales".into(),
            schema,
            actual_data: json!([{"revenue": 10}, {"revenue": 20}]),
            description: "Q1".into(),
            created_by: "test".into(),
        });
        vars
    }

    #[test]
    fn test_planner_messages_contain_previews_not_full_data() {
        let vars = sales_vars();
        let messages = planner_messages(&vars, &["q1_sales".into()], "total revenue?");
        let user = messages[1].content.as_deref().unwrap();
        assert!(user.contains("q1_sales"));
        assert!(user.contains("revenue"));
        assert!(user.contains("total revenue?"));
    }

    #[test]
    fn test_planner_messages_flag_missing_variable() {
        let vars = VariableStore::new();
        let messages = planner_messages(&vars, &["ghost".into()], "q");
        assert!(
            messages[1]
                .content
                .as_deref()
                .unwrap()
                .contains("(no such variable)")
        );
    }

    #[test]
    fn test_reporter_messages_inline_numbers_and_name_columns() {
        let vars = sales_vars();
        let (lines, _) = parse_plan(
            "total: sum(q1_sales[revenue])\nbig: filter(q1_sales[revenue], \"> 15\")",
        );
        let mut analysis = AnalysisStore::new();
        let ops = execute_plan(&lines, &mut analysis, &vars);

        let messages = reporter_messages(&analysis, &ops, "how much?");
        let user = messages[1].content.as_deref().unwrap();
        assert!(user.contains("total: sum(q1_sales[revenue]) = 30.00"));
        assert!(user.contains("big (column)"));
    }

    #[test]
    fn test_reporter_messages_show_failures() {
        let vars = sales_vars();
        let (lines, _) = parse_plan("x: sum(nope[v])");
        let mut analysis = AnalysisStore::new();
        let ops = execute_plan(&lines, &mut analysis, &vars);

        let messages = reporter_messages(&analysis, &ops, "q");
        assert!(
            messages[1]
                .content
                .as_deref()
                .unwrap()
                .contains("FAILED: COLUMN_NOT_FOUND")
        );
    }
}
