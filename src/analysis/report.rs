// src/analysis/report.rs
// Parses the reporter completion: a [report] block holding VISUAL_n
// descriptors, and a [summary] block for the Pilot. Data references are
// resolved against analysis results first, then session variables.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::render::Visual;
use crate::vars::VariableStore;

use super::ops::resolve_ref;
use super::plan::parse_reference;
use super::value::{AnalysisStore, AnalysisValue};

/// Parsed reporter output
#[derive(Debug, Default)]
pub struct ParsedReport {
    pub visuals: Vec<Visual>,
    pub summary: String,
    pub problems: Vec<String>,
}

fn block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\[report\](.*?)\[/report\]").expect("report block regex")
    })
}

fn summary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\[summary\](.*?)\[/summary\]").expect("summary block regex")
    })
}

fn visual_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^VISUAL_(\d+):\s*(card|table|line-chart)\s*$").expect("visual header regex")
    })
}

/// Parse the reporter's completion and resolve every visual.
pub fn parse_report(
    text: &str,
    analysis: &AnalysisStore,
    vars: &VariableStore,
) -> ParsedReport {
    let mut report = ParsedReport::default();

    if let Some(captures) = summary_re().captures(text) {
        report.summary = captures[1].trim().to_string();
    }

    let Some(body) = block_re().captures(text).map(|c| c[1].to_string()) else {
        if report.summary.is_empty() {
            // a reporter that skipped the protocol still yields its text
            report.summary = text.trim().to_string();
        }
        return report;
    };

    for (kind, props) in split_visual_blocks(&body) {
        match resolve_visual(&kind, &props, analysis, vars) {
            Ok(visual) => report.visuals.push(visual),
            Err(problem) => report.problems.push(problem),
        }
    }

    report
}

/// Split the report body into (kind, properties) blocks.
fn split_visual_blocks(body: &str) -> Vec<(String, HashMap<String, String>)> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, HashMap<String, String>)> = None;

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = visual_header_re().captures(line) {
            if let Some(done) = current.take() {
                blocks.push(done);
            }
            current = Some((captures[2].to_string(), HashMap::new()));
            continue;
        }

        if let Some((_, props)) = current.as_mut()
            && let Some((key, value)) = line.split_once(':')
        {
            props.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    if let Some(done) = current.take() {
        blocks.push(done);
    }
    blocks
}

fn prop<'a>(props: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    props.get(key).map(String::as_str).filter(|v| !v.is_empty())
}

fn resolve_visual(
    kind: &str,
    props: &HashMap<String, String>,
    analysis: &AnalysisStore,
    vars: &VariableStore,
) -> Result<Visual, String> {
    let title = prop(props, "title").unwrap_or("").to_string();

    match kind {
        "card" => {
            let raw = prop(props, "value").ok_or("card needs a value property")?;
            Ok(Visual::Card {
                title,
                value: resolve_scalar_text(raw, analysis, vars),
            })
        }
        "line-chart" => {
            let x_ref = prop(props, "x").ok_or("line-chart needs an x property")?;
            let y_ref = prop(props, "y").ok_or("line-chart needs a y property")?;
            Ok(Visual::LineChart {
                title,
                x: resolve_cells(x_ref, analysis, vars)?,
                y: resolve_cells(y_ref, analysis, vars)?,
            })
        }
        "table" => {
            let data = prop(props, "data").ok_or("table needs a data property")?;
            let reference =
                parse_reference(data).map_err(|e| format!("table data ref: {}", e))?;
            match resolve_ref(&reference, analysis, vars) {
                Ok(AnalysisValue::Table { columns, rows }) => Ok(Visual::Table {
                    title,
                    columns,
                    rows,
                }),
                Ok(AnalysisValue::Column(cells)) => {
                    let label = reference.field.clone().unwrap_or_else(|| data.to_string());
                    let (columns, rows) = crate::render::table_from_pairs(&[(label, cells)]);
                    Ok(Visual::Table {
                        title,
                        columns,
                        rows,
                    })
                }
                Ok(AnalysisValue::Number(n)) => {
                    let (columns, rows) = crate::render::table_from_pairs(&[(
                        data.to_string(),
                        vec![serde_json::json!(n)],
                    )]);
                    Ok(Visual::Table {
                        title,
                        columns,
                        rows,
                    })
                }
                Err(e) => Err(format!("table data: {}", e)),
            }
        }
        other => Err(format!("unknown visual kind '{}'", other)),
    }
}

/// A card value may be a reference or a literal; references render as their
/// stored value.
fn resolve_scalar_text(raw: &str, analysis: &AnalysisStore, vars: &VariableStore) -> String {
    if let Ok(reference) = parse_reference(raw)
        && let Ok(value) = resolve_ref(&reference, analysis, vars)
    {
        return value.render();
    }
    raw.to_string()
}

fn resolve_cells(
    raw: &str,
    analysis: &AnalysisStore,
    vars: &VariableStore,
) -> Result<Vec<serde_json::Value>, String> {
    let reference = parse_reference(raw).map_err(|e| format!("bad data ref '{}': {}", raw, e))?;
    match resolve_ref(&reference, analysis, vars)? {
        AnalysisValue::Column(cells) => Ok(cells),
        AnalysisValue::Number(n) => Ok(vec![serde_json::json!(n)]),
        AnalysisValue::Table { .. } => Err(format!(
            "'{}' is a table; charts need a column reference",
            raw
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vars::{FieldSpec, Variable};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn stores() -> (AnalysisStore, VariableStore) {
        let mut analysis = AnalysisStore::new();
        analysis.put("growth", AnalysisValue::Number(25.0));
        analysis.put(
            "quarters",
            AnalysisValue::Table {
                columns: vec!["Quarter".into(), "Total".into()],
                rows: vec![
                    vec![json!("Q1"), json!(60.0)],
                    vec![json!("Q2"), json!(75.0)],
                ],
            },
        );

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
            created_by: "test".into(),
        });

        (analysis, vars)
    }

    #[test]
    fn test_parse_full_report() {
        let (analysis, vars) = stores();
        let text = "\
[report]
VISUAL_1: card
title: Growth
value: growth

VISUAL_2: line-chart
title: Sessions by day
x: traffic[date]
y: traffic[sessions]

VISUAL_3: table
title: Quarter totals
data: quarters
[/report]
[summary]Sessions grew 25% quarter over quarter.[/summary]";

        let report = parse_report(text, &analysis, &vars);
        assert!(report.problems.is_empty(), "{:?}", report.problems);
        assert_eq!(report.summary, "Sessions grew 25% quarter over quarter.");
        assert_eq!(report.visuals.len(), 3);

        assert_eq!(
            report.visuals[0],
            Visual::Card {
                title: "Growth".into(),
                value: "25.00".into()
            }
        );
        match &report.visuals[1] {
            Visual::LineChart { x, y, .. } => {
                assert_eq!(x, &vec![json!("2025-11-01"), json!("2025-11-02")]);
                assert_eq!(y, &vec![json!(42), json!(55)]);
            }
            other => panic!("expected line chart, got {:?}", other),
        }
        match &report.visuals[2] {
            Visual::Table { columns, rows, .. } => {
                assert_eq!(columns.len(), 2);
                assert_eq!(rows.len(), 2);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }

    #[test]
    fn test_report_without_blocks_falls_back_to_text() {
        let (analysis, vars) = stores();
        let report = parse_report("the data shows growth", &analysis, &vars);
        assert!(report.visuals.is_empty());
        assert_eq!(report.summary, "the data shows growth");
    }

    #[test]
    fn test_bad_reference_becomes_problem() {
        let (analysis, vars) = stores();
        let text = "\
[report]
VISUAL_1: line-chart
title: Broken
x: missing[field]
y: traffic[sessions]
[/report]
[summary]s[/summary]";

        let report = parse_report(text, &analysis, &vars);
        assert!(report.visuals.is_empty());
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].contains("COLUMN_NOT_FOUND"));
    }

    #[test]
    fn test_card_literal_value_passes_through() {
        let (analysis, vars) = stores();
        let text = "[report]\nVISUAL_1: card\ntitle: Note\nvalue: steady\n[/report]";
        let report = parse_report(text, &analysis, &vars);
        assert_eq!(
            report.visuals[0],
            Visual::Card {
                title: "Note".into(),
                value: "steady".into()
            }
        );
    }

    #[test]
    fn test_column_data_renders_single_column_table() {
        let (mut analysis, vars) = stores();
        analysis.put("kept", AnalysisValue::Column(vec![json!(1), json!(2)]));
        let text = "[report]\nVISUAL_1: table\ntitle: Kept\ndata: kept\n[/report]";
        let report = parse_report(text, &analysis, &vars);
        match &report.visuals[0] {
            Visual::Table { columns, rows, .. } => {
                assert_eq!(columns, &vec!["kept".to_string()]);
                assert_eq!(rows.len(), 2);
            }
            other => panic!("expected table, got {:?}", other),
        }
    }
}
