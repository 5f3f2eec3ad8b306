// src/analysis/preview.rs
// ASCII previews of referenced variables for the planner prompt: column
// names, inferred types, and the first few rows.

use serde_json::Value;

use crate::vars::Variable;

use super::value::render_cell;

const PREVIEW_ROWS: usize = 3;

/// Render a preview of one variable for the planner.
pub fn render_preview(variable: &Variable) -> String {
    let columns = preview_columns(variable);
    let rows = preview_rows(variable, &columns);
    let total = match &variable.actual_data {
        Value::Array(items) => items.len(),
        _ => 1,
    };

    let mut out = String::new();
    out.push_str(&format!(
        "{} ({}): {} row{}\n",
        variable.name,
        variable.description,
        total,
        if total == 1 { "" } else { "s" }
    ));

    if columns.is_empty() {
        out.push_str(&format!("  value: {}\n", render_cell(&variable.actual_data)));
        return out;
    }

    let headers: Vec<String> = columns
        .iter()
        .map(|c| format!("{} [{}]", c, infer_type(variable, c)))
        .collect();
    out.push_str(&render_ascii_table(&headers, &rows));

    if total > PREVIEW_ROWS {
        out.push_str(&format!("  ... {} more rows\n", total - PREVIEW_ROWS));
    }

    out
}

fn preview_columns(variable: &Variable) -> Vec<String> {
    if !variable.schema.is_empty() {
        return variable.field_names();
    }
    // schema-less payloads fall back to the first record's keys
    match &variable.actual_data {
        Value::Array(items) => items
            .iter()
            .find_map(|i| i.as_object())
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default(),
        Value::Object(map) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn preview_rows(variable: &Variable, columns: &[String]) -> Vec<Vec<String>> {
    let records: Vec<&Value> = match &variable.actual_data {
        Value::Array(items) => items.iter().take(PREVIEW_ROWS).collect(),
        other => vec![other],
    };

    records
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| {
                    record
                        .get(c)
                        .map(render_cell)
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}

fn infer_type(variable: &Variable, column: &str) -> &'static str {
    if let Some(spec) = variable.schema.get(column)
        && !spec.data_type.is_empty()
    {
        return match spec.data_type.as_str() {
            "number" => "number",
            "date" => "date",
            _ => "string",
        };
    }

    let first = match &variable.actual_data {
        Value::Array(items) => items.iter().find_map(|i| i.get(column)),
        other => other.get(column),
    };
    match first {
        Some(Value::Number(_)) => "number",
        Some(Value::Bool(_)) => "bool",
        Some(Value::String(s)) if s.trim().parse::<f64>().is_ok() => "number",
        _ => "string",
    }
}

fn render_ascii_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(String::len).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let render_row = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths.get(i).copied().unwrap_or(0)))
            .collect();
        format!("  | {} |\n", padded.join(" | "))
    };

    let mut out = render_row(headers);
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&render_row(&separator));
    for row in rows {
        out.push_str(&render_row(row));
    }
    out
}
