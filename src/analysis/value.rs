// src/analysis/value.rs
// Ephemeral typed values used by the analysis runtime. A fresh store is
// created for every analysis invocation; nothing here outlives one call.

use serde_json::Value;
use std::collections::HashMap;

/// A value produced by an analysis operation
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisValue {
    /// A flat list of cell values
    Column(Vec<Value>),
    /// Labeled columns of equal length
    Table {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// A scalar, already rounded to 2 decimals
    Number(f64),
}

impl AnalysisValue {
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisValue::Column(_) => "column",
            AnalysisValue::Table { .. } => "table",
            AnalysisValue::Number(_) => "number",
        }
    }

    /// Short rendering for operation-result events and the reporter prompt.
    pub fn render(&self) -> String {
        match self {
            AnalysisValue::Number(n) => format!("{:.2}", n),
            AnalysisValue::Column(cells) => {
                let preview: Vec<String> = cells.iter().take(5).map(render_cell).collect();
                if cells.len() > 5 {
                    format!("[{}, ...] ({} values)", preview.join(", "), cells.len())
                } else {
                    format!("[{}]", preview.join(", "))
                }
            }
            AnalysisValue::Table { columns, rows } => {
                format!("table({}) with {} rows", columns.join(", "), rows.len())
            }
        }
    }
}

pub fn render_cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Coerce a cell to a number: JSON numbers directly, strings when they
/// parse. Everything else is non-numeric.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Round to 2 decimals, the fixed precision of every numeric result.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Store for one analysis invocation
#[derive(Debug, Default)]
pub struct AnalysisStore {
    values: HashMap<String, AnalysisValue>,
}

impl AnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, name: impl Into<String>, value: AnalysisValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AnalysisValue> {
        self.values.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.values.keys().cloned().collect();
        names.sort();
        names
    }
}
