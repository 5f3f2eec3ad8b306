// src/render/mod.rs
// Visual descriptor -> canvas shortcode rendering. The model decides what
// to show; this code decides how it is serialized. No model is involved.

use serde_json::Value;

use crate::analysis::value::render_cell;

/// A visual ready to be rendered: all data references already resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum Visual {
    Card {
        title: String,
        value: String,
    },
    Table {
        title: String,
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    LineChart {
        title: String,
        x: Vec<Value>,
        y: Vec<Value>,
    },
    Alert {
        level: String,
        message: String,
    },
}

impl Visual {
    pub fn kind(&self) -> &'static str {
        match self {
            Visual::Card { .. } => "card",
            Visual::Table { .. } => "table",
            Visual::LineChart { .. } => "line-chart",
            Visual::Alert { .. } => "alert",
        }
    }
}

/// Double quotes delimit shortcode properties; inner quotes become single
/// quotes and newlines become literal `\n`.
fn escape_prop(text: &str) -> String {
    text.replace('"', "'").replace('\n', "\\n").replace('\r', "")
}

/// Cells additionally give up the `|` and `;` separators.
fn escape_cell(value: &Value) -> String {
    escape_prop(&render_cell(value))
        .replace('|', "/")
        .replace(';', ",")
}

/// Render one visual to its shortcode string.
pub fn render_visual(visual: &Visual) -> String {
    match visual {
        Visual::Card { title, value } => format!(
            "[card title=\"{}\" value=\"{}\"]",
            escape_prop(title),
            escape_prop(value)
        ),
        Visual::Table {
            title,
            columns,
            rows,
        } => {
            let header: Vec<String> = columns.iter().map(|c| escape_prop(c).replace('|', "/")).collect();
            let body: Vec<String> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(escape_cell)
                        .collect::<Vec<_>>()
                        .join("|")
                })
                .collect();
            format!(
                "[table title=\"{}\" columns=\"{}\" rows=\"{}\"]",
                escape_prop(title),
                header.join("|"),
                body.join(";")
            )
        }
        Visual::LineChart { title, x, y } => {
            let xs: Vec<String> = x.iter().map(|v| escape_prop(&render_cell(v)).replace(',', " ")).collect();
            let ys: Vec<String> = y.iter().map(|v| escape_prop(&render_cell(v)).replace(',', " ")).collect();
            format!(
                "[line-chart title=\"{}\" x=\"{}\" y=\"{}\"]",
                escape_prop(title),
                xs.join(","),
                ys.join(",")
            )
        }
        Visual::Alert { level, message } => format!(
            "[alert level=\"{}\" message=\"{}\"]",
            escape_prop(level),
            escape_prop(message)
        ),
    }
}

/// Materialize a table from `(label, column)` pairs, row-wise, aligned to
/// the shortest column.
pub fn table_from_pairs(pairs: &[(String, Vec<Value>)]) -> (Vec<String>, Vec<Vec<Value>>) {
    let columns: Vec<String> = pairs.iter().map(|(label, _)| label.clone()).collect();
    let shortest = pairs.iter().map(|(_, cells)| cells.len()).min().unwrap_or(0);
    let rows: Vec<Vec<Value>> = (0..shortest)
        .map(|i| pairs.iter().map(|(_, cells)| cells[i].clone()).collect())
        .collect();
    (columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_card_escapes_quotes_and_newlines() {
        let visual = Visual::Card {
            title: "Revenue \"Q1\"".into(),
            value: "60.00\nup 25%".into(),
        };
        assert_eq!(
            render_visual(&visual),
            "[card title=\"Revenue 'Q1'\" value=\"60.00\\nup 25%\"]"
        );
    }

    #[test]
    fn test_render_table_inlines_rows() {
        let visual = Visual::Table {
            title: "Quarters".into(),
            columns: vec!["Quarter".into(), "Total".into()],
            rows: vec![
                vec![json!("Q1"), json!(60.0)],
                vec![json!("Q2"), json!(75.0)],
            ],
        };
        assert_eq!(
            render_visual(&visual),
            "[table title=\"Quarters\" columns=\"Quarter|Total\" rows=\"Q1|60.0;Q2|75.0\"]"
        );
    }

    #[test]
    fn test_render_line_chart_inlines_series() {
        let visual = Visual::LineChart {
            title: "Sessions".into(),
            x: vec![json!("2025-11-01"), json!("2025-11-02")],
            y: vec![json!(42), json!(55)],
        };
        assert_eq!(
            render_visual(&visual),
            "[line-chart title=\"Sessions\" x=\"2025-11-01,2025-11-02\" y=\"42,55\"]"
        );
    }

    #[test]
    fn test_render_alert() {
        let visual = Visual::Alert {
            level: "info".into(),
            message: "No data for that range".into(),
        };
        assert_eq!(
            render_visual(&visual),
            "[alert level=\"info\" message=\"No data for that range\"]"
        );
    }

    #[test]
    fn test_cell_separators_neutralized() {
        let visual = Visual::Table {
            title: "T".into(),
            columns: vec!["c".into()],
            rows: vec![vec![json!("a|b;c")]],
        };
        let rendered = render_visual(&visual);
        assert!(rendered.contains("a/b,c"));
    }

    #[test]
    fn test_table_from_pairs_aligns_to_shortest() {
        let pairs = vec![
            ("A".to_string(), vec![json!(1), json!(2), json!(3)]),
            ("B".to_string(), vec![json!("x"), json!("y")]),
        ];
        let (columns, rows) = table_from_pairs(&pairs);
        assert_eq!(columns, vec!["A", "B"]);
        assert_eq!(rows, vec![vec![json!(1), json!("x")], vec![json!(2), json!("y")]]);
    }
}
