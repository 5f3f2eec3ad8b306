// src/analysis/ops.rs
// Deterministic execution of plan operations. An operation that fails
// stores nothing and reports an error string; the rest of the plan
// still runs.

use serde_json::Value;
use tracing::debug;

use crate::vars::VariableStore;

use super::plan::{PlanArg, PlanLine, VarRef};
use super::value::{AnalysisStore, AnalysisValue, round2, to_number};

/// Outcome of one executed plan line
#[derive(Debug, Clone)]
pub struct OperationOutcome {
    pub line: String,
    pub output: String,
    pub result: String,
    pub ok: bool,
    pub note: Option<String>,
}

/// Execute every line in order against the ephemeral analysis store,
/// with session variables available for `name[field]` references.
pub fn execute_plan(
    lines: &[PlanLine],
    analysis: &mut AnalysisStore,
    vars: &VariableStore,
) -> Vec<OperationOutcome> {
    lines
        .iter()
        .map(|line| execute_line(line, analysis, vars))
        .collect()
}

pub fn execute_line(
    line: &PlanLine,
    analysis: &mut AnalysisStore,
    vars: &VariableStore,
) -> OperationOutcome {
    let rendered = line.render();
    debug!(op = %rendered, "Executing analysis operation");

    let evaluated = apply(line, analysis, vars);

    match evaluated {
        Ok((value, note)) => {
            let result = value.render();
            analysis.put(line.output.clone(), value);
            OperationOutcome {
                line: rendered,
                output: line.output.clone(),
                result,
                ok: true,
                note,
            }
        }
        Err(error) => OperationOutcome {
            line: rendered,
            output: line.output.clone(),
            result: error,
            ok: false,
            note: None,
        },
    }
}

type OpResult = Result<(AnalysisValue, Option<String>), String>;

fn apply(line: &PlanLine, analysis: &AnalysisStore, vars: &VariableStore) -> OpResult {
    match line.op.as_str() {
        "sum" | "average" | "max" | "min" | "count" => aggregate(line, analysis, vars),
        "difference" | "ratio" | "percentage" | "pct_change" => compare(line, analysis, vars),
        "filter" => filter(line, analysis, vars),
        "sort_asc" | "sort_desc" => sort(line, analysis, vars),
        "add" | "subtract" | "multiply" | "divide" => arithmetic(line, analysis, vars),
        "table" => build_table(line, analysis, vars),
        other => Err(format!("unknown operation '{}'", other)),
    }
}

// ---------------------------------------------------------------------------
// reference resolution

/// Resolve a reference against the analysis store first, then session
/// variables. Shared with the reporter, which resolves visual data refs
/// the same way.
pub fn resolve_ref(
    r: &VarRef,
    analysis: &AnalysisStore,
    vars: &VariableStore,
) -> Result<AnalysisValue, String> {
    match &r.field {
        None => {
            if let Some(value) = analysis.get(&r.var) {
                return Ok(value.clone());
            }
            Err(format!(
                "COLUMN_NOT_FOUND: '{}' is not a stored result; session variables need a field, like {}[field]",
                r.var, r.var
            ))
        }
        Some(field) => {
            if let Some(var) = vars.get(&r.var) {
                if let Some(Value::Array(cells)) = var.field(field) {
                    return Ok(AnalysisValue::Column(cells));
                }
                if let Some(scalar) = var.field(field) {
                    return Ok(AnalysisValue::Column(vec![scalar]));
                }
                return Err(format!(
                    "COLUMN_NOT_FOUND: variable '{}' has no field '{}'",
                    r.var, field
                ));
            }
            if let Some(AnalysisValue::Table { columns, rows }) = analysis.get(&r.var) {
                if let Some(idx) = columns.iter().position(|c| c == field) {
                    let cells = rows.iter().filter_map(|row| row.get(idx).cloned()).collect();
                    return Ok(AnalysisValue::Column(cells));
                }
                return Err(format!(
                    "COLUMN_NOT_FOUND: table '{}' has no column '{}'",
                    r.var, field
                ));
            }
            Err(format!("COLUMN_NOT_FOUND: no variable named '{}'", r.var))
        }
    }
}

fn resolve_column(r: &VarRef, analysis: &AnalysisStore, vars: &VariableStore) -> Result<Vec<Value>, String> {
    match resolve_ref(r, analysis, vars)? {
        AnalysisValue::Column(cells) => Ok(cells),
        AnalysisValue::Number(n) => Ok(vec![serde_json::json!(n)]),
        AnalysisValue::Table { .. } => Err(format!(
            "COLUMN_NOT_FOUND: '{}' is a table; pick a column with {}[column]",
            r.var, r.var
        )),
    }
}

/// Scalar view of an argument: literal numbers pass through, stored
/// numbers resolve, and columns are summed before comparison.
fn resolve_scalar(arg: &PlanArg, analysis: &AnalysisStore, vars: &VariableStore) -> Result<f64, String> {
    match arg {
        PlanArg::Number(n) => Ok(*n),
        PlanArg::Reference(r) => match resolve_ref(r, analysis, vars)? {
            AnalysisValue::Number(n) => Ok(n),
            AnalysisValue::Column(cells) => Ok(numeric_cells(&cells).iter().sum()),
            AnalysisValue::Table { .. } => {
                Err(format!("COLUMN_NOT_FOUND: '{}' is a table, not a number", r.var))
            }
        },
        other => Err(format!("expected a number or reference, got {:?}", other)),
    }
}

fn numeric_cells(cells: &[Value]) -> Vec<f64> {
    cells.iter().filter_map(to_number).collect()
}

fn expect_args(line: &PlanLine, count: usize) -> Result<(), String> {
    if line.args.len() != count {
        return Err(format!(
            "'{}' takes {} argument(s), got {}",
            line.op,
            count,
            line.args.len()
        ));
    }
    Ok(())
}

fn expect_reference<'a>(line: &'a PlanLine, idx: usize) -> Result<&'a VarRef, String> {
    match line.args.get(idx) {
        Some(PlanArg::Reference(r)) => Ok(r),
        _ => Err(format!("'{}' argument {} must be a reference", line.op, idx + 1)),
    }
}

// ---------------------------------------------------------------------------
// operation groups

fn aggregate(line: &PlanLine, analysis: &AnalysisStore, vars: &VariableStore) -> OpResult {
    expect_args(line, 1)?;
    let cells = resolve_column(expect_reference(line, 0)?, analysis, vars)?;

    if line.op == "count" {
        return Ok((AnalysisValue::Number(cells.len() as f64), None));
    }

    let numbers = numeric_cells(&cells);
    let value = match line.op.as_str() {
        "sum" => numbers.iter().sum(),
        "average" => {
            if numbers.is_empty() {
                return Err("CANNOT_DIVIDE_BY_ZERO: average of an empty column".to_string());
            }
            numbers.iter().sum::<f64>() / numbers.len() as f64
        }
        "max" => {
            if numbers.is_empty() {
                return Err("no numeric values to take max of".to_string());
            }
            numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max)
        }
        "min" => {
            if numbers.is_empty() {
                return Err("no numeric values to take min of".to_string());
            }
            numbers.iter().cloned().fold(f64::INFINITY, f64::min)
        }
        _ => unreachable!(),
    };

    Ok((AnalysisValue::Number(round2(value)), None))
}

fn compare(line: &PlanLine, analysis: &AnalysisStore, vars: &VariableStore) -> OpResult {
    expect_args(line, 2)?;
    let a = resolve_scalar(&line.args[0], analysis, vars)?;
    let b = resolve_scalar(&line.args[1], analysis, vars)?;

    let value = match line.op.as_str() {
        "difference" => a - b,
        "ratio" => {
            if b == 0.0 {
                return Err("CANNOT_DIVIDE_BY_ZERO: ratio denominator is 0".to_string());
            }
            a / b
        }
        "percentage" => {
            if b == 0.0 {
                return Err("CANNOT_DIVIDE_BY_ZERO: percentage denominator is 0".to_string());
            }
            (a / b) * 100.0
        }
        "pct_change" => {
            if a == 0.0 {
                return Err(
                    "CANNOT_DIVIDE_BY_ZERO: pct_change is undefined when the old side sums to 0"
                        .to_string(),
                );
            }
            ((b - a) / a) * 100.0
        }
        _ => unreachable!(),
    };

    Ok((AnalysisValue::Number(round2(value)), None))
}

#[derive(Debug, PartialEq)]
enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

fn parse_condition(text: &str) -> Result<(CmpOp, String), String> {
    let text = text.trim();
    let (op, rest) = if let Some(r) = text.strip_prefix(">=") {
        (CmpOp::Ge, r)
    } else if let Some(r) = text.strip_prefix("<=") {
        (CmpOp::Le, r)
    } else if let Some(r) = text.strip_prefix("!=") {
        (CmpOp::Ne, r)
    } else if let Some(r) = text.strip_prefix('>') {
        (CmpOp::Gt, r)
    } else if let Some(r) = text.strip_prefix('<') {
        (CmpOp::Lt, r)
    } else if let Some(r) = text.strip_prefix('=') {
        (CmpOp::Eq, r)
    } else {
        return Err(format!(
            "INVALID_CONDITION: '{}' must start with one of > < >= <= = !=",
            text
        ));
    };

    let value = rest.trim().trim_matches('"').to_string();
    if value.is_empty() {
        return Err(format!("INVALID_CONDITION: '{}' has no comparison value", text));
    }
    Ok((op, value))
}

fn cell_passes(cell: &Value, op: &CmpOp, rhs: &str) -> bool {
    // numeric comparison when both sides parse, string comparison otherwise
    if let (Some(l), Ok(r)) = (to_number(cell), rhs.trim().parse::<f64>()) {
        return match op {
            CmpOp::Gt => l > r,
            CmpOp::Lt => l < r,
            CmpOp::Ge => l >= r,
            CmpOp::Le => l <= r,
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
        };
    }

    let l = match cell {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match op {
        CmpOp::Gt => l.as_str() > rhs,
        CmpOp::Lt => l.as_str() < rhs,
        CmpOp::Ge => l.as_str() >= rhs,
        CmpOp::Le => l.as_str() <= rhs,
        CmpOp::Eq => l == rhs,
        CmpOp::Ne => l != rhs,
    }
}

fn filter(line: &PlanLine, analysis: &AnalysisStore, vars: &VariableStore) -> OpResult {
    expect_args(line, 2)?;
    let cells = resolve_column(expect_reference(line, 0)?, analysis, vars)?;
    let condition = match &line.args[1] {
        PlanArg::Text(t) => t.clone(),
        other => {
            return Err(format!(
                "INVALID_CONDITION: filter condition must be quoted, got {:?}",
                other
            ));
        }
    };

    let (op, rhs) = parse_condition(&condition)?;
    let kept: Vec<Value> = cells
        .into_iter()
        .filter(|cell| cell_passes(cell, &op, &rhs))
        .collect();

    Ok((AnalysisValue::Column(kept), None))
}

fn sort(line: &PlanLine, analysis: &AnalysisStore, vars: &VariableStore) -> OpResult {
    expect_args(line, 1)?;
    let mut cells = resolve_column(expect_reference(line, 0)?, analysis, vars)?;

    let all_numeric = !cells.is_empty() && cells.iter().all(|c| to_number(c).is_some());
    if all_numeric {
        cells.sort_by(|a, b| {
            to_number(a)
                .partial_cmp(&to_number(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        cells.sort_by_key(|c| match c {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }

    if line.op == "sort_desc" {
        cells.reverse();
    }

    Ok((AnalysisValue::Column(cells), None))
}

fn arithmetic(line: &PlanLine, analysis: &AnalysisStore, vars: &VariableStore) -> OpResult {
    expect_args(line, 2)?;
    let left = resolve_column(expect_reference(line, 0)?, analysis, vars)?;

    // the right side is a scalar (literal or stored number) or a second column
    let right: RightSide = match &line.args[1] {
        PlanArg::Number(n) => RightSide::Scalar(*n),
        PlanArg::Reference(r) => match resolve_ref(r, analysis, vars)? {
            AnalysisValue::Number(n) => RightSide::Scalar(n),
            AnalysisValue::Column(cells) => RightSide::Column(cells),
            AnalysisValue::Table { .. } => {
                return Err(format!(
                    "COLUMN_NOT_FOUND: '{}' is a table, not a column or number",
                    r.var
                ));
            }
        },
        other => {
            return Err(format!(
                "'{}' second argument must be a number or reference, got {:?}",
                line.op, other
            ));
        }
    };

    match right {
        RightSide::Scalar(s) => {
            let out: Vec<Value> = left
                .iter()
                .map(|cell| {
                    let l = to_number(cell).unwrap_or(0.0);
                    serde_json::json!(round2(apply_arith(&line.op, l, s)))
                })
                .collect();
            Ok((AnalysisValue::Column(out), None))
        }
        RightSide::Column(right_cells) => {
            let len = left.len().min(right_cells.len());
            let note = if left.len() != right_cells.len() {
                Some(format!(
                    "columns aligned to {} rows (left had {}, right had {})",
                    len,
                    left.len(),
                    right_cells.len()
                ))
            } else {
                None
            };

            let out: Vec<Value> = (0..len)
                .map(|i| {
                    let l = to_number(&left[i]).unwrap_or(0.0);
                    let r = to_number(&right_cells[i]).unwrap_or(0.0);
                    serde_json::json!(round2(apply_arith(&line.op, l, r)))
                })
                .collect();
            Ok((AnalysisValue::Column(out), note))
        }
    }
}

enum RightSide {
    Scalar(f64),
    Column(Vec<Value>),
}

fn apply_arith(op: &str, l: f64, r: f64) -> f64 {
    match op {
        "add" => l + r,
        "subtract" => l - r,
        "multiply" => l * r,
        // division by zero substitutes 0 per row
        "divide" => {
            if r == 0.0 {
                0.0
            } else {
                l / r
            }
        }
        _ => unreachable!(),
    }
}

fn build_table(line: &PlanLine, analysis: &AnalysisStore, vars: &VariableStore) -> OpResult {
    if line.args.is_empty() {
        return Err("'table' needs at least one Label: value pair".to_string());
    }

    let mut columns = Vec::new();
    let mut column_cells: Vec<Vec<Value>> = Vec::new();

    for arg in &line.args {
        let PlanArg::Labeled { label, value } = arg else {
            return Err(format!("'table' arguments must be Label: value pairs, got {:?}", arg));
        };
        let cells = match value.as_ref() {
            PlanArg::List(items) => items.clone(),
            PlanArg::Number(n) => vec![serde_json::json!(n)],
            PlanArg::Text(t) => vec![Value::String(t.clone())],
            PlanArg::Reference(r) => match resolve_ref(r, analysis, vars)? {
                AnalysisValue::Column(cells) => cells,
                AnalysisValue::Number(n) => vec![serde_json::json!(n)],
                AnalysisValue::Table { .. } => {
                    return Err(format!(
                        "COLUMN_NOT_FOUND: '{}' is a table; pick a column for '{}'",
                        r.var, label
                    ));
                }
            },
            PlanArg::Labeled { .. } => {
                return Err("nested labels are not valid in 'table'".to_string());
            }
        };
        columns.push(label.clone());
        column_cells.push(cells);
    }

    let shortest = column_cells.iter().map(Vec::len).min().unwrap_or(0);
    let longest = column_cells.iter().map(Vec::len).max().unwrap_or(0);
    let note = if shortest != longest {
        Some(format!("columns aligned to {} rows", shortest))
    } else {
        None
    };

    let rows: Vec<Vec<Value>> = (0..shortest)
        .map(|i| column_cells.iter().map(|col| col[i].clone()).collect())
        .collect();

    Ok((AnalysisValue::Table { columns, rows }, note))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::plan::parse_line;
    use crate::vars::{FieldSpec, Variable};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn store_with_sales() -> VariableStore {
        let mut vars = VariableStore::new();
        for (name, values) in [("q1_sales", [10, 20, 30]), ("q2_sales", [15, 25, 35])] {
            let mut schema = BTreeMap::new();
            schema.insert("revenue".to_string(), FieldSpec::default());
            let data: Vec<Value> = values.iter().map(|v| json!({"revenue": v})).collect();
            vars.put(Variable {
                name: name.to_string(),
                schema,
                actual_data: Value::Array(data),
                description: String::new(),
                created_by: "test".into(),
            });
        }
        vars
    }

    fn run(plan: &str, vars: &VariableStore) -> (AnalysisStore, Vec<OperationOutcome>) {
        let (lines, errors) = crate::analysis::plan::parse_plan(plan);
        assert!(errors.is_empty(), "plan errors: {:?}", errors);
        let mut analysis = AnalysisStore::new();
        let outcomes = execute_plan(&lines, &mut analysis, vars);
        (analysis, outcomes)
    }

    #[test]
    fn test_growth_plan_end_to_end() {
        let vars = store_with_sales();
        let (analysis, outcomes) = run(
            "q1_total: sum(q1_sales[revenue])\n\
             q2_total: sum(q2_sales[revenue])\n\
             growth: pct_change(q1_total, q2_total)",
            &vars,
        );

        assert_eq!(outcomes[0].result, "60.00");
        assert_eq!(outcomes[1].result, "75.00");
        assert_eq!(outcomes[2].result, "25.00");
        assert_eq!(analysis.get("growth"), Some(&AnalysisValue::Number(25.0)));
    }

    #[test]
    fn test_difference_antisymmetry() {
        let vars = store_with_sales();
        let (analysis, _) = run(
            "ab: difference(q1_sales[revenue], q2_sales[revenue])\n\
             ba: difference(q2_sales[revenue], q1_sales[revenue])",
            &vars,
        );
        let (Some(AnalysisValue::Number(ab)), Some(AnalysisValue::Number(ba))) =
            (analysis.get("ab"), analysis.get("ba"))
        else {
            panic!("expected numbers");
        };
        assert_eq!(ab + ba, 0.0);
    }

    #[test]
    fn test_pct_change_zero_old_side_fails() {
        let mut vars = VariableStore::new();
        let mut schema = BTreeMap::new();
        schema.insert("v".to_string(), FieldSpec::default());
        vars.put(Variable {
            name: "zero".into(),
            schema,
            actual_data: json!([{"v": 0}, {"v": 0}]),
            description: String::new(),
            created_by: "test".into(),
        });

        let (lines, _) = crate::analysis::plan::parse_plan("g: pct_change(zero[v], 10)");
        let mut analysis = AnalysisStore::new();
        let outcomes = execute_plan(&lines, &mut analysis, &vars);
        assert!(!outcomes[0].ok);
        assert!(outcomes[0].result.contains("CANNOT_DIVIDE_BY_ZERO"));
        assert!(analysis.get("g").is_none());
    }

    #[test]
    fn test_filter_operator_truth_table() {
        let vars = store_with_sales();
        let cases = [
            ("> 15", vec![20, 30]),
            (">= 20", vec![20, 30]),
            ("< 20", vec![10]),
            ("<= 20", vec![10, 20]),
            ("= 20", vec![20]),
            ("!= 20", vec![10, 30]),
        ];
        for (cond, expected) in cases {
            let line = parse_line(&format!(r#"kept: filter(q1_sales[revenue], "{}")"#, cond)).unwrap();
            let mut analysis = AnalysisStore::new();
            let outcome = execute_line(&line, &mut analysis, &vars);
            assert!(outcome.ok, "{}: {}", cond, outcome.result);
            let expected: Vec<Value> = expected.into_iter().map(|v| json!(v)).collect();
            assert_eq!(
                analysis.get("kept"),
                Some(&AnalysisValue::Column(expected)),
                "condition {}",
                cond
            );
        }
    }

    #[test]
    fn test_filter_string_comparison() {
        let mut vars = VariableStore::new();
        let mut schema = BTreeMap::new();
        schema.insert("status".to_string(), FieldSpec::default());
        vars.put(Variable {
            name: "deals".into(),
            schema,
            actual_data: json!([{"status": "open"}, {"status": "won"}, {"status": "open"}]),
            description: String::new(),
            created_by: "test".into(),
        });

        let line = parse_line(r#"open: filter(deals[status], "= open")"#).unwrap();
        let mut analysis = AnalysisStore::new();
        execute_line(&line, &mut analysis, &vars);
        assert_eq!(
            analysis.get("open"),
            Some(&AnalysisValue::Column(vec![json!("open"), json!("open")]))
        );
    }

    #[test]
    fn test_invalid_condition_reported() {
        let vars = store_with_sales();
        let line = parse_line(r#"bad: filter(q1_sales[revenue], "~ 10")"#).unwrap();
        let mut analysis = AnalysisStore::new();
        let outcome = execute_line(&line, &mut analysis, &vars);
        assert!(!outcome.ok);
        assert!(outcome.result.contains("INVALID_CONDITION"));
    }

    #[test]
    fn test_sort_numeric_and_string() {
        let vars = store_with_sales();
        let line = parse_line("sorted: sort_desc(q1_sales[revenue])").unwrap();
        let mut analysis = AnalysisStore::new();
        execute_line(&line, &mut analysis, &vars);
        assert_eq!(
            analysis.get("sorted"),
            Some(&AnalysisValue::Column(vec![json!(30), json!(20), json!(10)]))
        );
    }

    #[test]
    fn test_scalar_arithmetic() {
        let vars = store_with_sales();
        let line = parse_line("doubled: multiply(q1_sales[revenue], 2)").unwrap();
        let mut analysis = AnalysisStore::new();
        execute_line(&line, &mut analysis, &vars);
        assert_eq!(
            analysis.get("doubled"),
            Some(&AnalysisValue::Column(vec![
                json!(20.0),
                json!(40.0),
                json!(60.0)
            ]))
        );
    }

    #[test]
    fn test_column_addition_with_alignment_note() {
        let mut vars = VariableStore::new();
        for (name, values) in [("a", vec![1, 2, 3, 4]), ("b", vec![10, 20, 30])] {
            let mut schema = BTreeMap::new();
            schema.insert("v".to_string(), FieldSpec::default());
            let data: Vec<Value> = values.iter().map(|v| json!({"v": v})).collect();
            vars.put(Variable {
                name: name.to_string(),
                schema,
                actual_data: Value::Array(data),
                description: String::new(),
                created_by: "test".into(),
            });
        }

        let line = parse_line("summed: add(a[v], b[v])").unwrap();
        let mut analysis = AnalysisStore::new();
        let outcome = execute_line(&line, &mut analysis, &vars);
        assert!(outcome.ok);
        assert!(outcome.note.as_deref().unwrap().contains("aligned to 3"));
        assert_eq!(
            analysis.get("summed"),
            Some(&AnalysisValue::Column(vec![
                json!(11.0),
                json!(22.0),
                json!(33.0)
            ]))
        );
    }

    #[test]
    fn test_column_division_by_zero_substitutes_zero() {
        let mut vars = VariableStore::new();
        for (name, values) in [("num", vec![10, 20]), ("den", vec![5, 0])] {
            let mut schema = BTreeMap::new();
            schema.insert("v".to_string(), FieldSpec::default());
            let data: Vec<Value> = values.iter().map(|v| json!({"v": v})).collect();
            vars.put(Variable {
                name: name.to_string(),
                schema,
                actual_data: Value::Array(data),
                description: String::new(),
                created_by: "test".into(),
            });
        }

        let line = parse_line("ratio: divide(num[v], den[v])").unwrap();
        let mut analysis = AnalysisStore::new();
        execute_line(&line, &mut analysis, &vars);
        assert_eq!(
            analysis.get("ratio"),
            Some(&AnalysisValue::Column(vec![json!(2.0), json!(0.0)]))
        );
    }

    #[test]
    fn test_table_builder() {
        let vars = store_with_sales();
        let (analysis, outcomes) = run(
            "q1_total: sum(q1_sales[revenue])\n\
             q2_total: sum(q2_sales[revenue])\n\
             summary: table(Quarter: [\"Q1\", \"Q2\"], Total: q1_total)",
            &vars,
        );
        assert!(outcomes[2].ok);
        let Some(AnalysisValue::Table { columns, rows }) = analysis.get("summary") else {
            panic!("expected table");
        };
        assert_eq!(columns, &vec!["Quarter".to_string(), "Total".to_string()]);
        // q1_total is a scalar, so the table aligns to 1 row
        assert_eq!(rows.len(), 1);
        assert_eq!(outcomes[2].note.as_deref(), Some("columns aligned to 1 rows"));
    }

    #[test]
    fn test_column_not_found() {
        let vars = store_with_sales();
        let line = parse_line("x: sum(q1_sales[profit])").unwrap();
        let mut analysis = AnalysisStore::new();
        let outcome = execute_line(&line, &mut analysis, &vars);
        assert!(!outcome.ok);
        assert!(outcome.result.contains("COLUMN_NOT_FOUND"));
    }

    #[test]
    fn test_error_does_not_abort_plan() {
        let vars = store_with_sales();
        let (analysis, outcomes) = run(
            "bad: sum(missing[field])\n\
             good: sum(q1_sales[revenue])",
            &vars,
        );
        assert!(!outcomes[0].ok);
        assert!(outcomes[1].ok);
        assert_eq!(analysis.get("good"), Some(&AnalysisValue::Number(60.0)));
    }

    #[test]
    fn test_count_counts_all_cells() {
        let vars = store_with_sales();
        let line = parse_line("n: count(q1_sales[revenue])").unwrap();
        let mut analysis = AnalysisStore::new();
        execute_line(&line, &mut analysis, &vars);
        assert_eq!(analysis.get("n"), Some(&AnalysisValue::Number(3.0)));
    }

    #[test]
    fn test_average_and_extremes() {
        let vars = store_with_sales();
        let (analysis, _) = run(
            "avg: average(q1_sales[revenue])\n\
             hi: max(q1_sales[revenue])\n\
             lo: min(q1_sales[revenue])",
            &vars,
        );
        assert_eq!(analysis.get("avg"), Some(&AnalysisValue::Number(20.0)));
        assert_eq!(analysis.get("hi"), Some(&AnalysisValue::Number(30.0)));
        assert_eq!(analysis.get("lo"), Some(&AnalysisValue::Number(10.0)));
    }
}
