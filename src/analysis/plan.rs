// src/analysis/plan.rs
// The plan line grammar: `output_var: op(arg, ...)  # comment`, one
// operation per line. Parsing is deterministic; no model is consulted
// during execution.

use serde_json::Value;

/// A reference to stored data: an analysis variable by name, or a session
/// variable field as `name[field]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarRef {
    pub var: String,
    pub field: Option<String>,
}

impl VarRef {
    pub fn render(&self) -> String {
        match &self.field {
            Some(f) => format!("{}[{}]", self.var, f),
            None => self.var.clone(),
        }
    }
}

/// One parsed operation argument
#[derive(Debug, Clone, PartialEq)]
pub enum PlanArg {
    Reference(VarRef),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    /// `Label: value` pairs used by the table builder
    Labeled { label: String, value: Box<PlanArg> },
}

/// One parsed plan line
#[derive(Debug, Clone)]
pub struct PlanLine {
    pub output: String,
    pub op: String,
    pub args: Vec<PlanArg>,
}

impl PlanLine {
    /// The line as the planner wrote it, minus the comment.
    pub fn render(&self) -> String {
        let args: Vec<String> = self.args.iter().map(render_arg).collect();
        format!("{}: {}({})", self.output, self.op, args.join(", "))
    }
}

fn render_arg(arg: &PlanArg) -> String {
    match arg {
        PlanArg::Reference(r) => r.render(),
        PlanArg::Number(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        PlanArg::Text(t) => format!("\"{}\"", t),
        PlanArg::List(items) => {
            let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
            format!("[{}]", rendered.join(", "))
        }
        PlanArg::Labeled { label, value } => format!("{}: {}", label, render_arg(value)),
    }
}

/// Parse an entire plan, skipping blank lines and pure comments. Lines
/// that fail to parse are returned as errors alongside the good ones.
pub fn parse_plan(text: &str) -> (Vec<PlanLine>, Vec<String>) {
    let mut lines = Vec::new();
    let mut errors = Vec::new();

    for raw in text.lines() {
        let line = strip_comment(raw).trim().to_string();
        if line.is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(parsed) => lines.push(parsed),
            Err(e) => errors.push(format!("{}: {}", line, e)),
        }
    }

    (lines, errors)
}

fn strip_comment(line: &str) -> &str {
    // a `#` inside quotes is data, not a comment
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Parse one `output: op(args)` line.
pub fn parse_line(line: &str) -> Result<PlanLine, String> {
    let (output, rest) = line
        .split_once(':')
        .ok_or_else(|| "missing ':' between output name and operation".to_string())?;
    let output = output.trim();
    if output.is_empty() || !is_identifier(output) {
        return Err(format!("bad output name '{}'", output));
    }

    let rest = rest.trim();
    let open = rest
        .find('(')
        .ok_or_else(|| "missing '(' after operation".to_string())?;
    let op = rest[..open].trim().to_string();
    if op.is_empty() {
        return Err("missing operation name".to_string());
    }

    let close = rest
        .rfind(')')
        .ok_or_else(|| "missing closing ')'".to_string())?;
    if close < open {
        return Err("mismatched parentheses".to_string());
    }
    let args_text = &rest[open + 1..close];

    let args = split_args(args_text)
        .into_iter()
        .map(|a| parse_arg(&a))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PlanLine {
        output: output.to_string(),
        op,
        args,
    })
}

/// Split on top-level commas, tracking bracket depth and quotes.
fn split_args(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quotes = false;

    for c in text.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '[' | '(' if !in_quotes => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' if !in_quotes => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 && !in_quotes => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    let last = current.trim().to_string();
    if !last.is_empty() {
        parts.push(last);
    }
    parts.retain(|p| !p.is_empty());
    parts
}

fn parse_arg(text: &str) -> Result<PlanArg, String> {
    let text = text.trim();

    // `Label: value` pair (table builder); references like `a[b]` contain
    // no colon, so this check is unambiguous
    if let Some((label, value)) = split_label(text) {
        let inner = parse_arg(value)?;
        return Ok(PlanArg::Labeled {
            label: label.to_string(),
            value: Box::new(inner),
        });
    }

    if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
        return Ok(PlanArg::Text(text[1..text.len() - 1].to_string()));
    }

    if text.starts_with('[') && text.ends_with(']') {
        let items = split_args(&text[1..text.len() - 1])
            .into_iter()
            .map(|item| literal_value(&item))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(PlanArg::List(items));
    }

    if let Ok(n) = text.parse::<f64>() {
        return Ok(PlanArg::Number(n));
    }

    parse_reference(text).map(PlanArg::Reference)
}

fn split_label(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0i32;
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' | '(' if !in_quotes => depth += 1,
            ']' | ')' if !in_quotes => depth -= 1,
            ':' if depth == 0 && !in_quotes => {
                let label = text[..i].trim();
                let value = text[i + 1..].trim();
                if label.is_empty() || value.is_empty() {
                    return None;
                }
                return Some((label, value));
            }
            _ => {}
        }
    }
    None
}

fn literal_value(text: &str) -> Result<Value, String> {
    let text = text.trim();
    if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
        return Ok(Value::String(text[1..text.len() - 1].to_string()));
    }
    if let Ok(n) = text.parse::<f64>() {
        return Ok(serde_json::json!(n));
    }
    Ok(Value::String(text.to_string()))
}

/// Parse `name` or `name[field]`.
pub fn parse_reference(text: &str) -> Result<VarRef, String> {
    if let Some(open) = text.find('[') {
        if !text.ends_with(']') {
            return Err(format!("unclosed reference '{}'", text));
        }
        let var = text[..open].trim();
        let field = text[open + 1..text.len() - 1].trim();
        if !is_identifier(var) || field.is_empty() {
            return Err(format!("bad reference '{}'", text));
        }
        return Ok(VarRef {
            var: var.to_string(),
            field: Some(field.to_string()),
        });
    }

    if !is_identifier(text) {
        return Err(format!("bad reference '{}'", text));
    }
    Ok(VarRef {
        var: text.to_string(),
        field: None,
    })
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && s.chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
}
