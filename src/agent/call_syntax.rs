// src/agent/call_syntax.rs
// The Executor's compact call syntax:
//
//   [var_name:] tool_name(arg1: value1, arg2: value2, ...)
//   DONE: <brief report>
//
// Values are literals, quoted strings, lists, or variable references of
// shape `var[field]`. The parser is a hand-written tokenizer that tracks
// bracket depth; calls may span multiple lines.

use crate::error::AgentError;

/// A parsed argument value
#[derive(Debug, Clone, PartialEq)]
pub enum CallValue {
    /// Quoted string
    Text(String),
    Number(f64),
    Bool(bool),
    /// `var[field]` projection of a stored variable
    Reference { var: String, field: String },
    /// A bare word: a variable name or an unquoted literal, decided by the
    /// dispatcher against the store
    Word(String),
    List(Vec<CallValue>),
}

/// One argument, optionally named
#[derive(Debug, Clone, PartialEq)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: CallValue,
}

/// A fully parsed Executor tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub variable_name: Option<String>,
    pub tool_name: String,
    pub args: Vec<CallArg>,
    pub report: Option<String>,
}

/// Parse the Executor's completion into one tool invocation.
pub fn parse_invocation(text: &str) -> Result<ToolInvocation, AgentError> {
    let text = text.trim();

    let open = text
        .find('(')
        .ok_or_else(|| AgentError::ParseFailed("no tool call found (missing '(')".into()))?;
    let close = find_matching_paren(text, open)
        .ok_or_else(|| AgentError::ParseFailed("unbalanced parentheses in tool call".into()))?;

    let (variable_name, tool_name) = parse_header(&text[..open])?;
    let args = parse_args(&text[open + 1..close])?;
    let report = parse_report_line(&text[close + 1..]);

    Ok(ToolInvocation {
        variable_name,
        tool_name,
        args,
        report,
    })
}

fn find_matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_quotes = false;
    for (i, c) in text.char_indices().skip(open) {
        match c {
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `[var_name:] tool_name` - the last line before the paren carries the
/// call; anything above it is ignored chatter.
fn parse_header(header: &str) -> Result<(Option<String>, String), AgentError> {
    let line = header
        .lines()
        .last()
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    if line.is_empty() {
        return Err(AgentError::ParseFailed("missing tool name".into()));
    }

    if let Some((var, tool)) = line.split_once(':') {
        let var = var.trim();
        let tool = tool.trim();
        if is_identifier(var) && !tool.is_empty() {
            return Ok((Some(var.to_string()), tool.to_string()));
        }
    }

    Ok((None, line))
}

fn parse_report_line(tail: &str) -> Option<String> {
    tail.lines()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("DONE:"))
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

/// Split on top-level commas, tracking `[ ]`, `( )` depth and quotes.
fn split_top_level(text: &str) -> Vec<String> {
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
    parts
}

fn parse_args(text: &str) -> Result<Vec<CallArg>, AgentError> {
    split_top_level(text)
        .into_iter()
        .map(|part| parse_arg(&part))
        .collect()
}

fn parse_arg(text: &str) -> Result<CallArg, AgentError> {
    // `name: value` or `name = value`; the name must be a bare identifier
    // so references like a[b] never lose their brackets
    if let Some((name, value)) = split_kv(text) {
        return Ok(CallArg {
            name: Some(name),
            value: parse_value(&value)?,
        });
    }

    Ok(CallArg {
        name: None,
        value: parse_value(text)?,
    })
}

fn split_kv(text: &str) -> Option<(String, String)> {
    let mut in_quotes = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' | '(' if !in_quotes => return None, // a bracket before any separator: not a kv
            ':' | '=' if !in_quotes => {
                let name = text[..i].trim();
                let value = text[i + 1..].trim();
                if is_identifier(name) && !value.is_empty() {
                    return Some((name.to_string(), value.to_string()));
                }
                return None;
            }
            _ => {}
        }
    }
    None
}

fn parse_value(text: &str) -> Result<CallValue, AgentError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AgentError::ParseFailed("empty argument value".into()));
    }

    if text.starts_with('"') && text.ends_with('"') && text.len() >= 2 {
        let inner = &text[1..text.len() - 1];
        return Ok(CallValue::Text(inner.replace("\\\"", "\"")));
    }

    if text.starts_with('[') && text.ends_with(']') {
        let items = split_top_level(&text[1..text.len() - 1])
            .into_iter()
            .map(|item| parse_value(&item))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(CallValue::List(items));
    }

    if let Ok(n) = text.parse::<f64>() {
        return Ok(CallValue::Number(n));
    }
    if text == "true" || text == "false" {
        return Ok(CallValue::Bool(text == "true"));
    }

    // var[field] reference
    if let Some(open) = text.find('[') {
        if text.ends_with(']') {
            let var = text[..open].trim();
            let field = text[open + 1..text.len() - 1].trim();
            if is_identifier(var) && !field.is_empty() {
                return Ok(CallValue::Reference {
                    var: var.to_string(),
                    field: field.to_string(),
                });
            }
        }
        return Err(AgentError::ParseFailed(format!(
            "malformed reference '{}'",
            text
        )));
    }

    Ok(CallValue::Word(text.to_string()))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && s.chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sub_tool_call_with_variable() {
        let text = r#"traffic: get_traffic_report(property: "123", start: "2025-11-01")
DONE: Fetched daily traffic."#;
        let call = parse_invocation(text).unwrap();
        assert_eq!(call.variable_name.as_deref(), Some("traffic"));
        assert_eq!(call.tool_name, "get_traffic_report");
        assert_eq!(call.args.len(), 2);
        assert_eq!(call.args[0].name.as_deref(), Some("property"));
        assert_eq!(call.args[0].value, CallValue::Text("123".into()));
        assert_eq!(call.report.as_deref(), Some("Fetched daily traffic."));
    }

    #[test]
    fn test_parse_analysis_call_with_references() {
        let text = r#"llm(data: [q1_sales, q2_sales], question: "How did revenue grow?")
DONE: Sent to analysis."#;
        let call = parse_invocation(text).unwrap();
        assert_eq!(call.variable_name, None);
        assert_eq!(call.tool_name, "llm");
        assert_eq!(
            call.args[0].value,
            CallValue::List(vec![
                CallValue::Word("q1_sales".into()),
                CallValue::Word("q2_sales".into())
            ])
        );
    }

    #[test]
    fn test_parse_field_reference() {
        let call = parse_invocation("line-chart(x: traffic[date], y: traffic[sessions])").unwrap();
        assert_eq!(
            call.args[0].value,
            CallValue::Reference {
                var: "traffic".into(),
                field: "date".into()
            }
        );
    }

    #[test]
    fn test_multi_line_call() {
        let text = r#"report: get_traffic_report(
    property: "123",
    start: "2025-11-01",
    end: "2025-11-30"
)
DONE: Monthly report."#;
        let call = parse_invocation(text).unwrap();
        assert_eq!(call.args.len(), 3);
        assert_eq!(call.args[2].name.as_deref(), Some("end"));
    }

    #[test]
    fn test_positional_args() {
        let call = parse_invocation(r#"x: get_traffic_report("123", "2025-11-01")"#).unwrap();
        assert_eq!(call.args[0].name, None);
        assert_eq!(call.args[0].value, CallValue::Text("123".into()));
    }

    #[test]
    fn test_equals_separator() {
        let call = parse_invocation(r#"card(title = "Total", value = 42)"#).unwrap();
        assert_eq!(call.args[0].name.as_deref(), Some("title"));
        assert_eq!(call.args[1].value, CallValue::Number(42.0));
    }

    #[test]
    fn test_commas_inside_quotes_and_brackets() {
        let call = parse_invocation(
            r#"llm(data: [a, b], question: "compare a, b, and trends")"#,
        )
        .unwrap();
        assert_eq!(call.args.len(), 2);
        assert_eq!(
            call.args[1].value,
            CallValue::Text("compare a, b, and trends".into())
        );
    }

    #[test]
    fn test_chatter_before_call_ignored() {
        let text = "I will fetch the report now.\ntraffic: get_traffic_report(property: \"1\")";
        let call = parse_invocation(text).unwrap();
        assert_eq!(call.tool_name, "get_traffic_report");
        assert_eq!(call.variable_name.as_deref(), Some("traffic"));
    }

    #[test]
    fn test_missing_call_is_parse_failure() {
        let err = parse_invocation("I could not decide on a tool.").unwrap_err();
        assert_eq!(err.kind(), "PARSE_FAILED");
    }

    #[test]
    fn test_unbalanced_parens_fail() {
        let err = parse_invocation("tool(a: 1").unwrap_err();
        assert_eq!(err.kind(), "PARSE_FAILED");
    }

    #[test]
    fn test_colon_value_does_not_split_as_kv() {
        // quoted values keep their colons
        let call = parse_invocation(r#"card(title: "Ratio: high", value: 3)"#).unwrap();
        assert_eq!(call.args[0].value, CallValue::Text("Ratio: high".into()));
    }
}
