// src/learning/emission.rs
// Tagged-block protocol for the exploratory learning agent. Completions
// carry blocks like `[SUB_TOOL] {json}`; parsing is tolerant of fences and
// surrounding prose, and unparseable blocks are reported for a retry.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::subtool::types::{DocumentedInput, SubTool, Workflow};

/// One parsed emission from a learning completion
#[derive(Debug, Clone)]
pub enum Emission {
    CallTool { tool: String, args: Value },
    BrowseWeb { url: String },
    InputLearned(DocumentedInput),
    SubTool(SubTool),
    Workflow(Workflow),
    Complete { insights: String },
}

impl Emission {
    pub fn kind(&self) -> &'static str {
        match self {
            Emission::CallTool { .. } => "CALL_TOOL",
            Emission::BrowseWeb { .. } => "BROWSE_WEB",
            Emission::InputLearned(_) => "INPUT_LEARNED",
            Emission::SubTool(_) => "SUB_TOOL",
            Emission::Workflow(_) => "WORKFLOW",
            Emission::Complete { .. } => "LEARNING_COMPLETE",
        }
    }
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[(CALL_TOOL|BROWSE_WEB|INPUT_LEARNED|SUB_TOOL|WORKFLOW|LEARNING_COMPLETE)\]")
            .expect("emission tag regex")
    })
}

/// Extract every tagged block from a completion, in order. The second list
/// holds parse failures to feed back to the model.
pub fn parse_emissions(text: &str) -> (Vec<Emission>, Vec<String>) {
    let mut emissions = Vec::new();
    let mut problems = Vec::new();

    let matches: Vec<_> = tag_re().find_iter(text).collect();
    for (i, m) in matches.iter().enumerate() {
        let tag = &text[m.start() + 1..m.end() - 1];
        let body_end = matches
            .get(i + 1)
            .map(|next| next.start())
            .unwrap_or(text.len());
        let body = &text[m.end()..body_end];

        match parse_block(tag, body) {
            Ok(emission) => emissions.push(emission),
            Err(e) => problems.push(format!("[{}]: {}", tag, e)),
        }
    }

    (emissions, problems)
}

fn parse_block(tag: &str, body: &str) -> Result<Emission, String> {
    if tag == "LEARNING_COMPLETE" {
        // the completion tag may carry a JSON body or nothing at all
        let insights = extract_json(body)
            .and_then(|v| {
                v.get("insights")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.trim().trim_matches('`').trim().to_string());
        return Ok(Emission::Complete { insights });
    }

    let json = extract_json(body).ok_or("no JSON object found after tag")?;

    match tag {
        "CALL_TOOL" => {
            let tool = json
                .get("tool")
                .or_else(|| json.get("name"))
                .and_then(Value::as_str)
                .ok_or("missing 'tool'")?
                .to_string();
            let args = json
                .get("args")
                .or_else(|| json.get("arguments"))
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            Ok(Emission::CallTool { tool, args })
        }
        "BROWSE_WEB" => {
            let url = json
                .get("url")
                .and_then(Value::as_str)
                .ok_or("missing 'url'")?
                .to_string();
            Ok(Emission::BrowseWeb { url })
        }
        "INPUT_LEARNED" => serde_json::from_value(json)
            .map(Emission::InputLearned)
            .map_err(|e| e.to_string()),
        "SUB_TOOL" => serde_json::from_value(json)
            .map(Emission::SubTool)
            .map_err(|e| e.to_string()),
        "WORKFLOW" => serde_json::from_value(json)
            .map(Emission::Workflow)
            .map_err(|e| e.to_string()),
        other => Err(format!("unknown tag '{}'", other)),
    }
}

/// Pull the first JSON object out of a block body, tolerating ``` fences
/// and prose around it.
fn extract_json(body: &str) -> Option<Value> {
    let start = body.find('{')?;
    let bytes = body.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&body[start..=i]).ok();
                }
            }
            _ => {}
        }
    }
    None
}
