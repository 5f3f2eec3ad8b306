// src/extract/unwrap.rs
// MCP tool responses arrive as {content: [{type, text|data}, ...]} envelopes,
// frequently with JSON payloads serialized into the text items - sometimes
// twice. Unwrapping normalizes all of that into plain JSON values.

use serde_json::Value;

/// Normalize an MCP tool response envelope into its payload.
///
/// Each content item contributes: parsed JSON when `type == "text"` and the
/// text parses, the raw text otherwise, or the `data` field when present.
/// A single-item envelope collapses to that item. A payload that is still a
/// JSON-encoded string gets exactly one more parse. Anything that is not an
/// envelope is returned unchanged.
pub fn unwrap_response(value: &Value) -> Value {
    let unwrapped = match envelope_items(value) {
        Some(items) => {
            let mut out: Vec<Value> = items.iter().map(unwrap_content_item).collect();
            if out.len() == 1 {
                out.remove(0)
            } else {
                Value::Array(out)
            }
        }
        None => value.clone(),
    };

    parse_if_json_string(unwrapped)
}

fn envelope_items(value: &Value) -> Option<&Vec<Value>> {
    value.get("content")?.as_array()
}

fn unwrap_content_item(item: &Value) -> Value {
    if item.get("type").and_then(Value::as_str) == Some("text")
        && let Some(text) = item.get("text").and_then(Value::as_str)
    {
        return match serde_json::from_str::<Value>(text) {
            Ok(parsed) => parsed,
            Err(_) => Value::String(text.to_string()),
        };
    }

    if let Some(data) = item.get("data") {
        return data.clone();
    }

    item.clone()
}

fn parse_if_json_string(value: Value) -> Value {
    if let Value::String(s) = &value
        && let Ok(parsed) = serde_json::from_str::<Value>(s)
    {
        return parsed;
    }
    value
}
