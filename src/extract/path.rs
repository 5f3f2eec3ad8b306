// src/extract/path.rs
// The JSONPath subset learned sub-tools use for projection: an optional
// leading `$.`, dotted segments with `[i]` indices, and `[*]` wildcards.
// Nothing else is supported.

use serde_json::Value;

/// Strip the learning-time artifacts a projection path may carry: the `$.`
/// prefix, and a leading `result[*].` / `result.` / bare `result` left over
/// from paths written against the pre-unwrap envelope. A bare `result`
/// means "the unwrapped payload as-is".
pub fn clean_path(path: &str) -> String {
    let mut p = path.trim();

    if let Some(rest) = p.strip_prefix("$.") {
        p = rest;
    } else if p == "$" {
        p = "";
    }

    if let Some(rest) = p.strip_prefix("result[*].") {
        p = rest;
    } else if let Some(rest) = p.strip_prefix("result.") {
        p = rest;
    } else if p == "result" || p == "result[*]" {
        p = "";
    }

    p.to_string()
}

/// Apply a projection path to a value. `None` means the path missed.
///
/// Wildcard boundaries flatten one level: for `a[*].b[*].c` the result
/// length is the sum over parents of the child array lengths. A top-level
/// miss on an array input re-applies the path per element and concatenates
/// the defined results.
pub fn extract_path(value: &Value, raw_path: &str) -> Option<Value> {
    let path = clean_path(raw_path);
    if path.is_empty() {
        return Some(value.clone());
    }

    if let Some(found) = eval(value, &path) {
        return Some(found);
    }

    if let Value::Array(items) = value {
        let collected: Vec<Value> = items
            .iter()
            .filter_map(|item| eval(item, &path))
            .collect();
        if !collected.is_empty() {
            return Some(Value::Array(collected));
        }
    }

    None
}

fn eval(value: &Value, path: &str) -> Option<Value> {
    let Some((head, tail)) = path.split_once("[*]") else {
        return walk_simple(value, path);
    };

    let head = head.trim_end_matches('.');
    let current = if head.is_empty() {
        value.clone()
    } else {
        walk_simple(value, head)?
    };
    let rest = tail.trim_start_matches('.');

    match current {
        Value::Array(items) => {
            let rest_has_wildcard = rest.contains("[*]");
            let mut out = Vec::new();
            for item in items {
                if rest.is_empty() {
                    out.push(item);
                    continue;
                }
                if let Some(v) = eval(&item, rest) {
                    if rest_has_wildcard {
                        // one level of flattening per wildcard boundary
                        match v {
                            Value::Array(inner) => out.extend(inner),
                            other => out.push(other),
                        }
                    } else {
                        out.push(v);
                    }
                }
            }
            Some(Value::Array(out))
        }
        other => {
            if rest.is_empty() {
                Some(other)
            } else {
                eval(&other, rest)
            }
        }
    }
}

/// Walk dotted segments with optional `[i]` indices; a missing key or
/// out-of-range index propagates as `None`.
pub fn walk_simple(value: &Value, path: &str) -> Option<Value> {
    let mut current = value.clone();
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        for step in parse_segment(segment)? {
            current = match step {
                Step::Key(k) => current.get(k)?.clone(),
                Step::Index(i) => current.get(i)?.clone(),
            };
        }
    }
    Some(current)
}

enum Step<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse_segment(segment: &str) -> Option<Vec<Step<'_>>> {
    let mut steps = Vec::new();
    let mut rest = segment;

    if !rest.starts_with('[') {
        let key_end = rest.find('[').unwrap_or(rest.len());
        steps.push(Step::Key(&rest[..key_end]));
        rest = &rest[key_end..];
    }

    while !rest.is_empty() {
        let close = rest.find(']')?;
        let idx: usize = rest[1..close].parse().ok()?;
        steps.push(Step::Index(idx));
        rest = &rest[close + 1..];
    }

    Some(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_strips_dollar_prefix() {
        assert_eq!(clean_path("$.rows[*].id"), "rows[*].id");
        assert_eq!(clean_path("$"), "");
    }

    #[test]
    fn test_clean_strips_result_artifacts() {
        assert_eq!(clean_path("result[*].name"), "name");
        assert_eq!(clean_path("result.rows"), "rows");
        assert_eq!(clean_path("result"), "");
        assert_eq!(clean_path("$.result.rows"), "rows");
    }

    #[test]
    fn test_clean_is_idempotent() {
        for p in ["$.result.rows", "result[*].name", "result", "rows[*].id"] {
            let once = clean_path(p);
            assert_eq!(clean_path(&once), once, "path {:?}", p);
        }
    }

    #[test]
    fn test_clean_leaves_similar_names_alone() {
        assert_eq!(clean_path("results.rows"), "results.rows");
        assert_eq!(clean_path("resultant"), "resultant");
    }

    #[test]
    fn test_simple_walk() {
        let v = json!({"a": {"b": {"c": 7}}});
        assert_eq!(extract_path(&v, "a.b.c"), Some(json!(7)));
        assert_eq!(extract_path(&v, "a.b.missing"), None);
    }

    #[test]
    fn test_index_segments() {
        let v = json!({"rows": [{"v": 1}, {"v": 2}]});
        assert_eq!(extract_path(&v, "rows[1].v"), Some(json!(2)));
        assert_eq!(extract_path(&v, "rows[5].v"), None);
    }

    #[test]
    fn test_wildcard_projection() {
        let v = json!({
            "properties": [
                {"display_name": "vibefam", "property_id": "123"},
                {"display_name": "other", "property_id": "456"}
            ]
        });
        assert_eq!(
            extract_path(&v, "$.properties[*].property_id"),
            Some(json!(["123", "456"]))
        );
    }

    #[test]
    fn test_nested_wildcards_flatten_per_parent() {
        let v = json!({
            "groups": [
                {"items": [{"n": 1}, {"n": 2}]},
                {"items": [{"n": 3}]}
            ]
        });
        let out = extract_path(&v, "groups[*].items[*].n").unwrap();
        // length is the sum over parents of the child array lengths
        assert_eq!(out, json!([1, 2, 3]));
    }

    #[test]
    fn test_trailing_wildcard_yields_elements() {
        let v = json!({"rows": [1, 2, 3]});
        assert_eq!(extract_path(&v, "rows[*]"), Some(json!([1, 2, 3])));
    }

    #[test]
    fn test_wildcard_over_object_descends() {
        // [*] over a non-array descends normally instead of failing
        let v = json!({"data": {"name": "solo"}});
        assert_eq!(extract_path(&v, "data[*].name"), Some(json!("solo")));
    }

    #[test]
    fn test_array_input_reapplies_per_element() {
        let v = json!([
            {"meta": {"id": "a"}},
            {"other": true},
            {"meta": {"id": "b"}}
        ]);
        assert_eq!(
            extract_path(&v, "meta.id"),
            Some(json!(["a", "b"]))
        );
    }

    #[test]
    fn test_bare_result_returns_input() {
        let v = json!({"anything": 1});
        assert_eq!(extract_path(&v, "result"), Some(v.clone()));
        assert_eq!(extract_path(&v, "$"), Some(v));
    }

    #[test]
    fn test_total_miss_is_none() {
        let v = json!({"a": 1});
        assert_eq!(extract_path(&v, "b.c"), None);
    }
}
