// src/subtool/args.rs
// Nested parent-argument assembly: sub-tool inputs map into the parent
// tool's argument object through dotted paths with array indices.

use anyhow::{Result, bail};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Index(usize),
}

fn parse_steps(path: &str) -> Result<Vec<Step>> {
    let mut steps = Vec::new();

    for segment in path.split('.') {
        if segment.is_empty() {
            bail!("empty segment in arg path '{}'", path);
        }

        let mut rest = segment;
        if !rest.starts_with('[') {
            let key_end = rest.find('[').unwrap_or(rest.len());
            steps.push(Step::Key(rest[..key_end].to_string()));
            rest = &rest[key_end..];
        }

        while !rest.is_empty() {
            let Some(close) = rest.find(']') else {
                bail!("unclosed index in arg path '{}'", path);
            };
            let idx: usize = rest[1..close]
                .parse()
                .map_err(|_| anyhow::anyhow!("bad index in arg path '{}'", path))?;
            steps.push(Step::Index(idx));
            rest = &rest[close + 1..];
        }
    }

    if steps.is_empty() {
        bail!("empty arg path");
    }
    Ok(steps)
}

/// Assign `value` into `target` at a path like `date_ranges[0].start_date`.
/// Intermediate containers are materialized by the kind of the next step;
/// arrays are grown with `{}` placeholders up to the required index.
pub fn assign_nested(target: &mut Value, path: &str, value: Value) -> Result<()> {
    let steps = parse_steps(path)?;
    let (last, intermediate) = steps.split_last().expect("parse_steps is non-empty");

    let mut current = target;
    for (i, step) in intermediate.iter().enumerate() {
        let next = steps.get(i + 1).expect("intermediate step has a successor");
        current = descend(current, step, next)?;
    }

    match last {
        Step::Key(key) => {
            if !current.is_object() {
                *current = Value::Object(Default::default());
            }
            current
                .as_object_mut()
                .expect("just coerced to object")
                .insert(key.clone(), value);
        }
        Step::Index(idx) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let arr = current.as_array_mut().expect("just coerced to array");
            while arr.len() <= *idx {
                arr.push(Value::Object(Default::default()));
            }
            arr[*idx] = value;
        }
    }

    Ok(())
}

fn placeholder_for(next: &Step) -> Value {
    match next {
        Step::Key(_) => Value::Object(Default::default()),
        Step::Index(_) => Value::Array(Vec::new()),
    }
}

fn descend<'a>(current: &'a mut Value, step: &Step, next: &Step) -> Result<&'a mut Value> {
    match step {
        Step::Key(key) => {
            if !current.is_object() {
                *current = Value::Object(Default::default());
            }
            let map = current.as_object_mut().expect("just coerced to object");
            let entry = map
                .entry(key.clone())
                .or_insert_with(|| placeholder_for(next));
            // an existing scalar at an intermediate position is replaced
            if matches!(next, Step::Index(_)) && !entry.is_array() {
                *entry = Value::Array(Vec::new());
            } else if matches!(next, Step::Key(_)) && !entry.is_object() {
                *entry = Value::Object(Default::default());
            }
            Ok(entry)
        }
        Step::Index(idx) => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let arr = current.as_array_mut().expect("just coerced to array");
            while arr.len() <= *idx {
                arr.push(Value::Object(Default::default()));
            }
            let entry = &mut arr[*idx];
            if matches!(next, Step::Index(_)) && !entry.is_array() {
                *entry = Value::Array(Vec::new());
            } else if matches!(next, Step::Key(_)) && !entry.is_object() {
                *entry = Value::Object(Default::default());
            }
            Ok(entry)
        }
    }
}
