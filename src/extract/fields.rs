// src/extract/fields.rs
// Schema field renaming: reshape extracted payloads so records expose the
// published schema names instead of the raw provider field names.

use serde_json::{Map, Value};

use super::path::walk_simple;

/// One published output field: the schema name and the path of the raw
/// value inside each extracted record.
#[derive(Debug, Clone)]
pub struct FieldMapping<'a> {
    pub name: &'a str,
    pub path: &'a str,
}

/// Transform an extracted payload so each record exposes the schema names.
/// Arrays map elementwise; scalar elements and payloads pass through
/// unchanged; a field whose path misses is omitted from that record.
pub fn rename_fields(payload: &Value, mappings: &[FieldMapping<'_>]) -> Value {
    if mappings.is_empty() {
        return payload.clone();
    }

    match payload {
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| rename_record(item, mappings)).collect())
        }
        other => rename_record(other, mappings),
    }
}

fn rename_record(record: &Value, mappings: &[FieldMapping<'_>]) -> Value {
    if !record.is_object() {
        return record.clone();
    }

    let mut out = Map::new();
    for mapping in mappings {
        if let Some(value) = walk_simple(record, mapping.path) {
            out.insert(mapping.name.to_string(), value);
        }
    }
    Value::Object(out)
}
