// src/vars/mod.rs
// Session-level variable store. Variables hold a published schema plus the
// projected payload; planners only ever see the schema side.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Schema entry for one field of a variable
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FieldSpec {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

/// A named container created by a tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub schema: BTreeMap<String, FieldSpec>,
    pub actual_data: Value,
    pub description: String,
    pub created_by: String,
}

impl Variable {
    /// Schema keys in declaration order.
    pub fn field_names(&self) -> Vec<String> {
        self.schema.keys().cloned().collect()
    }

    /// Project a single field out of the payload. Record arrays yield the
    /// column of that field; a single record yields the scalar.
    pub fn field(&self, field_name: &str) -> Option<Value> {
        match &self.actual_data {
            Value::Array(items) => {
                let column: Vec<Value> = items
                    .iter()
                    .filter_map(|item| item.get(field_name).cloned())
                    .collect();
                if column.is_empty() {
                    None
                } else {
                    Some(Value::Array(column))
                }
            }
            Value::Object(map) => map.get(field_name).cloned(),
            _ => None,
        }
    }
}

/// What the Pilot is allowed to see of a variable: name, description, and
/// the schema keys. Never the payload.
#[derive(Debug, Clone, Serialize)]
pub struct VariableSummary {
    pub name: String,
    pub description: String,
    pub fields: Vec<String>,
}

/// Per-session store, keyed by name; writing an existing name overwrites.
#[derive(Debug, Default)]
pub struct VariableStore {
    vars: HashMap<String, Variable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, variable: Variable) {
        self.vars.insert(variable.name.clone(), variable);
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn summaries(&self) -> Vec<VariableSummary> {
        let mut summaries: Vec<VariableSummary> = self
            .vars
            .values()
            .map(|v| VariableSummary {
                name: v.name.clone(),
                description: v.description.clone(),
                fields: v.field_names(),
            })
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn clear(&mut self) {
        self.vars.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales_variable(name: &str) -> Variable {
        let mut schema = BTreeMap::new();
        schema.insert(
            "revenue".to_string(),
            FieldSpec {
                description: "Revenue per day".into(),
                data_type: "number".into(),
                source_path: None,
            },
        );
        Variable {
            name: name.to_string(),
            schema,
            actual_data: json!([{"revenue": 10}, {"revenue": 20}, {"revenue": 30}]),
            description: "Quarterly sales".into(),
            created_by: "get_sales_report".into(),
        }
    }

    #[test]
    fn test_put_overwrites_by_name() {
        let mut store = VariableStore::new();
        store.put(sales_variable("q1"));
        let mut replacement = sales_variable("q1");
        replacement.description = "updated".into();
        store.put(replacement);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("q1").unwrap().description, "updated");
    }

    #[test]
    fn test_summaries_hide_actual_data() {
        let mut store = VariableStore::new();
        store.put(sales_variable("q1"));

        let summaries = store.summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "q1");
        assert_eq!(summaries[0].fields, vec!["revenue"]);

        // the serialized summary must not leak any payload values
        let rendered = serde_json::to_string(&summaries).unwrap();
        assert!(!rendered.contains("10"));
        assert!(!rendered.contains("actual_data"));
    }

    #[test]
    fn test_field_projection_over_records() {
        let var = sales_variable("q1");
        assert_eq!(var.field("revenue"), Some(json!([10, 20, 30])));
        assert_eq!(var.field("missing"), None);
    }

    #[test]
    fn test_field_projection_single_record() {
        let mut var = sales_variable("one");
        var.actual_data = json!({"revenue": 99});
        assert_eq!(var.field("revenue"), Some(json!(99)));
    }

    #[test]
    fn test_clear_empties_store() {
        let mut store = VariableStore::new();
        store.put(sales_variable("q1"));
        store.clear();
        assert!(store.is_empty());
        assert!(store.names().is_empty());
    }
}
