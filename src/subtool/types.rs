// src/subtool/types.rs
// Catalog types for learned sub-tools and the per-MCP learning files

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Input value kinds a sub-tool can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    Enum,
    #[default]
    String,
    Number,
    Date,
    Reference,
    Format,
}

/// Where a reference input's values come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputSource {
    pub tool: String,
    #[serde(default)]
    pub from_path: Option<String>,
}

/// One declared input of a sub-tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubToolInput {
    pub name: String,
    #[serde(rename = "type", default)]
    pub input_type: InputType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
    /// Dotted path (with `[i]` indices) into the parent tool's arguments
    pub map_to_parent_arg: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub source: Option<InputSource>,
    #[serde(default)]
    pub default: Option<Value>,
}

/// One published output field with the raw path it is projected from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputField {
    pub name: String,
    pub path: String,
    #[serde(rename = "type", default)]
    pub data_type: String,
    #[serde(default)]
    pub description: String,
}

/// A dependency another sub-tool should satisfy first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequiresFirst {
    pub sub_tool: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub extract_field: Option<String>,
    #[serde(default)]
    pub from_path: Option<String>,
}

/// A learned sub-tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Sanitized name of the parent MCP tool
    pub parent_tool: String,
    /// Server that owns the parent tool; tracked explicitly so per-MCP
    /// grouping never has to be recovered from the sanitized name
    #[serde(default)]
    pub server_name: Option<String>,
    #[serde(default)]
    pub parent_default_args: Value,
    #[serde(default)]
    pub requires_first: Vec<RequiresFirst>,
    #[serde(default)]
    pub inputs: Vec<SubToolInput>,
    /// Projection applied to the unwrapped parent response
    #[serde(default)]
    pub json_path: Option<String>,
    #[serde(default)]
    pub output_fields: Vec<OutputField>,
    #[serde(default)]
    pub output_example: Option<Value>,
}

impl SubTool {
    /// Names of required inputs the caller did not supply.
    pub fn missing_required<'a>(
        &'a self,
        supplied: &HashMap<String, Value>,
    ) -> Vec<&'a str> {
        self.inputs
            .iter()
            .filter(|i| i.required && !supplied.contains_key(&i.name) && i.default.is_none())
            .map(|i| i.name.as_str())
            .collect()
    }

    /// One-line summary used in planner prompts.
    pub fn summary(&self) -> String {
        let inputs: Vec<&str> = self.inputs.iter().map(|i| i.name.as_str()).collect();
        format!("{} ({}): {}", self.id, inputs.join(", "), self.description)
    }
}

/// An input documented during learning without being folded into a sub-tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentedInput {
    pub tool: String,
    pub input: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub example: Option<Value>,
}

/// A multi-step recipe discovered during learning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub user_task: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub answer_template: Option<String>,
    #[serde(default)]
    pub decision_points: Vec<String>,
}

/// Short name + description of a tool as it looked at learning time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginalTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// One per-MCP learning file on disk
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LearningFile {
    pub mcp_name: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub learned_at: String,
    #[serde(default)]
    pub model_used: String,
    #[serde(default)]
    pub original_tools: Vec<OriginalTool>,
    #[serde(default)]
    pub sub_tools: Vec<SubTool>,
    #[serde(default)]
    pub documented_inputs: Vec<DocumentedInput>,
    #[serde(default)]
    pub workflows: Vec<Workflow>,
    #[serde(default)]
    pub insights: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_sub_tool() -> SubTool {
        serde_json::from_value(json!({
            "id": "get_traffic_report",
            "name": "Get Traffic Report",
            "description": "Daily sessions for a property",
            "parent_tool": "ga__run_report",
            "server_name": "ga",
            "parent_default_args": {"dimensions": [{"name": "date"}]},
            "inputs": [
                {
                    "name": "property_id",
                    "type": "reference",
                    "required": true,
                    "map_to_parent_arg": "property",
                    "source": {"tool": "list_properties", "from_path": "property_id"}
                },
                {
                    "name": "start",
                    "type": "date",
                    "required": true,
                    "map_to_parent_arg": "date_ranges[0].start_date"
                }
            ],
            "json_path": "rows[*]",
            "output_fields": [
                {"name": "date", "path": "dimension_values[0].value", "type": "string"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_sub_tool_round_trip() {
        let tool = sample_sub_tool();
        assert_eq!(tool.inputs.len(), 2);
        assert_eq!(tool.inputs[0].input_type, InputType::Reference);
        assert_eq!(tool.inputs[1].map_to_parent_arg, "date_ranges[0].start_date");
        assert_eq!(tool.server_name.as_deref(), Some("ga"));
    }

    #[test]
    fn test_missing_required() {
        let tool = sample_sub_tool();
        let mut supplied = HashMap::new();
        supplied.insert("start".to_string(), json!("2025-11-01"));
        assert_eq!(tool.missing_required(&supplied), vec!["property_id"]);

        supplied.insert("property_id".to_string(), json!("123"));
        assert!(tool.missing_required(&supplied).is_empty());
    }

    #[test]
    fn test_learning_file_camel_case() {
        let file: LearningFile = serde_json::from_value(json!({
            "mcpName": "ga",
            "version": 1,
            "learnedAt": "2025-11-20T00:00:00Z",
            "modelUsed": "deepseek-chat",
            "originalTools": [{"name": "run_report", "description": "Runs a report"}],
            "subTools": [],
            "documentedInputs": [],
            "workflows": [{"id": "w1", "userTask": "traffic overview", "steps": []}],
            "insights": "dates are ISO"
        }))
        .unwrap();
        assert_eq!(file.mcp_name, "ga");
        assert_eq!(file.workflows[0].user_task, "traffic overview");
    }
}
