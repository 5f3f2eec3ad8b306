// src/subtool/executor.rs
// Binds a sub-tool call to its parent MCP tool: defaults plus mapped
// inputs, one parent call, then projection and field renaming.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::extract::fields::FieldMapping;
use crate::extract::{extract_path, rename_fields, unwrap_response};
use crate::mcp::McpManager;
use crate::vars::FieldSpec;

use super::args::assign_nested;
use super::catalog::SubToolCatalog;
use super::types::SubTool;

/// Result of a sub-tool execution: the published schema plus the projected
/// and renamed payload.
#[derive(Debug, Clone)]
pub struct SubToolOutcome {
    pub sub_tool_id: String,
    pub schema: BTreeMap<String, FieldSpec>,
    pub actual_data: Value,
    pub description: String,
    /// Set when projection missed and the unwrapped payload was returned
    pub extraction_fallback: bool,
}

/// Execute a sub-tool by id with caller-supplied input values.
///
/// Dependencies in `requires_first` are informational for planners; they are
/// not auto-fulfilled here. Missing required inputs fail before the parent
/// call is made.
pub async fn execute_sub_tool(
    catalog: &SubToolCatalog,
    mcp: &McpManager,
    sub_tool_id: &str,
    supplied: &HashMap<String, Value>,
) -> Result<SubToolOutcome, AgentError> {
    let sub_tool = catalog
        .get(sub_tool_id)
        .await
        .ok_or_else(|| AgentError::ToolNotFound(sub_tool_id.to_string()))?;

    let missing = sub_tool.missing_required(supplied);
    if !missing.is_empty() {
        return Err(AgentError::ParseFailed(format!(
            "sub-tool '{}' is missing required inputs: {}",
            sub_tool.id,
            missing.join(", ")
        )));
    }

    let parent_args = build_parent_args(&sub_tool, supplied)?;
    debug!(
        sub_tool = %sub_tool.id,
        parent = %sub_tool.parent_tool,
        "Executing sub-tool"
    );

    let raw = mcp.call(&sub_tool.parent_tool, parent_args).await?;
    Ok(project_response(&sub_tool, &raw))
}

/// Deep-clone the defaults and assign each supplied (or defaulted) input
/// at its `map_to_parent_arg` path.
fn build_parent_args(
    sub_tool: &SubTool,
    supplied: &HashMap<String, Value>,
) -> Result<Value, AgentError> {
    let mut parent_args = if sub_tool.parent_default_args.is_object() {
        sub_tool.parent_default_args.clone()
    } else {
        Value::Object(Default::default())
    };

    for input in &sub_tool.inputs {
        let value = supplied
            .get(&input.name)
            .cloned()
            .or_else(|| input.default.clone());
        let Some(value) = value else { continue };

        assign_nested(&mut parent_args, &input.map_to_parent_arg, value).map_err(|e| {
            AgentError::ParseFailed(format!(
                "sub-tool '{}' input '{}': {}",
                sub_tool.id, input.name, e
            ))
        })?;
    }

    Ok(parent_args)
}

/// Unwrap the parent response, apply the projection path, and rename raw
/// fields to the published schema. A missed projection falls back to the
/// unwrapped payload with the fallback flag set.
fn project_response(sub_tool: &SubTool, raw: &Value) -> SubToolOutcome {
    let unwrapped = unwrap_response(raw);

    let (projected, extraction_fallback) = match sub_tool.json_path.as_deref() {
        Some(path) if !path.trim().is_empty() => match extract_path(&unwrapped, path) {
            Some(v) => (v, false),
            None => {
                warn!(
                    sub_tool = %sub_tool.id,
                    path = %path,
                    "Projection missed, returning unwrapped payload"
                );
                (unwrapped.clone(), true)
            }
        },
        _ => (unwrapped.clone(), false),
    };

    let mappings: Vec<FieldMapping<'_>> = sub_tool
        .output_fields
        .iter()
        .map(|f| FieldMapping {
            name: &f.name,
            path: &f.path,
        })
        .collect();
    // a fallback payload keeps its raw shape; renaming only applies to
    // projected records
    let actual_data = if extraction_fallback {
        projected
    } else {
        rename_fields(&projected, &mappings)
    };

    let schema: BTreeMap<String, FieldSpec> = sub_tool
        .output_fields
        .iter()
        .map(|f| {
            (
                f.name.clone(),
                FieldSpec {
                    description: f.description.clone(),
                    data_type: f.data_type.clone(),
                    source_path: Some(f.path.clone()),
                },
            )
        })
        .collect();

    SubToolOutcome {
        sub_tool_id: sub_tool.id.clone(),
        schema,
        actual_data,
        description: sub_tool.description.clone(),
        extraction_fallback,
    }
}
