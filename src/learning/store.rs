// src/learning/store.rs
// Persistence and rendering of per-MCP learning files

use anyhow::{Context, Result};
use std::path::Path;

use crate::subtool::types::LearningFile;

/// Write one learning file as `<mcp_name>.json` in the learnings directory,
/// creating the directory when needed. Re-learning overwrites.
pub async fn write_learning_file(dir: &Path, file: &LearningFile) -> Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create learnings dir {:?}", dir))?;

    let path = dir.join(format!("{}.json", file.mcp_name));
    let rendered = serde_json::to_string_pretty(file)?;
    tokio::fs::write(&path, rendered)
        .await
        .with_context(|| format!("Failed to write learning file {:?}", path))?;

    Ok(())
}

/// Render a learning file as the human-readable prompt section a reviewer
/// sees before trusting the catalog.
pub fn render_learning_preview(file: &LearningFile) -> String {
    let mut out = format!(
        "# {} (v{}, learned {} with {})\n\n",
        file.mcp_name, file.version, file.learned_at, file.model_used
    );

    if !file.sub_tools.is_empty() {
        out.push_str("## Sub-tools\n\n");
        for tool in &file.sub_tools {
            out.push_str(&format!("### {} - {}\n{}\n", tool.id, tool.name, tool.description));
            out.push_str(&format!("Parent: {}\n", tool.parent_tool));
            for input in &tool.inputs {
                out.push_str(&format!(
                    "- {} ({:?}{}) -> {}: {}\n",
                    input.name,
                    input.input_type,
                    if input.required { ", required" } else { "" },
                    input.map_to_parent_arg,
                    input.description
                ));
            }
            if let Some(path) = &tool.json_path {
                out.push_str(&format!("Projection: {}\n", path));
            }
            if !tool.output_fields.is_empty() {
                let fields: Vec<&str> =
                    tool.output_fields.iter().map(|f| f.name.as_str()).collect();
                out.push_str(&format!("Outputs: {}\n", fields.join(", ")));
            }
            out.push('\n');
        }
    }

    if !file.documented_inputs.is_empty() {
        out.push_str("## Documented inputs\n\n");
        for input in &file.documented_inputs {
            out.push_str(&format!(
                "- {}.{}: {}\n",
                input.tool, input.input, input.description
            ));
        }
        out.push('\n');
    }

    if !file.workflows.is_empty() {
        out.push_str("## Workflows\n\n");
        for workflow in &file.workflows {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                workflow.id,
                workflow.user_task,
                workflow.steps.join(" -> ")
            ));
        }
        out.push('\n');
    }

    if !file.insights.is_empty() {
        out.push_str(&format!("## Insights\n\n{}\n", file.insights));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_file() -> LearningFile {
        serde_json::from_value(json!({
            "mcpName": "ga",
            "version": 1,
            "learnedAt": "2025-11-20T00:00:00Z",
            "modelUsed": "deepseek-chat",
            "originalTools": [{"name": "run_report", "description": "Runs reports"}],
            "subTools": [{
                "id": "get_traffic",
                "name": "Get Traffic",
                "description": "Daily sessions",
                "parent_tool": "ga__run_report",
                "server_name": "ga",
                "inputs": [{"name": "property", "type": "reference", "required": true,
                            "map_to_parent_arg": "property", "description": "GA property"}],
                "json_path": "rows[*]",
                "output_fields": [{"name": "date", "path": "dimension_values[0].value"}]
            }],
            "documentedInputs": [{"tool": "ga__run_report", "input": "property",
                                   "description": "numeric id"}],
            "workflows": [{"id": "w1", "userTask": "weekly traffic",
                            "steps": ["get_traffic"]}],
            "insights": "dates are ISO"
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_creates_dir_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("learnings");
        let file = sample_file();

        write_learning_file(&dir, &file).await.unwrap();

        let written = tokio::fs::read_to_string(dir.join("ga.json")).await.unwrap();
        let parsed: LearningFile = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.mcp_name, "ga");
        assert_eq!(parsed.sub_tools.len(), 1);
    }

    #[tokio::test]
    async fn test_rewrite_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let mut file = sample_file();
        write_learning_file(tmp.path(), &file).await.unwrap();

        file.version = 2;
        write_learning_file(tmp.path(), &file).await.unwrap();

        let written = tokio::fs::read_to_string(tmp.path().join("ga.json"))
            .await
            .unwrap();
        let parsed: LearningFile = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.version, 2);
    }

    #[test]
    fn test_preview_lists_everything() {
        let preview = render_learning_preview(&sample_file());
        assert!(preview.contains("get_traffic"));
        assert!(preview.contains("Projection: rows[*]"));
        assert!(preview.contains("weekly traffic"));
        assert!(preview.contains("dates are ISO"));
    }
}
