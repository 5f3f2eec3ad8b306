// src/subtool/catalog.rs
// Loads per-MCP learning files from the learnings directory into a global
// catalog. Read-mostly after startup; re-learning an MCP replaces its slice.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::types::{LearningFile, SubTool, Workflow};

/// Global catalog of learned sub-tools, keyed by sub-tool id.
pub struct SubToolCatalog {
    dir: PathBuf,
    inner: RwLock<CatalogState>,
}

#[derive(Default)]
struct CatalogState {
    by_id: HashMap<String, SubTool>,
    files: HashMap<String, LearningFile>,
}

impl SubToolCatalog {
    /// Scan a learnings directory and ingest every per-MCP JSON file.
    /// A missing directory is an empty catalog, not an error.
    pub async fn load(dir: &Path) -> Result<Self> {
        let catalog = Self {
            dir: dir.to_path_buf(),
            inner: RwLock::new(CatalogState::default()),
        };
        catalog.reload().await?;
        Ok(catalog)
    }

    /// Re-scan the learnings directory, replacing the in-memory catalog.
    pub async fn reload(&self) -> Result<()> {
        let mut state = CatalogState::default();

        if self.dir.is_dir() {
            let mut entries = tokio::fs::read_dir(&self.dir)
                .await
                .with_context(|| format!("Failed to read learnings dir {:?}", self.dir))?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match Self::load_file(&path).await {
                    Ok(file) => {
                        info!(
                            "[CATALOG] Loaded {} sub-tools for '{}'",
                            file.sub_tools.len(),
                            file.mcp_name
                        );
                        for sub_tool in &file.sub_tools {
                            state.by_id.insert(sub_tool.id.clone(), sub_tool.clone());
                        }
                        state.files.insert(file.mcp_name.clone(), file);
                    }
                    Err(e) => warn!("[CATALOG] Skipping {:?}: {}", path, e),
                }
            }
        }

        *self.inner.write().await = state;
        Ok(())
    }

    async fn load_file(path: &Path) -> Result<LearningFile> {
        let content = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&content).context("Failed to parse learning file")
    }

    /// Look up a sub-tool by id, falling back to its display name.
    pub async fn get(&self, id_or_name: &str) -> Option<SubTool> {
        let state = self.inner.read().await;
        if let Some(tool) = state.by_id.get(id_or_name) {
            return Some(tool.clone());
        }
        state
            .by_id
            .values()
            .find(|t| t.name.eq_ignore_ascii_case(id_or_name))
            .cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.by_id.contains_key(id)
    }

    /// All sub-tools, sorted by id.
    pub async fn all(&self) -> Vec<SubTool> {
        let state = self.inner.read().await;
        let mut tools: Vec<SubTool> = state.by_id.values().cloned().collect();
        tools.sort_by(|a, b| a.id.cmp(&b.id));
        tools
    }

    /// One-line summaries for planner prompts.
    pub async fn summaries(&self) -> Vec<String> {
        self.all().await.iter().map(SubTool::summary).collect()
    }

    /// Names of MCPs that have a learning file.
    pub async fn learned_mcps(&self) -> Vec<String> {
        let state = self.inner.read().await;
        let mut names: Vec<String> = state.files.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn file_for(&self, mcp_name: &str) -> Option<LearningFile> {
        self.inner.read().await.files.get(mcp_name).cloned()
    }

    /// Workflows across every learned MCP.
    pub async fn workflows(&self) -> Vec<Workflow> {
        let state = self.inner.read().await;
        state
            .files
            .values()
            .flat_map(|f| f.workflows.iter().cloned())
            .collect()
    }

    /// The learnings directory this catalog watches.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn write_learning(dir: &Path, mcp: &str, sub_tool_ids: &[&str]) {
        let sub_tools: Vec<_> = sub_tool_ids
            .iter()
            .map(|id| {
                json!({
                    "id": id,
                    "name": id,
                    "description": "test tool",
                    "parent_tool": format!("{}__parent", mcp),
                    "server_name": mcp
                })
            })
            .collect();
        let file = json!({
            "mcpName": mcp,
            "version": 1,
            "learnedAt": "2025-11-20T00:00:00Z",
            "modelUsed": "test",
            "subTools": sub_tools
        });
        tokio::fs::write(
            dir.join(format!("{}.json", mcp)),
            serde_json::to_string_pretty(&file).unwrap(),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_missing_dir_is_empty_catalog() {
        let tmp = tempfile::tempdir().unwrap();
        let catalog = SubToolCatalog::load(&tmp.path().join("nope")).await.unwrap();
        assert!(catalog.all().await.is_empty());
        assert!(catalog.learned_mcps().await.is_empty());
    }

    #[tokio::test]
    async fn test_load_and_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        write_learning(tmp.path(), "ga", &["get_traffic", "list_properties"]).await;
        write_learning(tmp.path(), "crm", &["list_deals"]).await;

        let catalog = SubToolCatalog::load(tmp.path()).await.unwrap();
        assert_eq!(catalog.all().await.len(), 3);
        assert_eq!(catalog.learned_mcps().await, vec!["crm", "ga"]);
        assert!(catalog.get("get_traffic").await.is_some());
        assert!(catalog.get("unknown").await.is_none());
        assert!(catalog.contains("list_deals").await);
    }

    #[tokio::test]
    async fn test_reload_replaces_state() {
        let tmp = tempfile::tempdir().unwrap();
        write_learning(tmp.path(), "ga", &["a"]).await;
        let catalog = SubToolCatalog::load(tmp.path()).await.unwrap();
        assert_eq!(catalog.all().await.len(), 1);

        write_learning(tmp.path(), "ga", &["a", "b"]).await;
        catalog.reload().await.unwrap();
        assert_eq!(catalog.all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_bad_file_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("broken.json"), "{not json")
            .await
            .unwrap();
        write_learning(tmp.path(), "ga", &["a"]).await;

        let catalog = SubToolCatalog::load(tmp.path()).await.unwrap();
        assert_eq!(catalog.learned_mcps().await, vec!["ga"]);
    }
}
