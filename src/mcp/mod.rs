// src/mcp/mod.rs
// Model Context Protocol (MCP) client pool
// Connects to configured tool servers, lists their tools under sanitized
// names, and routes calls back to the owning server.

pub mod names;
pub mod protocol;
pub mod transport;

pub use names::sanitize_tool_name;
pub use protocol::McpTool;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::AgentError;
use crate::llm::Tool;
use names::sanitize_tool_name_extended;
use protocol::{JsonRpcRequest, JsonRpcResponse};
use transport::{HttpTransport, McpTransport, StdioTransport};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Transport kind for HTTP-based servers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TransportKind {
    #[default]
    Stdio,
    Sse,
    StreamableHttp,
}

/// Extra request configuration for HTTP servers
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RequestInit {
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// One server entry from the configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpServerConfig {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub transport: Option<TransportKind>,
    #[serde(default, rename = "requestInit")]
    pub request_init: Option<RequestInit>,
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// MCP configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpConfig {
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: HashMap<String, McpServerConfig>,
}

impl McpConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read MCP config at {:?}", path))?;
        serde_json::from_str(&content).context("Failed to parse MCP config")
    }
}

/// A tool registered under its sanitized name, with enough provenance to
/// route a call back to the owning server.
#[derive(Debug, Clone, Serialize)]
pub struct ToolBinding {
    pub server_name: String,
    pub original_name: String,
    pub sanitized_name: String,
    pub description: String,
    pub input_schema: Value,
}

impl ToolBinding {
    /// Render as a function declaration for the LLM tool list.
    pub fn to_declaration(&self) -> Tool {
        Tool::function(
            self.sanitized_name.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        )
    }
}

/// Connected MCP server instance
pub struct McpServer {
    pub name: String,
    pub tools: Vec<McpTool>,
    transport: Box<dyn McpTransport>,
    request_id: RwLock<i64>,
}

impl McpServer {
    /// Open a transport for the config, run the initialize handshake, and
    /// discover the server's tools.
    pub async fn connect(name: &str, config: &McpServerConfig) -> Result<Self> {
        let transport: Box<dyn McpTransport> = if let Some(command) = &config.command {
            info!("[MCP] Starting stdio server '{}': {}", name, command);
            Box::new(StdioTransport::spawn(command, &config.args, &config.env).await?)
        } else if let Some(url) = &config.url {
            info!(
                "[MCP] Connecting to {:?} server '{}': {}",
                config.transport.unwrap_or(TransportKind::StreamableHttp),
                name,
                url
            );
            let headers = config
                .request_init
                .as_ref()
                .map(|r| r.headers.clone())
                .unwrap_or_default();
            Box::new(HttpTransport::new(url, headers, config.timeout_ms))
        } else {
            anyhow::bail!("MCP server '{}' must have either 'command' or 'url'", name);
        };

        let mut server = Self {
            name: name.to_string(),
            tools: Vec::new(),
            transport,
            request_id: RwLock::new(0),
        };

        server.initialize().await?;
        server.discover_tools().await?;

        Ok(server)
    }

    async fn next_id(&self) -> i64 {
        let mut id = self.request_id.write().await;
        *id += 1;
        *id
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id().await;
        let request = JsonRpcRequest::new(id, method, params);

        debug!("[MCP:{}] -> {} (id={})", self.name, method, id);

        let request_json = serde_json::to_string(&request)?;
        let response_json = self.transport.send(&request_json).await?;
        let response: JsonRpcResponse = serde_json::from_str(&response_json)?;

        if let Some(error) = response.error {
            anyhow::bail!("MCP error {}: {}", error.code, error.message);
        }

        response.result.context("Empty result from MCP server")
    }

    async fn initialize(&mut self) -> Result<()> {
        let params = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "clientInfo": {
                "name": "canvas-backend",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = self.send_request("initialize", Some(params)).await?;

        let notif = JsonRpcRequest::notification("notifications/initialized", None);
        let notif_json = serde_json::to_string(&notif)?;
        let _ = self.transport.send(&notif_json).await; // Notification, ignore response

        info!(
            "[MCP:{}] Initialized (protocol: {})",
            self.name,
            result
                .get("protocolVersion")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
        );

        Ok(())
    }

    async fn discover_tools(&mut self) -> Result<()> {
        let result = self.send_request("tools/list", None).await?;

        if let Some(tools) = result.get("tools").and_then(|t| t.as_array()) {
            for tool_value in tools {
                if let Ok(tool) = serde_json::from_value::<McpTool>(tool_value.clone()) {
                    debug!("[MCP:{}] Found tool: {}", self.name, tool.name);
                    self.tools.push(tool);
                }
            }
        }

        info!("[MCP:{}] Discovered {} tools", self.name, self.tools.len());
        Ok(())
    }

    /// Call a tool on this server; returns the raw `tools/call` result
    /// (the `{content: [...]}` envelope).
    pub async fn call_tool(&self, tool_name: &str, arguments: Value) -> Result<Value> {
        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments
        });

        info!("[MCP:{}] Calling tool: {}", self.name, tool_name);
        self.send_request("tools/call", Some(params)).await
    }
}

/// Process-wide pool of MCP server connections with a sanitized-name tool
/// registry. Read-mostly after startup; `call` is safe from any task.
pub struct McpManager {
    servers: RwLock<HashMap<String, Arc<McpServer>>>,
    bindings: RwLock<HashMap<String, ToolBinding>>,
}

impl McpManager {
    pub fn new() -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
        }
    }

    /// Connect to every configured server. A server that fails to connect
    /// is logged and skipped; the pool stays up with whatever connected.
    pub async fn connect_all(&self, config: &McpConfig) {
        for (name, server_config) in &config.mcp_servers {
            match McpServer::connect(name, server_config).await {
                Ok(server) => {
                    self.register(server).await;
                    info!("[MCP] Connected to server '{}'", name);
                }
                Err(e) => {
                    let err = AgentError::McpConnectFailed {
                        server: name.clone(),
                        reason: e.to_string(),
                    };
                    warn!("[MCP] {}", err);
                }
            }
        }
    }

    async fn register(&self, server: McpServer) {
        let server = Arc::new(server);
        let mut bindings = self.bindings.write().await;

        for tool in &server.tools {
            let mut sanitized = sanitize_tool_name(&server.name, &tool.name);
            if let Some(existing) = bindings.get(&sanitized)
                && (existing.server_name != server.name || existing.original_name != tool.name)
            {
                sanitized = sanitize_tool_name_extended(&server.name, &tool.name);
            }

            let binding = ToolBinding {
                server_name: server.name.clone(),
                original_name: tool.name.clone(),
                sanitized_name: sanitized.clone(),
                description: tool
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("MCP tool: {}", tool.name)),
                input_schema: tool.input_schema.clone().unwrap_or_else(|| {
                    serde_json::json!({"type": "object", "properties": {}, "required": []})
                }),
            };
            bindings.insert(sanitized, binding);
        }

        self.servers
            .write()
            .await
            .insert(server.name.clone(), server);
    }

    /// All registered tool bindings, sorted by sanitized name.
    pub async fn tools(&self) -> Vec<ToolBinding> {
        let bindings = self.bindings.read().await;
        let mut all: Vec<ToolBinding> = bindings.values().cloned().collect();
        all.sort_by(|a, b| a.sanitized_name.cmp(&b.sanitized_name));
        all
    }

    /// Tool declarations shaped for an LLM request, truncated to the
    /// provider's cap when one applies.
    pub async fn tool_declarations(&self, limit: Option<usize>) -> Vec<Tool> {
        let mut declarations: Vec<Tool> = self
            .tools()
            .await
            .iter()
            .map(ToolBinding::to_declaration)
            .collect();

        if let Some(limit) = limit
            && declarations.len() > limit
        {
            warn!(
                "[MCP] Truncating tool list from {} to provider cap of {}",
                declarations.len(),
                limit
            );
            declarations.truncate(limit);
        }

        declarations
    }

    /// Look up a binding by sanitized name.
    pub async fn binding(&self, sanitized_name: &str) -> Option<ToolBinding> {
        self.bindings.read().await.get(sanitized_name).cloned()
    }

    /// Call a tool by its sanitized name, routing to the owning server.
    pub async fn call(&self, sanitized_name: &str, arguments: Value) -> Result<Value, AgentError> {
        let binding = self
            .binding(sanitized_name)
            .await
            .ok_or_else(|| AgentError::ToolNotFound(sanitized_name.to_string()))?;

        let server = self
            .servers
            .read()
            .await
            .get(&binding.server_name)
            .cloned()
            .ok_or_else(|| AgentError::ToolNotFound(sanitized_name.to_string()))?;

        server
            .call_tool(&binding.original_name, arguments)
            .await
            .map_err(|e| AgentError::ParentCallFailed {
                tool: sanitized_name.to_string(),
                reason: e.to_string(),
            })
    }

    pub async fn server_count(&self) -> usize {
        self.servers.read().await.len()
    }

    pub async fn server_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.servers.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Bindings belonging to one server.
    pub async fn tools_for_server(&self, server_name: &str) -> Vec<ToolBinding> {
        self.tools()
            .await
            .into_iter()
            .filter(|b| b.server_name == server_name)
            .collect()
    }
}

impl Default for McpManager {
    fn default() -> Self {
        Self::new()
    }
}
