// src/mcp/transport.rs
// Transport layer for MCP communication (stdio and HTTP)

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::debug;

/// Transport trait for MCP communication
#[async_trait]
pub trait McpTransport: Send + Sync {
    /// Send a message and receive a response
    async fn send(&self, message: &str) -> Result<String>;
}

/// Stdio transport for spawned MCP server processes
pub struct StdioTransport {
    #[allow(dead_code)]
    child: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    stdout: Mutex<BufReader<tokio::process::ChildStdout>>,
}

impl StdioTransport {
    /// Spawn a new MCP server process
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().context("Failed to spawn MCP server process")?;

        let stdin = child.stdin.take().context("Failed to get stdin")?;
        let stdout = child.stdout.take().context("Failed to get stdout")?;

        // Drain stderr so the child never blocks on a full pipe
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = String::new();
                while let Ok(n) = reader.read_line(&mut line).await {
                    if n == 0 {
                        break;
                    }
                    debug!("[MCP:stderr] {}", line.trim());
                    line.clear();
                }
            });
        }

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
        })
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn send(&self, message: &str) -> Result<String> {
        // MCP stdio uses newline-delimited JSON
        let mut stdin = self.stdin.lock().await;
        let mut stdout = self.stdout.lock().await;

        stdin
            .write_all(message.as_bytes())
            .await
            .context("Failed to write to MCP stdin")?;
        stdin
            .write_all(b"\n")
            .await
            .context("Failed to write newline")?;
        stdin.flush().await.context("Failed to flush stdin")?;

        let mut response = String::new();
        stdout
            .read_line(&mut response)
            .await
            .context("Failed to read from MCP stdout")?;

        if response.is_empty() {
            anyhow::bail!("MCP server closed connection");
        }

        Ok(response.trim().to_string())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        // Child process is killed by kill_on_drop(true)
        debug!("[MCP] Dropping stdio transport, killing child process");
    }
}

/// Extract the JSON payload from a text/event-stream response body.
/// Streamable-HTTP servers may answer a POST with an SSE-framed message;
/// the payload is the concatenation of the `data:` lines of the first event.
pub fn unframe_sse_body(body: &str) -> String {
    if !body.lines().any(|l| l.starts_with("data:")) {
        return body.to_string();
    }

    let mut data_lines = Vec::new();
    for line in body.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start());
        } else if line.is_empty() && !data_lines.is_empty() {
            break; // end of first event
        }
    }
    data_lines.join("\n")
}

/// HTTP transport for remote MCP servers. Used for both the
/// `streamable-http` and `sse` transport kinds: requests are POSTed to the
/// server URL and SSE-framed responses are unwrapped.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    headers: HashMap<String, String>,
    session_id: tokio::sync::RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(url: &str, headers: HashMap<String, String>, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            url: url.to_string(),
            client,
            headers,
            session_id: tokio::sync::RwLock::new(None),
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send(&self, message: &str) -> Result<String> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");

        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        if let Some(session) = self.session_id.read().await.as_ref() {
            request = request.header("Mcp-Session-Id", session);
        }

        let response = request
            .body(message.to_string())
            .send()
            .await
            .context("HTTP request failed")?;

        // The server assigns a session on initialize; echo it back afterwards
        if let Some(session) = response.headers().get("Mcp-Session-Id")
            && let Ok(session_str) = session.to_str()
        {
            *self.session_id.write().await = Some(session_str.to_string());
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP error {}: {}", status, body);
        }

        let body = response.text().await.context("Failed to read response body")?;
        Ok(unframe_sse_body(&body))
    }
}
