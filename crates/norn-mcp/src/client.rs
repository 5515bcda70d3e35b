// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Outbound MCP: spawn external servers as child processes, handshake,
//! discover tools, route calls.
//!
//! Discovery is an arena: the client owns every server slot and every
//! discovered tool; a discovered tool carries only the *index* of its
//! owning server.  The bridge (see [`crate::bridge`]) stores an
//! `Arc<McpClient>` plus a tool index — no back-pointers into short-lived
//! structures.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use norn_tools::{RegisterError, ToolRegistry};

use crate::protocol::{
    self, MAX_FRAME_BYTES, PROTOCOL_VERSION, REQUEST_TIMEOUT,
};

/// Bounded server slots per client.
pub const MAX_SERVERS: usize = 16;

/// Bounded discovered tools per client.
pub const MAX_DISCOVERED_TOOLS: usize = 256;

/// Grace period between spawn and the initialize request.
const STARTUP_GRACE: std::time::Duration = std::time::Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum McpError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("timed out waiting for response to {0}")]
    Timeout(String),

    #[error("peer error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("server {0:?} is not connected")]
    NotConnected(String),

    #[error("no server exposes tool {0:?}")]
    ToolNotFound(String),

    #[error("remote tool failed: {0}")]
    ToolCall(String),

    #[error("server limit reached ({MAX_SERVERS})")]
    ServerLimit,

    #[error("protocol violation: {0}")]
    Protocol(String),
}

/// How to spawn one server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Extra environment entries for the child, appended to the parent env.
    pub env: Vec<(String, String)>,
}

/// A tool reported by a connected server.
#[derive(Debug, Clone)]
pub struct DiscoveredTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    /// Index of the owning server slot.
    pub server_index: usize,
}

/// Live pipes to one child server.
struct ServerConn {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// Monotonic request id, starts at 1.
    next_id: u64,
    /// Protocol version the server announced at initialize.
    protocol_version: String,
}

struct ServerSlot {
    config: ServerConfig,
    conn: Mutex<Option<ServerConn>>,
}

/// Outbound MCP client: a bounded set of server slots plus the tools they
/// exposed at connect time.
pub struct McpClient {
    servers: Vec<ServerSlot>,
    tools: Vec<DiscoveredTool>,
}

impl Default for McpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl McpClient {
    pub fn new() -> Self {
        Self { servers: Vec::new(), tools: Vec::new() }
    }

    /// Queue a server for the next [`connect`](Self::connect).
    pub fn add_server(&mut self, config: ServerConfig) -> Result<(), McpError> {
        if self.servers.len() >= MAX_SERVERS {
            return Err(McpError::ServerLimit);
        }
        debug!(name = %config.name, command = %config.command, "queued MCP server");
        self.servers.push(ServerSlot { config, conn: Mutex::new(None) });
        Ok(())
    }

    /// Queue every server described by an MCP config file.
    pub fn load_config(&mut self, path: &Path) -> Result<usize, McpError> {
        let configs = crate::config::load_mcp_config(path)?;
        let n = configs.len();
        for c in configs {
            self.add_server(c)?;
        }
        Ok(n)
    }

    /// Spawn and handshake every queued server, then discover its tools.
    ///
    /// A server that fails to connect is logged and skipped; the others
    /// proceed.  Returns the total number of discovered tools.
    pub async fn connect(&mut self) -> Result<usize, McpError> {
        for index in 0..self.servers.len() {
            match self.connect_one(index).await {
                Ok(count) => {
                    info!(
                        server = %self.servers[index].config.name,
                        tools = count,
                        "MCP server connected"
                    );
                }
                Err(e) => {
                    warn!(
                        server = %self.servers[index].config.name,
                        "MCP server failed to connect: {e}"
                    );
                }
            }
        }
        Ok(self.tools.len())
    }

    async fn connect_one(&mut self, index: usize) -> Result<usize, McpError> {
        let config = self.servers[index].config.clone();

        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("child stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("child stdout not piped".into()))?;

        let mut conn = ServerConn {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
            protocol_version: String::new(),
        };

        // Let the child set up its own stdio loop before the first frame.
        tokio::time::sleep(STARTUP_GRACE).await;

        let init = conn
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "clientInfo": {
                        "name": "norn",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": {},
                }),
            )
            .await?;
        conn.protocol_version = init["protocolVersion"]
            .as_str()
            .unwrap_or(PROTOCOL_VERSION)
            .to_string();
        debug!(
            server = %config.name,
            version = %conn.protocol_version,
            "initialize handshake done"
        );

        conn.notify("notifications/initialized", json!({})).await?;

        let listed = conn.request("tools/list", json!({})).await?;
        let mut count = 0usize;
        if let Some(tools) = listed["tools"].as_array() {
            for t in tools {
                if self.tools.len() >= MAX_DISCOVERED_TOOLS {
                    warn!("discovered tool limit reached; ignoring the rest");
                    break;
                }
                let Some(name) = t["name"].as_str() else {
                    continue;
                };
                self.tools.push(DiscoveredTool {
                    name: name.to_string(),
                    description: t["description"].as_str().unwrap_or_default().to_string(),
                    input_schema: t
                        .get("inputSchema")
                        .cloned()
                        .unwrap_or_else(|| json!({ "type": "object" })),
                    server_index: index,
                });
                count += 1;
            }
        }

        *self.servers[index].conn.lock().await = Some(conn);
        Ok(count)
    }

    pub fn tools(&self) -> &[DiscoveredTool] {
        &self.tools
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Call a discovered tool by name, routing to its owning server.
    ///
    /// Returns the text of `result.content[0].text`.  A result flagged
    /// `isError` — and any protocol failure — comes back as `Err`; the
    /// caller turns it into a failed tool observation, never a teardown.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<String, McpError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;
        let slot = &self.servers[tool.server_index];

        let mut guard = slot.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| McpError::NotConnected(slot.config.name.clone()))?;

        let result = conn
            .request("tools/call", json!({ "name": name, "arguments": args }))
            .await?;

        let text = result["content"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if result["isError"].as_bool() == Some(true) {
            return Err(McpError::ToolCall(text));
        }
        Ok(text)
    }

    /// Insert one proxy tool per discovered tool into `registry`.
    pub fn register_tools(
        self: &Arc<Self>,
        registry: &mut ToolRegistry,
    ) -> Result<usize, RegisterError> {
        crate::bridge::register_bridged_tools(self, registry)
    }

    /// Close pipes, terminate children, reap without blocking.
    pub async fn stop(&self) {
        for slot in &self.servers {
            if let Some(mut conn) = slot.conn.lock().await.take() {
                drop(conn.stdin);
                let _ = conn.child.start_kill();
                let _ = conn.child.try_wait();
                debug!(server = %slot.config.name, "MCP server stopped");
            }
        }
    }
}

impl ServerConn {
    /// Send a request and wait for *its* response.
    ///
    /// Frames without an id are notifications from the peer: logged,
    /// skipped.  Frames with a different id are logged and skipped too —
    /// a response is delivered only to the caller whose id it matches.
    /// The whole wait is bounded by [`REQUEST_TIMEOUT`].
    async fn request(&mut self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(protocol::request(id, method, params)).await?;

        let deadline = tokio::time::Instant::now() + REQUEST_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(McpError::Timeout(method.to_string()));
            }

            let mut line = String::new();
            let read = tokio::time::timeout(remaining, self.stdout.read_line(&mut line))
                .await
                .map_err(|_| McpError::Timeout(method.to_string()))??;
            if read == 0 {
                return Err(McpError::Protocol("server closed its stdout".into()));
            }
            if line.len() > MAX_FRAME_BYTES {
                return Err(McpError::Protocol(format!(
                    "frame of {} bytes exceeds cap",
                    line.len()
                )));
            }
            let frame: Value = match serde_json::from_str(line.trim()) {
                Ok(v) => v,
                Err(e) => {
                    warn!("unparseable frame from server: {e}");
                    continue;
                }
            };

            match frame.get("id").and_then(Value::as_u64) {
                None => {
                    debug!(
                        method = frame["method"].as_str().unwrap_or("?"),
                        "notification from server while awaiting response; skipped"
                    );
                    continue;
                }
                Some(got) if got != id => {
                    warn!(got, expected = id, "response id mismatch; skipped");
                    continue;
                }
                Some(_) => {}
            }

            if let Some(err) = frame.get("error") {
                return Err(McpError::Rpc {
                    code: err["code"].as_i64().unwrap_or(0),
                    message: err["message"].as_str().unwrap_or_default().to_string(),
                });
            }
            return Ok(frame["result"].clone());
        }
    }

    async fn notify(&mut self, method: &str, params: Value) -> Result<(), McpError> {
        self.send(protocol::notification(method, params)).await
    }

    async fn send(&mut self, frame: Value) -> Result<(), McpError> {
        let mut line = frame.to_string();
        if line.len() > MAX_FRAME_BYTES {
            return Err(McpError::Protocol(format!(
                "outgoing frame of {} bytes exceeds cap",
                line.len()
            )));
        }
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// A canned MCP server as a shell one-liner: answers initialize,
    /// tools/list (echo + add) and tools/call, and emits a notification
    /// before the call response so the skip path is exercised.
    fn fake_server_config(name: &str) -> ServerConfig {
        let script = r#"
while IFS= read -r line; do
  case "$line" in
    *'"method":"initialize"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-11-25","serverInfo":{"name":"fake","version":"1.0"},"capabilities":{"tools":{"listChanged":false}}}}' ;;
    *'"method":"tools/list"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"echoes input","inputSchema":{"type":"object"}},{"name":"add","description":"adds numbers","inputSchema":{"type":"object"}}]}}' ;;
    *'"method":"tools/call"'*)
      printf '%s\n' '{"jsonrpc":"2.0","method":"notifications/progress","params":{"progress":1}}'
      printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"echoed!"}],"isError":false}}' ;;
  esac
done
"#;
        ServerConfig {
            name: name.to_string(),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            env: vec![],
        }
    }

    #[test]
    fn server_limit_is_enforced() {
        let mut c = McpClient::new();
        for i in 0..MAX_SERVERS {
            c.add_server(ServerConfig {
                name: format!("s{i}"),
                command: "true".into(),
                args: vec![],
                env: vec![],
            })
            .unwrap();
        }
        assert!(matches!(
            c.add_server(fake_server_config("extra")),
            Err(McpError::ServerLimit)
        ));
    }

    #[tokio::test]
    async fn connect_discovers_tools_with_server_backrefs() {
        let mut c = McpClient::new();
        c.add_server(fake_server_config("fake")).unwrap();
        let n = c.connect().await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(c.tool_count(), 2);
        let names: Vec<&str> = c.tools().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["echo", "add"]);
        assert!(c.tools().iter().all(|t| t.server_index == 0));
        c.stop().await;
    }

    #[tokio::test]
    async fn call_tool_skips_interleaved_notification() {
        let mut c = McpClient::new();
        c.add_server(fake_server_config("fake")).unwrap();
        c.connect().await.unwrap();
        // The fake server sends a notifications/progress frame before the
        // real response; the client must skip it and still match id 3.
        let out = c.call_tool("echo", json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, "echoed!");
        c.stop().await;
    }

    #[tokio::test]
    async fn call_unknown_tool_is_tool_not_found() {
        let c = McpClient::new();
        let err = c.call_tool("ghost", json!({})).await.unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn dead_command_fails_to_connect_but_does_not_poison_client() {
        let mut c = McpClient::new();
        c.add_server(ServerConfig {
            name: "broken".into(),
            command: "/nonexistent/norn-mcp-binary".into(),
            args: vec![],
            env: vec![],
        })
        .unwrap();
        c.add_server(fake_server_config("fake")).unwrap();
        let n = c.connect().await.unwrap();
        // The broken server contributes nothing; the good one still works.
        assert_eq!(n, 2);
        c.stop().await;
    }

    #[tokio::test]
    async fn load_config_queues_servers() {
        let f = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            f.path(),
            r#"{"mcpServers": {"a": {"command": "true"}, "b": {"command": "false"}}}"#,
        )
        .unwrap();
        let mut c = McpClient::new();
        let n = c.load_config(f.path()).unwrap();
        assert_eq!(n, 2);
        assert_eq!(c.server_count(), 2);
    }
}
