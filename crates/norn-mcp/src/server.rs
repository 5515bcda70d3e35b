// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Inbound MCP: serve a local [`ToolRegistry`] to an MCP host over stdio.
//!
//! Line-delimited JSON-RPC 2.0 on stdin/stdout.  stdout carries protocol
//! frames *only* — all logging goes to stderr via `tracing`.  The frame
//! handler is a pure function over `(state, registry, line)` so the whole
//! protocol surface is unit-testable without a transport.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use norn_tools::{ToolCall, ToolRegistry};

use crate::protocol::{
    self, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, MAX_FRAME_BYTES, METHOD_NOT_FOUND,
    NOT_INITIALIZED, PROTOCOL_VERSION,
};

/// Per-connection protocol state.
#[derive(Debug, Default)]
pub struct ServerState {
    initialized: bool,
    /// Request counter, used to mint tool-call ids.
    calls_served: u64,
}

/// Serve `registry` on stdin/stdout until the client disconnects (EOF).
///
/// Designed to be the sole operation of the `norn mcp serve` subcommand.
pub async fn serve_stdio(registry: Arc<ToolRegistry>) -> anyhow::Result<()> {
    let mut state = ServerState::default();
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut line = String::new();

    info!(tools = registry.len(), "MCP stdio server ready");
    loop {
        line.clear();
        let read = stdin.read_line(&mut line).await?;
        if read == 0 {
            info!("stdin closed; MCP server exiting");
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }
        if let Some(reply) = handle_frame(&mut state, &registry, line.trim()).await {
            stdout.write_all(reply.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }
}

/// Process one frame; `None` means "no reply" (notifications).
pub async fn handle_frame(
    state: &mut ServerState,
    registry: &ToolRegistry,
    line: &str,
) -> Option<String> {
    if line.len() > MAX_FRAME_BYTES {
        warn!(bytes = line.len(), "oversized frame rejected");
        return Some(
            protocol::response_err(Value::Null, INVALID_REQUEST, "frame too large").to_string(),
        );
    }

    let frame: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!("unparseable frame: {e}");
            return Some(
                protocol::response_err(Value::Null, INVALID_REQUEST, "invalid JSON").to_string(),
            );
        }
    };

    let id = frame.get("id").cloned();
    let method = frame.get("method").and_then(Value::as_str);

    // No id: a notification.  Never replied to.
    let Some(id) = id else {
        match method {
            Some("notifications/initialized") => {
                debug!("client reports initialized");
            }
            Some("notifications/cancelled") => {
                debug!(params = %frame["params"], "cancellation notification ignored");
            }
            Some(other) => debug!(method = other, "unknown notification ignored"),
            None => warn!("notification without method ignored"),
        }
        return None;
    };

    let Some(method) = method else {
        return Some(
            protocol::response_err(id, INVALID_REQUEST, "request without method").to_string(),
        );
    };

    if !state.initialized && method != "initialize" {
        return Some(
            protocol::response_err(id, NOT_INITIALIZED, "initialize must come first").to_string(),
        );
    }

    let reply = match method {
        "initialize" => {
            state.initialized = true;
            protocol::response_ok(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "serverInfo": {
                        "name": "norn",
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                    "capabilities": { "tools": { "listChanged": false } },
                }),
            )
        }
        "ping" => protocol::response_ok(id, json!({})),
        "tools/list" => {
            let tools: Vec<Value> = registry
                .schemas()
                .into_iter()
                .map(|s| {
                    json!({
                        "name": s.name,
                        "description": s.description,
                        "inputSchema": s.parameters,
                    })
                })
                .collect();
            protocol::response_ok(id, json!({ "tools": tools }))
        }
        "tools/call" => {
            let params = &frame["params"];
            let Some(name) = params["name"].as_str() else {
                return Some(
                    protocol::response_err(id, INVALID_PARAMS, "missing tool name").to_string(),
                );
            };
            let args = params.get("arguments").cloned().unwrap_or_else(|| json!({}));
            if !args.is_object() {
                return Some(
                    protocol::response_err(id, INVALID_PARAMS, "arguments must be an object")
                        .to_string(),
                );
            }
            state.calls_served += 1;
            let call = ToolCall {
                id: format!("mcp-{}", state.calls_served),
                name: name.to_string(),
                args,
            };
            let output = registry.execute(&call).await;
            protocol::response_ok(
                id,
                json!({
                    "content": [{ "type": "text", "text": output.content }],
                    "isError": output.is_error,
                }),
            )
        }
        other => {
            debug!(method = other, "method not found");
            protocol::response_err(id, METHOD_NOT_FOUND, &format!("unknown method {other:?}"))
        }
    };

    let text = reply.to_string();
    if text.len() > MAX_FRAME_BYTES {
        // A tool result can exceed the frame cap; report instead of emitting
        // an unreadable frame.
        return Some(
            protocol::response_err(Value::Null, INTERNAL_ERROR, "response exceeds frame cap")
                .to_string(),
        );
    }
    Some(text)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
