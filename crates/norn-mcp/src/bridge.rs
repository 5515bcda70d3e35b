// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Bridge discovered MCP tools into a local [`ToolRegistry`].
//!
//! Each bridged tool stores only the shared client handle and its index in
//! the client's discovery arena — the executor resolves the owning server
//! through the client at call time.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use norn_tools::{CapabilitySet, RegisterError, Tool, ToolCall, ToolOutput, ToolRegistry};

use crate::client::McpClient;

/// Proxy for one discovered remote tool.
pub struct McpProxyTool {
    client: Arc<McpClient>,
    tool_index: usize,
}

#[async_trait]
impl Tool for McpProxyTool {
    fn name(&self) -> &str {
        &self.client.tools()[self.tool_index].name
    }

    fn description(&self) -> &str {
        &self.client.tools()[self.tool_index].description
    }

    fn parameters_schema(&self) -> Value {
        self.client.tools()[self.tool_index].input_schema.clone()
    }

    fn required_capabilities(&self) -> CapabilitySet {
        // Remote tools run in another process the client talks to; gate them
        // with the network capability regardless of what they do over there.
        CapabilitySet::NETWORK
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let name = self.name().to_string();
        match self.client.call_tool(&name, call.args.clone()).await {
            Ok(text) => ToolOutput::ok(&call.id, text),
            Err(e) => ToolOutput::err(&call.id, format!("MCP call failed: {e}")),
        }
    }
}

/// Insert one [`McpProxyTool`] per discovered tool.  Returns how many were
/// registered; stops at the first registry error (duplicate name or a full
/// registry).
pub fn register_bridged_tools(
    client: &Arc<McpClient>,
    registry: &mut ToolRegistry,
) -> Result<usize, RegisterError> {
    let mut added = 0;
    for tool_index in 0..client.tools().len() {
        debug!(tool = %client.tools()[tool_index].name, "bridging MCP tool");
        registry.register(McpProxyTool { client: client.clone(), tool_index })?;
        added += 1;
    }
    Ok(added)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
