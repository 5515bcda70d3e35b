// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::capability::CapabilitySet;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Hard byte ceiling for combined stdout + stderr returned to the model.
const OUTPUT_LIMIT_BYTES: usize = 16_384;

/// Built-in tool that runs a shell command.
///
/// Gated behind the `shell` capability — this tool intentionally accepts
/// arbitrary command lines, so the capability mask is the only gate.
pub struct ShellTool {
    pub timeout_secs: u64,
}

impl Default for ShellTool {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout + stderr.\n\
         'command' is required and may be any one-line command.\n\
         Output is capped at 16 KiB with a truncation marker.\n\
         Prefer non-interactive commands; nothing can answer a prompt."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Execution timeout in seconds (optional)"
                }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::SHELL
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let command = match call.args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'command'"),
        };
        let timeout = call
            .args
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.timeout_secs);

        debug!(cmd = %command, "shell tool");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command);
        // No terminal: subprocesses must not block on fd 0, and a timeout
        // must actually kill the child when the future is dropped.
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        let result =
            tokio::time::timeout(std::time::Duration::from_secs(timeout), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let mut content = String::new();
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.is_empty() {
                    content.push_str(&truncate_output(&stdout));
                }
                if !stderr.is_empty() {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str("[stderr]\n");
                    content.push_str(&truncate_output(&stderr));
                }
                let code = output.status.code().unwrap_or(-1);
                let body = if content.is_empty() {
                    String::new()
                } else {
                    format!("\n{content}")
                };
                match code {
                    0 if body.is_empty() => ToolOutput::ok(&call.id, "[exit 0]"),
                    0 => ToolOutput::ok(&call.id, content),
                    // Exit 1 is "no matches" / "condition false" for grep,
                    // test and friends — not a command failure.
                    1 => ToolOutput::ok(&call.id, format!("[exit 1]{body}")),
                    _ => ToolOutput::err(&call.id, format!("[exit {code}]{body}")),
                }
            }
            Ok(Err(e)) => ToolOutput::err(&call.id, format!("spawn error: {e}")),
            Err(_) => ToolOutput::err(&call.id, format!("timeout after {timeout}s")),
        }
    }
}

/// Cut `s` at the byte ceiling on a line boundary, appending a marker that
/// names how much was dropped.
fn truncate_output(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }
    let cut = s[..OUTPUT_LIMIT_BYTES]
        .rfind('\n')
        .map(|p| p + 1)
        .unwrap_or_else(|| {
            let mut i = OUTPUT_LIMIT_BYTES;
            while !s.is_char_boundary(i) {
                i -= 1;
            }
            i
        });
    format!("{}[... {} bytes truncated ...]", &s[..cut], s.len() - cut)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
