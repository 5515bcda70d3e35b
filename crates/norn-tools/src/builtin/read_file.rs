// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::capability::CapabilitySet;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Byte cap for whole-file reads.  Window reads (`start_line`/`end_line`)
/// are exempt — the caller asked for a bounded slice already.
const MAX_BYTES: usize = 64 * 1024;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file. Optional start_line/end_line select a 1-indexed \
         inclusive window; without a window the first 64 KiB are returned \
         and a truncation marker is appended when the file is larger."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file"
                },
                "start_line": {
                    "type": "integer",
                    "description": "1-indexed first line of the window (optional)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "1-indexed last line of the window, inclusive (optional)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::FILESYSTEM
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };
        let start_line = call.args.get("start_line").and_then(|v| v.as_u64());
        let end_line = call.args.get("end_line").and_then(|v| v.as_u64());

        debug!(path = %path, ?start_line, ?end_line, "read_file tool");

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };

        // Windowed read.
        if start_line.is_some() || end_line.is_some() {
            let start = start_line.unwrap_or(1).max(1) as usize;
            let lines: Vec<&str> = text.lines().collect();
            let end = end_line
                .map(|e| e as usize)
                .unwrap_or(lines.len())
                .min(lines.len());
            if start > end {
                return ToolOutput::err(
                    &call.id,
                    format!("empty window: start_line {start} > end_line {end}"),
                );
            }
            return ToolOutput::ok(&call.id, lines[start - 1..end].join("\n"));
        }

        if text.len() <= MAX_BYTES {
            return ToolOutput::ok(&call.id, text);
        }
        let mut cut = MAX_BYTES;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        ToolOutput::ok(
            &call.id,
            format!(
                "{}\n[... truncated: {} of {} bytes shown; use start_line/end_line for the rest ...]",
                &text[..cut],
                cut,
                text.len()
            ),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "r".into(), name: "read_file".into(), args }
    }

    fn tmp_file(content: &str) -> tempfile::NamedTempFile {
        let f = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(f.path(), content).unwrap();
        f
    }

    #[tokio::test]
    async fn reads_whole_file() {
        let f = tmp_file("alpha\nbeta\ngamma\n");
        let out = ReadFileTool
            .execute(&call(json!({"path": f.path()})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(out.content, "alpha\nbeta\ngamma\n");
    }

    #[tokio::test]
    async fn window_is_one_indexed_and_inclusive() {
        let f = tmp_file("l1\nl2\nl3\nl4\nl5\n");
        let out = ReadFileTool
            .execute(&call(json!({"path": f.path(), "start_line": 2, "end_line": 4})))
            .await;
        assert_eq!(out.content, "l2\nl3\nl4");
    }

    #[tokio::test]
    async fn open_ended_window_runs_to_eof() {
        let f = tmp_file("a\nb\nc\n");
        let out = ReadFileTool
            .execute(&call(json!({"path": f.path(), "start_line": 3})))
            .await;
        assert_eq!(out.content, "c");
    }

    #[tokio::test]
    async fn inverted_window_is_an_error() {
        let f = tmp_file("a\nb\n");
        let out = ReadFileTool
            .execute(&call(json!({"path": f.path(), "start_line": 5, "end_line": 2})))
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn oversized_file_is_truncated_with_marker() {
        let big = "line of text\n".repeat(10_000); // 130 KB
        let f = tmp_file(&big);
        let out = ReadFileTool.execute(&call(json!({"path": f.path()}))).await;
        assert!(!out.is_error);
        assert!(out.content.len() < big.len());
        assert!(out.content.contains("truncated"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let out = ReadFileTool
            .execute(&call(json!({"path": "/tmp/norn_no_such_file_xyz"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("read error"));
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let out = ReadFileTool.execute(&call(json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("path"));
    }
}
