// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::capability::CapabilitySet;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, replacing it if it exists. Parent \
         directories are created as needed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["path", "content"],
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
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'content'"),
        };

        debug!(path = %path, bytes = content.len(), "write_file tool");

        if let Some(parent) = std::path::Path::new(&path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return ToolOutput::err(&call.id, format!("mkdir error: {e}"));
                }
            }
        }
        match tokio::fs::write(&path, &content).await {
            Ok(()) => ToolOutput::ok(&call.id, format!("wrote {} bytes to {path}", content.len())),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "w".into(), name: "write_file".into(), args }
    }

    #[tokio::test]
    async fn writes_and_reports_byte_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let out = WriteFileTool
            .execute(&call(json!({"path": path, "content": "payload"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("7 bytes"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "payload");
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a/b/c.txt");
        let out = WriteFileTool
            .execute(&call(json!({"path": path, "content": "x"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "old").unwrap();
        WriteFileTool
            .execute(&call(json!({"path": path, "content": "new"})))
            .await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[tokio::test]
    async fn missing_content_is_an_error() {
        let out = WriteFileTool
            .execute(&call(json!({"path": "/tmp/x"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("content"));
    }
}
