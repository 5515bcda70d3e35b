// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::capability::CapabilitySet;
use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List a directory. Returns a JSON array of {\"name\", \"type\"} \
         entries, type one of \"file\", \"dir\", \"symlink\"."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: current directory)"
                }
            },
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::FILESYSTEM
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = call
            .args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();

        debug!(path = %path, "list_dir tool");

        let mut rd = match tokio::fs::read_dir(&path).await {
            Ok(rd) => rd,
            Err(e) => return ToolOutput::err(&call.id, format!("list error: {e}")),
        };

        let mut entries: Vec<Value> = Vec::new();
        loop {
            match rd.next_entry().await {
                Ok(Some(entry)) => {
                    let kind = match entry.file_type().await {
                        Ok(t) if t.is_dir() => "dir",
                        Ok(t) if t.is_symlink() => "symlink",
                        Ok(_) => "file",
                        Err(_) => "file",
                    };
                    entries.push(json!({
                        "name": entry.file_name().to_string_lossy(),
                        "type": kind,
                    }));
                }
                Ok(None) => break,
                Err(e) => return ToolOutput::err(&call.id, format!("list error: {e}")),
            }
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        ToolOutput::ok(&call.id, Value::Array(entries).to_string())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "l".into(), name: "list_dir".into(), args }
    }

    #[tokio::test]
    async fn lists_files_and_dirs_as_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("a_dir")).unwrap();

        let out = ListDirTool.execute(&call(json!({"path": dir.path()}))).await;
        assert!(!out.is_error, "{}", out.content);
        let parsed: Vec<Value> = serde_json::from_str(&out.content).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["name"], "a_dir");
        assert_eq!(parsed[0]["type"], "dir");
        assert_eq!(parsed[1]["name"], "b.txt");
        assert_eq!(parsed[1]["type"], "file");
    }

    #[tokio::test]
    async fn empty_directory_yields_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let out = ListDirTool.execute(&call(json!({"path": dir.path()}))).await;
        assert_eq!(out.content, "[]");
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let out = ListDirTool
            .execute(&call(json!({"path": "/tmp/norn_no_such_dir_xyz"})))
            .await;
        assert!(out.is_error);
    }
}
