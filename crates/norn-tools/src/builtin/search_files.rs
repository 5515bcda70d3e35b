// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::capability::CapabilitySet;
use crate::sanitize::check_shell_safe;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Recursion bound handed to `find -maxdepth`.
const MAX_DEPTH: usize = 4;

/// Result cap; matches beyond it are dropped with a notice.
const MAX_RESULTS: usize = 20;

pub struct SearchFilesTool;

/// Keep only the filename part of a glob: `find -name` takes a simple name
/// pattern, the recursion is find's own.  `src/**/*.rs` → `*.rs`.
fn name_pattern(pattern: &str) -> &str {
    match pattern.rfind('/') {
        Some(pos) => &pattern[pos + 1..],
        None => pattern,
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Find files by glob pattern under a root directory, at most 4 levels \
         deep, capped at 20 results. Pattern is a filename glob like '*.rs'; \
         any path prefix is stripped."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Filename glob pattern, e.g. '*.md'"
                },
                "root": {
                    "type": "string",
                    "description": "Directory to search from (default: current directory)"
                }
            },
            "required": ["pattern"],
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::FILESYSTEM
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let pattern = match call.args.get("pattern").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'pattern'"),
        };
        let root = call
            .args
            .get("root")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();

        // Both strings end up on a subprocess command line.
        if let Err(e) = check_shell_safe(&pattern).and_then(|_| check_shell_safe(&root)) {
            return ToolOutput::err(&call.id, e);
        }

        let name = name_pattern(&pattern);
        debug!(pattern = %name, root = %root, "search_files tool");

        let output = Command::new("find")
            .arg(&root)
            .arg("-maxdepth")
            .arg(MAX_DEPTH.to_string())
            .arg("-name")
            .arg(name)
            .stdin(Stdio::null())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() || !out.stdout.is_empty() => {
                let text = String::from_utf8_lossy(&out.stdout);
                let matches: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
                if matches.is_empty() {
                    return ToolOutput::ok(&call.id, "(no matches)");
                }
                let mut listing = matches
                    .iter()
                    .take(MAX_RESULTS)
                    .copied()
                    .collect::<Vec<_>>()
                    .join("\n");
                if matches.len() > MAX_RESULTS {
                    listing.push_str(&format!(
                        "\n[... {} more matches omitted ...]",
                        matches.len() - MAX_RESULTS
                    ));
                }
                ToolOutput::ok(&call.id, listing)
            }
            Ok(out) => ToolOutput::err(
                &call.id,
                format!("find failed: {}", String::from_utf8_lossy(&out.stderr).trim()),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("spawn error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "s".into(), name: "search_files".into(), args }
    }

    #[test]
    fn path_prefix_is_stripped_from_pattern() {
        assert_eq!(name_pattern("**/*.rs"), "*.rs");
        assert_eq!(name_pattern("src/lib.rs"), "lib.rs");
        assert_eq!(name_pattern("*.toml"), "*.toml");
    }

    #[tokio::test]
    async fn finds_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("keep.md"), "x").unwrap();
        std::fs::write(dir.path().join("skip.txt"), "x").unwrap();

        let out = SearchFilesTool
            .execute(&call(json!({"pattern": "*.md", "root": dir.path()})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("keep.md"));
        assert!(!out.content.contains("skip.txt"));
    }

    #[tokio::test]
    async fn no_matches_reports_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let out = SearchFilesTool
            .execute(&call(json!({"pattern": "*.nothing", "root": dir.path()})))
            .await;
        assert_eq!(out.content, "(no matches)");
    }

    #[tokio::test]
    async fn result_cap_appends_omission_notice() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..30 {
            std::fs::write(dir.path().join(format!("f{i:02}.log")), "x").unwrap();
        }
        let out = SearchFilesTool
            .execute(&call(json!({"pattern": "*.log", "root": dir.path()})))
            .await;
        assert!(out.content.contains("more matches omitted"), "{}", out.content);
        let shown = out.content.lines().filter(|l| l.ends_with(".log")).count();
        assert_eq!(shown, MAX_RESULTS);
    }

    #[tokio::test]
    async fn depth_bound_hides_deep_files() {
        let dir = tempfile::tempdir().unwrap();
        let deep = dir.path().join("a/b/c/d/e");
        std::fs::create_dir_all(&deep).unwrap();
        std::fs::write(deep.join("deep.md"), "x").unwrap();
        let out = SearchFilesTool
            .execute(&call(json!({"pattern": "*.md", "root": dir.path()})))
            .await;
        assert!(!out.content.contains("deep.md"), "{}", out.content);
    }

    #[tokio::test]
    async fn metacharacters_in_pattern_are_rejected_before_spawn() {
        let out = SearchFilesTool
            .execute(&call(json!({"pattern": "*.md; rm -rf /", "root": "."})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("disallowed"));
    }

    #[tokio::test]
    async fn metacharacters_in_root_are_rejected() {
        let out = SearchFilesTool
            .execute(&call(json!({"pattern": "*.md", "root": "/tmp`whoami`"})))
            .await;
        assert!(out.is_error);
    }
}
