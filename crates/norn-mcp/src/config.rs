// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::client::{McpError, ServerConfig};

/// On-disk MCP server description:
///
/// ```json
/// {
///   "mcpServers": {
///     "files": { "command": "mcp-files", "args": ["--root", "/data"],
///                "env": { "LOG": "info" } }
///   }
/// }
/// ```
#[derive(Debug, Deserialize)]
struct McpConfigFile {
    #[serde(rename = "mcpServers")]
    mcp_servers: BTreeMap<String, ServerEntry>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

/// Parse an MCP config file into server configs, name-ordered.
pub fn load_mcp_config(path: &Path) -> Result<Vec<ServerConfig>, McpError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| McpError::Config(format!("reading {}: {e}", path.display())))?;
    let file: McpConfigFile = serde_json::from_str(&text)
        .map_err(|e| McpError::Config(format!("parsing {}: {e}", path.display())))?;
    Ok(file
        .mcp_servers
        .into_iter()
        .map(|(name, entry)| ServerConfig {
            name,
            command: entry.command,
            args: entry.args,
            env: entry.env.into_iter().collect(),
        })
        .collect())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let f = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(f.path(), json).unwrap();
        f
    }

    #[test]
    fn parses_servers_with_args_and_env() {
        let f = write_config(
            r#"{ "mcpServers": {
                "files": { "command": "mcp-files", "args": ["--root", "/data"],
                           "env": { "LOG": "info", "MODE": "ro" } },
                "calc":  { "command": "mcp-calc" }
            }}"#,
        );
        let servers = load_mcp_config(f.path()).unwrap();
        assert_eq!(servers.len(), 2);

        let calc = servers.iter().find(|s| s.name == "calc").unwrap();
        assert_eq!(calc.command, "mcp-calc");
        assert!(calc.args.is_empty());
        assert!(calc.env.is_empty());

        let files = servers.iter().find(|s| s.name == "files").unwrap();
        assert_eq!(files.args, vec!["--root", "/data"]);
        assert!(files.env.contains(&("LOG".to_string(), "info".to_string())));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = load_mcp_config(Path::new("/tmp/norn_no_such_config.json")).unwrap_err();
        assert!(matches!(err, McpError::Config(_)));
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let f = write_config("{ not json");
        assert!(matches!(load_mcp_config(f.path()), Err(McpError::Config(_))));
    }

    #[test]
    fn missing_mcp_servers_key_is_a_config_error() {
        let f = write_config(r#"{"servers": {}}"#);
        assert!(load_mcp_config(f.path()).is_err());
    }
}
