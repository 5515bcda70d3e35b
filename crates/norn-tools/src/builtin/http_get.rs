// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::capability::CapabilitySet;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Response body cap.
const MAX_BYTES: usize = 32 * 1024;

/// Whole-request deadline.
const TIMEOUT_SECS: u64 = 10;

pub struct HttpGetTool;

#[async_trait]
impl Tool for HttpGetTool {
    fn name(&self) -> &str {
        "http_get"
    }

    fn description(&self) -> &str {
        "Fetch a URL with HTTP GET and return the response body as text. \
         Body is capped at 32 KiB; the request times out after 10 seconds."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http or https URL to fetch"
                }
            },
            "required": ["url"],
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::NETWORK
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = match call.args.get("url").and_then(|v| v.as_str()) {
            Some(u) => u.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'url'"),
        };
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return ToolOutput::err(&call.id, "url must start with http:// or https://");
        }

        debug!(url = %url, "http_get tool");

        match fetch(&url).await {
            Ok(body) => ToolOutput::ok(&call.id, body),
            Err(e) => ToolOutput::err(&call.id, format!("fetch error: {e}")),
        }
    }
}

async fn fetch(url: &str) -> anyhow::Result<String> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
        .build()?;
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        anyhow::bail!("HTTP {status}");
    }
    let body = resp.text().await?;
    if body.len() <= MAX_BYTES {
        return Ok(body);
    }
    let mut cut = MAX_BYTES;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    Ok(format!(
        "{}\n[... truncated: {} of {} bytes shown ...]",
        &body[..cut],
        cut,
        body.len()
    ))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "h".into(), name: "http_get".into(), args }
    }

    #[tokio::test]
    async fn missing_url_is_an_error() {
        let out = HttpGetTool.execute(&call(json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("url"));
    }

    #[tokio::test]
    async fn non_http_scheme_is_rejected() {
        let out = HttpGetTool
            .execute(&call(json!({"url": "file:///etc/passwd"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("http"));
    }

    #[tokio::test]
    async fn connection_refused_is_a_tool_error_not_a_panic() {
        // Port 9 (discard) is almost never listening locally.
        let out = HttpGetTool
            .execute(&call(json!({"url": "http://127.0.0.1:9/none"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("fetch error"));
    }

    #[tokio::test]
    async fn serves_and_caps_local_body() {
        use tokio::io::AsyncWriteExt;

        // One-shot local HTTP server with an oversized body.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = "z".repeat(MAX_BYTES * 2);
        let server = tokio::spawn(async move {
            use tokio::io::AsyncReadExt;
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut req = [0u8; 2048];
            let _ = sock.read(&mut req).await;
            let resp = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            sock.write_all(resp.as_bytes()).await.unwrap();
        });

        let out = HttpGetTool
            .execute(&call(json!({"url": format!("http://{addr}/")})))
            .await;
        server.await.unwrap();
        assert!(!out.is_error, "{}", out.content);
        assert!(out.content.contains("truncated"));
        assert!(out.content.len() < MAX_BYTES * 2);
    }
}
