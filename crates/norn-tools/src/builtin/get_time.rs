// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use chrono::Local;
use serde_json::{json, Value};

use crate::tool::{Tool, ToolCall, ToolOutput};

pub struct GetTimeTool;

#[async_trait]
impl Tool for GetTimeTool {
    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Return the current local date and time in RFC 3339 format."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "additionalProperties": false })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        ToolOutput::ok(&call.id, Local::now().to_rfc3339())
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn returns_rfc3339_timestamp() {
        let call = ToolCall { id: "t".into(), name: "get_time".into(), args: json!({}) };
        let out = GetTimeTool.execute(&call).await;
        assert!(!out.is_error);
        assert!(chrono::DateTime::parse_from_rfc3339(&out.content).is_ok(), "{}", out.content);
    }
}
