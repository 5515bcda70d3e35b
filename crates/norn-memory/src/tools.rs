// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Memory exposed to the model as callable tools.  Each tool holds an
//! `Arc<MemoryStore>`; the store outlives every registry that references it.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use norn_tools::{CapabilitySet, RegisterError, Tool, ToolCall, ToolOutput, ToolRegistry};

use crate::MemoryStore;

/// Maximum matches returned by `memory_search`.
const SEARCH_LIMIT: usize = 5;

/// Register the three memory tools on `registry`, sharing `store`.
pub fn register_memory_tools(
    registry: &mut ToolRegistry,
    store: Arc<MemoryStore>,
) -> Result<(), RegisterError> {
    registry.register(MemoryStoreTool { store: store.clone() })?;
    registry.register(MemorySearchTool { store: store.clone() })?;
    registry.register(MemoryCoreUpdateTool { store })?;
    Ok(())
}

/// `memory_store(key, value, category?)` — upsert an archival fact.
pub struct MemoryStoreTool {
    pub store: Arc<MemoryStore>,
}

#[async_trait]
impl Tool for MemoryStoreTool {
    fn name(&self) -> &str {
        "memory_store"
    }

    fn description(&self) -> &str {
        "Store a fact in long-term archival memory under a key. Storing to \
         an existing key replaces its value."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "key": { "type": "string", "description": "Stable identifier for the fact" },
                "value": { "type": "string", "description": "The fact to remember" },
                "category": { "type": "string", "description": "Grouping label (optional)" }
            },
            "required": ["key", "value"],
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::MEMORY
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let key = match call.args.get("key").and_then(|v| v.as_str()) {
            Some(k) if !k.is_empty() => k,
            _ => return ToolOutput::err(&call.id, "missing required parameter 'key'"),
        };
        let value = match call.args.get("value").and_then(|v| v.as_str()) {
            Some(v) => v,
            None => return ToolOutput::err(&call.id, "missing required parameter 'value'"),
        };
        let category = call
            .args
            .get("category")
            .and_then(|v| v.as_str())
            .unwrap_or("general");

        debug!(key, category, "memory_store tool");
        match self.store.archival_store(key, value, category, 0.5) {
            Ok(()) => ToolOutput::ok(&call.id, format!("stored {key:?}")),
            Err(e) => ToolOutput::err(&call.id, format!("memory error: {e}")),
        }
    }
}

/// `memory_search(query)` — up to 5 archival matches as a JSON array.
pub struct MemorySearchTool {
    pub store: Arc<MemoryStore>,
}

#[async_trait]
impl Tool for MemorySearchTool {
    fn name(&self) -> &str {
        "memory_search"
    }

    fn description(&self) -> &str {
        "Search long-term archival memory. Returns up to 5 matching facts \
         as a JSON array of {key, value, category}."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Full-text search query" }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::MEMORY
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let query = match call.args.get("query").and_then(|v| v.as_str()) {
            Some(q) if !q.is_empty() => q,
            _ => return ToolOutput::err(&call.id, "missing required parameter 'query'"),
        };
        debug!(query, "memory_search tool");
        match self.store.archival_search(query, SEARCH_LIMIT) {
            Ok(facts) => {
                let arr: Vec<Value> = facts
                    .iter()
                    .map(|f| {
                        json!({ "key": f.key, "value": f.value, "category": f.category })
                    })
                    .collect();
                ToolOutput::ok(&call.id, Value::Array(arr).to_string())
            }
            Err(e) => ToolOutput::err(&call.id, format!("memory error: {e}")),
        }
    }
}

/// `memory_core_update(label, content)` — overwrite a core block.
pub struct MemoryCoreUpdateTool {
    pub store: Arc<MemoryStore>,
}

#[async_trait]
impl Tool for MemoryCoreUpdateTool {
    fn name(&self) -> &str {
        "memory_core_update"
    }

    fn description(&self) -> &str {
        "Overwrite a core memory block (persona, human, instructions, or a \
         custom label). Core blocks are always visible in the system prompt."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "label": { "type": "string", "description": "Block label" },
                "content": { "type": "string", "description": "New block content" }
            },
            "required": ["label", "content"],
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::MEMORY
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let label = match call.args.get("label").and_then(|v| v.as_str()) {
            Some(l) if !l.is_empty() => l,
            _ => return ToolOutput::err(&call.id, "missing required parameter 'label'"),
        };
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolOutput::err(&call.id, "missing required parameter 'content'"),
        };
        debug!(label, "memory_core_update tool");
        match self.store.core_set(label, content) {
            Ok(()) => ToolOutput::ok(&call.id, format!("core block {label:?} updated")),
            Err(e) => ToolOutput::err(&call.id, format!("memory error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
