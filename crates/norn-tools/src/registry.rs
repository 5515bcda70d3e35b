// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::builtin;
use crate::capability::CapabilitySet;
use crate::{Tool, ToolCall, ToolOutput};

/// Upper bound on registered tools.  Generous for a local runtime; the MCP
/// bridge alone may contribute dozens.
pub const MAX_TOOLS: usize = 64;

/// A tool schema as surfaced to peers (MCP `tools/list`) and prompts.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegisterError {
    #[error("tool {0:?} is already registered")]
    Duplicate(String),
    #[error("registry is full ({MAX_TOOLS} tools)")]
    Full,
}

/// Central registry holding all available tools.
///
/// Insertion-ordered: enumeration, the prompt catalog, and the grammar
/// fragment all list tools in registration order, deterministically.
/// Built before a run and treated as read-only while the agent loops.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool.  Duplicate names and a full registry both fail and
    /// leave the registry unchanged.
    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegisterError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegisterError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(RegisterError::Duplicate(name));
        }
        if self.tools.len() >= MAX_TOOLS {
            return Err(RegisterError::Full);
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Register the built-in tools whose required capabilities are covered
    /// by `caps`.  Returns how many were added.
    pub fn register_defaults(&mut self, caps: CapabilitySet) -> Result<usize, RegisterError> {
        let mut added = 0;
        for tool in builtin::default_tools() {
            if caps.contains(tool.required_capabilities()) {
                self.register_arc(tool)?;
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .iter()
            .map(|t| ToolSchema {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Dispatch a call by name.  An unknown name is an error *output*, not a
    /// failure of the loop — the model gets to read it and recover.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.get(&call.name) {
            Some(tool) => tool.execute(call).await,
            None => ToolOutput::err(&call.id, format!("unknown tool: {}", call.name)),
        }
    }

    /// GBNF fragment constraining an `action` value to the registered tool
    /// names, e.g. `tool-name ::= "\"shell\"" | "\"calculate\""`.
    ///
    /// Empty registry yields an empty string — callers fall back to a free
    /// string rule.
    pub fn grammar_names(&self) -> String {
        if self.tools.is_empty() {
            return String::new();
        }
        let alts: Vec<String> = self
            .tools
            .iter()
            .map(|t| format!("\"\\\"{}\\\"\"", t.name()))
            .collect();
        format!("tool-name ::= {}", alts.join(" | "))
    }

    /// Human-readable tool catalog for prompt inclusion.
    pub fn prompt_description(&self) -> String {
        let mut out = String::new();
        for t in &self.tools {
            out.push_str(&format!(
                "- {}: {}\n  args schema: {}\n",
                t.name(),
                t.description().lines().next().unwrap_or_default(),
                t.parameters_schema()
            ));
        }
        out
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
