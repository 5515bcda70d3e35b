// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Approximate token count of `text`: ~3.5 characters per token.
///
/// Applied uniformly — compaction triggering, recall accounting, and the
/// facade's context clamp all use this one estimator.  It governs when to
/// compact, not what the model sees, so precision is not required.
pub fn approx_tokens(text: &str) -> usize {
    text.len() * 10 / 35
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message handed to the backend's chat-template formatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }

    pub fn approx_tokens(&self) -> usize {
        approx_tokens(&self.content)
    }
}

/// Everything one completion needs.
///
/// The sampler chain order is fixed: grammar → repeat-penalty → top-k →
/// top-p → temperature → dist (greedy when `temperature == 0`).  Backends
/// must preserve that order; the grammar zeroes invalid continuations before
/// any truncation sampler runs.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub repeat_penalty: f32,
    pub repeat_last_n: i32,
    /// GBNF grammar text.  When set and non-empty, the completion conforms
    /// to the grammar at every sampled step.
    pub grammar: Option<String>,
    /// Root rule override; `None` uses the grammar's own `root`.
    pub grammar_root: Option<String>,
    /// RNG seed; 0 draws from the wall clock.
    pub seed: u32,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            max_tokens: 512,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            grammar: None,
            grammar_root: None,
            seed: 0,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
