// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

/// Errors surfaced by the inference facade and its backends.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Malformed or missing required input — a caller bug.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// Backend initialization failed.
    #[error("backend initialization failed: {0}")]
    Init(String),

    /// Weights file missing or corrupt, or the server has no model loaded.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// An inference step failed (tokenization, decode, sampler, transport).
    #[error("generation failed: {0}")]
    Generate(String),

    /// The grammar sampler could not be constructed from the grammar text.
    #[error("grammar rejected: {0}")]
    Grammar(String),

    /// The prompt alone exceeds the context capacity.
    #[error("prompt of ~{prompt_tokens} tokens exceeds context window of {context_window}")]
    ContextFull {
        prompt_tokens: usize,
        context_window: usize,
    },
}
