// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{ChatMessage, GenerationRequest, ModelError};

/// One event from a streaming completion.
#[derive(Debug, Clone, PartialEq)]
pub enum GenEvent {
    /// One detokenized token's text.
    Token(String),
    /// Generation finished; carries the backend's authoritative token count.
    Done { n_tokens: u32 },
}

pub type TokenStream = Pin<Box<dyn Stream<Item = Result<GenEvent, ModelError>> + Send>>;

/// The inference backend contract.
///
/// One handle corresponds to one loaded model.  At most one generation may
/// be in flight per handle; concurrent callers must serialize.  Distinct
/// handles may run concurrently if the backend supports it.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend identifier for status display.
    fn name(&self) -> &str;

    /// Model identifier as reported to users.
    fn model_name(&self) -> &str;

    /// Context capacity (n_ctx) of the loaded model.
    fn context_window(&self) -> usize;

    /// Approximate parameter count of the loaded weights.  Drives prompt
    /// template selection in the agent core.
    fn param_count(&self) -> u64;

    /// Start a completion and return the token stream.  Dropping the stream
    /// aborts the generation.
    async fn complete(&self, req: GenerationRequest) -> Result<TokenStream, ModelError>;

    /// Apply the model's chat template to `messages` and return the
    /// formatted prompt, ready for [`complete`](Self::complete).
    ///
    /// Callers must treat an error as "template unavailable" and fall back
    /// to a plain-text layout; agent behavior must not depend on which path
    /// was taken.
    async fn apply_chat_template(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;
}
