// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;

use crate::{
    backend::{GenEvent, InferenceBackend, TokenStream},
    ChatMessage, GenerationRequest, ModelError,
};

/// Split `text` into word-ish chunks so streaming consumers see more than
/// one token event.
fn tokenize(text: &str) -> Vec<String> {
    if text.is_empty() {
        return vec![];
    }
    text.split_inclusive(' ').map(str::to_string).collect()
}

fn scripted_stream(text: String) -> TokenStream {
    let chunks = tokenize(&text);
    let n = chunks.len() as u32;
    let mut events: Vec<Result<GenEvent, ModelError>> =
        chunks.into_iter().map(|c| Ok(GenEvent::Token(c))).collect();
    events.push(Ok(GenEvent::Done { n_tokens: n }));
    Box::pin(stream::iter(events))
}

/// Deterministic mock backend — echoes the tail of the prompt.
#[derive(Default)]
pub struct MockBackend;

#[async_trait]
impl InferenceBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }
    fn model_name(&self) -> &str {
        "mock-model"
    }
    fn context_window(&self) -> usize {
        8192
    }
    fn param_count(&self) -> u64 {
        3_000_000_000
    }

    async fn complete(&self, req: GenerationRequest) -> Result<TokenStream, ModelError> {
        let chars: Vec<char> = req.prompt.chars().rev().take(64).collect();
        let tail: String = chars.into_iter().rev().collect();
        Ok(scripted_stream(format!("MOCK: {tail}")))
    }

    async fn apply_chat_template(&self, _messages: &[ChatMessage]) -> Result<String, ModelError> {
        Err(ModelError::Generate("mock has no chat template".into()))
    }
}

/// A pre-scripted backend.  Each `complete` call pops the next canned
/// completion from the front of the queue; when the queue runs dry the
/// fallback text is returned.  The last request is recorded so tests can
/// inspect exactly what was sent.
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<String>>,
    fallback: String,
    last_request: Mutex<Option<GenerationRequest>>,
    requests_seen: Mutex<u32>,
    context_window: usize,
    params: u64,
    chat_template: bool,
}

impl ScriptedBackend {
    pub fn new(scripts: Vec<impl Into<String>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().map(Into::into).collect()),
            fallback: "[no more scripts]".into(),
            last_request: Mutex::new(None),
            requests_seen: Mutex::new(0),
            context_window: 8192,
            params: 3_000_000_000,
            chat_template: false,
        }
    }

    /// Backend that returns `text` for every call.
    pub fn always(text: impl Into<String>) -> Self {
        let t = text.into();
        let mut b = Self::new(Vec::<String>::new());
        b.fallback = t;
        b
    }

    pub fn with_context_window(mut self, n: usize) -> Self {
        self.context_window = n;
        self
    }

    pub fn with_params(mut self, n: u64) -> Self {
        self.params = n;
        self
    }

    /// Pretend the model ships a chat template (default: it does not, so
    /// consumers exercise the plain-text prompt fallback).
    pub fn with_chat_template(mut self) -> Self {
        self.chat_template = true;
        self
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().unwrap().clone()
    }

    pub fn requests_seen(&self) -> u32 {
        *self.requests_seen.lock().unwrap()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted-mock"
    }
    fn model_name(&self) -> &str {
        "scripted-mock-model"
    }
    fn context_window(&self) -> usize {
        self.context_window
    }
    fn param_count(&self) -> u64 {
        self.params
    }

    async fn complete(&self, req: GenerationRequest) -> Result<TokenStream, ModelError> {
        *self.last_request.lock().unwrap() = Some(req);
        *self.requests_seen.lock().unwrap() += 1;
        let text = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        Ok(scripted_stream(text))
    }

    async fn apply_chat_template(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        if !self.chat_template {
            return Err(ModelError::Generate("scripted mock: template disabled".into()));
        }
        let mut out = String::new();
        for m in messages {
            out.push_str(&format!("<|{:?}|>{}\n", m.role, m.content));
        }
        out.push_str("<|Assistant|>");
        Ok(out)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;

    async fn drain(mut s: TokenStream) -> (String, u32) {
        let mut text = String::new();
        let mut n = 0;
        while let Some(ev) = s.next().await {
            match ev.unwrap() {
                GenEvent::Token(t) => text.push_str(&t),
                GenEvent::Done { n_tokens } => n = n_tokens,
            }
        }
        (text, n)
    }

    #[tokio::test]
    async fn mock_echoes_prompt_tail() {
        let b = MockBackend;
        let req = GenerationRequest { prompt: "what is up".into(), ..Default::default() };
        let (text, _) = drain(b.complete(req).await.unwrap()).await;
        assert!(text.contains("MOCK:"));
        assert!(text.contains("what is up"));
    }

    #[tokio::test]
    async fn scripted_pops_in_order_then_falls_back() {
        let b = ScriptedBackend::new(vec!["first", "second"]);
        let (t1, _) = drain(b.complete(GenerationRequest::default()).await.unwrap()).await;
        let (t2, _) = drain(b.complete(GenerationRequest::default()).await.unwrap()).await;
        let (t3, _) = drain(b.complete(GenerationRequest::default()).await.unwrap()).await;
        assert_eq!(t1, "first");
        assert_eq!(t2, "second");
        assert_eq!(t3, "[no more scripts]");
    }

    #[tokio::test]
    async fn scripted_records_last_request() {
        let b = ScriptedBackend::always("ok");
        assert!(b.last_request().is_none());
        let req = GenerationRequest { prompt: "probe".into(), ..Default::default() };
        let _ = b.complete(req).await.unwrap();
        assert_eq!(b.last_request().unwrap().prompt, "probe");
        assert_eq!(b.requests_seen(), 1);
    }

    #[tokio::test]
    async fn stream_ends_with_done_carrying_token_count() {
        let b = ScriptedBackend::always("a b c");
        let (text, n) = drain(b.complete(GenerationRequest::default()).await.unwrap()).await;
        assert_eq!(text, "a b c");
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn template_disabled_by_default() {
        let b = ScriptedBackend::always("x");
        assert!(b.apply_chat_template(&[ChatMessage::user("hi")]).await.is_err());
        let b2 = ScriptedBackend::always("x").with_chat_template();
        let p = b2.apply_chat_template(&[ChatMessage::user("hi")]).await.unwrap();
        assert!(p.ends_with("<|Assistant|>"));
    }
}
