// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Instant;

use futures::StreamExt;
use tracing::debug;

use crate::{approx_tokens, GenEvent, GenerationRequest, InferenceBackend, ModelError};

/// The completed result of one [`generate`] call.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub text: String,
    pub n_tokens: u32,
    pub elapsed_ms: u64,
    pub tokens_per_sec: f32,
}

/// Run one completion to the end.
///
/// Validates parameters, fails with [`ModelError::ContextFull`] when the
/// prompt alone exceeds the context window, and silently clamps
/// `max_tokens` when prompt + budget would overflow it.
///
/// `on_token` is invoked synchronously for each token's detokenized text;
/// returning `false` halts generation cleanly (the partial text is still
/// returned).  This callback is the only in-band cancellation channel.
pub async fn generate(
    backend: &dyn InferenceBackend,
    mut req: GenerationRequest,
    mut on_token: Option<&mut (dyn FnMut(&str) -> bool + Send)>,
) -> Result<GenerationOutcome, ModelError> {
    if req.temperature < 0.0 {
        return Err(ModelError::InvalidParam("temperature must be >= 0".into()));
    }
    if req.max_tokens == 0 {
        return Err(ModelError::InvalidParam("max_tokens must be >= 1".into()));
    }
    if !(0.0..=1.0).contains(&req.top_p) {
        return Err(ModelError::InvalidParam("top_p must be in (0, 1]".into()));
    }

    let context_window = backend.context_window();
    let prompt_tokens = approx_tokens(&req.prompt);
    if prompt_tokens >= context_window {
        return Err(ModelError::ContextFull { prompt_tokens, context_window });
    }
    let available = (context_window - prompt_tokens) as u32;
    if req.max_tokens > available {
        debug!(
            requested = req.max_tokens,
            clamped = available,
            "clamping max_tokens to remaining context"
        );
        req.max_tokens = available;
    }

    let started = Instant::now();
    let mut stream = backend.complete(req).await?;

    let mut text = String::new();
    let mut seen: u32 = 0;
    let mut n_tokens: u32 = 0;
    let mut halted = false;
    while let Some(event) = stream.next().await {
        match event? {
            GenEvent::Token(tok) => {
                seen += 1;
                text.push_str(&tok);
                if let Some(cb) = on_token.as_mut() {
                    if !cb(&tok) {
                        halted = true;
                        break;
                    }
                }
            }
            GenEvent::Done { n_tokens: n } => {
                n_tokens = n;
                break;
            }
        }
    }
    // Dropping the stream after a callback halt aborts the generation.
    drop(stream);
    if halted || n_tokens == 0 {
        n_tokens = seen;
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let tokens_per_sec = if elapsed_ms > 0 {
        n_tokens as f32 * 1000.0 / elapsed_ms as f32
    } else {
        0.0
    };

    Ok(GenerationOutcome { text, n_tokens, elapsed_ms, tokens_per_sec })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedBackend;

    #[test]
    fn outcome_is_cloneable() {
        let o = GenerationOutcome {
            text: "t".into(),
            n_tokens: 1,
            elapsed_ms: 0,
            tokens_per_sec: 0.0,
        };
        let _ = o.clone();
    }

    #[tokio::test]
    async fn negative_temperature_is_invalid_param() {
        let b = ScriptedBackend::always("x");
        let req = GenerationRequest { temperature: -0.1, ..Default::default() };
        let err = generate(&b, req, None).await.unwrap_err();
        assert!(matches!(err, ModelError::InvalidParam(_)));
    }

    #[tokio::test]
    async fn zero_max_tokens_is_invalid_param() {
        let b = ScriptedBackend::always("x");
        let req = GenerationRequest { max_tokens: 0, ..Default::default() };
        let err = generate(&b, req, None).await.unwrap_err();
        assert!(matches!(err, ModelError::InvalidParam(_)));
    }

    #[tokio::test]
    async fn oversized_prompt_is_context_full() {
        let b = ScriptedBackend::always("x").with_context_window(64);
        let req = GenerationRequest {
            prompt: "p".repeat(1024),
            ..Default::default()
        };
        let err = generate(&b, req, None).await.unwrap_err();
        assert!(matches!(err, ModelError::ContextFull { .. }));
    }

    #[tokio::test]
    async fn max_tokens_is_clamped_when_budget_overflows() {
        let b = ScriptedBackend::always("ok").with_context_window(100);
        // ~28 prompt tokens leaves 72; request 512 and expect a clamp.
        let req = GenerationRequest {
            prompt: "p".repeat(100),
            max_tokens: 512,
            ..Default::default()
        };
        generate(&b, req, None).await.unwrap();
        let seen = b.last_request().unwrap();
        assert!(seen.max_tokens <= 100, "clamped to window: {}", seen.max_tokens);
        assert!(seen.max_tokens >= 1);
    }

    #[tokio::test]
    async fn collects_full_text_and_counts_tokens() {
        let b = ScriptedBackend::always("hello world from norn");
        let out = generate(&b, GenerationRequest::default(), None).await.unwrap();
        assert_eq!(out.text, "hello world from norn");
        assert!(out.n_tokens > 0);
    }

    #[tokio::test]
    async fn callback_false_halts_generation() {
        let b = ScriptedBackend::always("one two three four five six");
        let mut count = 0usize;
        let mut cb = |_t: &str| {
            count += 1;
            count < 2
        };
        let out = generate(&b, GenerationRequest::default(), Some(&mut cb))
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert!(out.text.len() < "one two three four five six".len());
    }
}
