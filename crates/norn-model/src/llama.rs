// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Backend driver for a llama.cpp-compatible server running on localhost.
//!
//! Uses the server's *native* endpoints rather than the OpenAI-compat layer,
//! because only the native `/completion` endpoint accepts a GBNF `grammar`
//! parameter — the core of norn's constrained decoding:
//!
//! - `POST /completion` — streaming generation (SSE `data:` frames)
//! - `POST /apply-template` — the model's own chat template
//! - `GET /props` — the actually-loaded `n_ctx`, which overrides whatever
//!   the config claimed

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    backend::{GenEvent, InferenceBackend, TokenStream},
    ChatMessage, GenerationRequest, ModelError,
};

pub struct LlamaServerBackend {
    base_url: String,
    model: String,
    context_window: usize,
    params: u64,
    client: reqwest::Client,
}

impl LlamaServerBackend {
    /// `params_b` is the parameter count in billions (e.g. `7.0`).
    pub fn new(
        base_url: impl Into<String>,
        model_name: impl Into<String>,
        context_window: usize,
        params_b: f64,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| ModelError::Init(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model_name.into(),
            context_window,
            params: (params_b * 1e9) as u64,
            client,
        })
    }

    /// Query `GET /props` for the loaded context size and adopt it.
    ///
    /// A missing or unparseable response leaves the configured value in
    /// place — the server may be an older build without `/props`.
    pub async fn probe_context_window(&mut self) {
        let url = format!("{}/props", self.base_url);
        let n_ctx = async {
            let v: Value = self.client.get(&url).send().await.ok()?.json().await.ok()?;
            v["default_generation_settings"]["n_ctx"].as_u64()
        }
        .await;
        match n_ctx {
            Some(n) if n > 0 => {
                debug!(n_ctx = n, "adopted context window from /props");
                self.context_window = n as usize;
            }
            _ => warn!(url, "context probe failed; keeping configured value"),
        }
    }

    fn request_body(&self, req: &GenerationRequest) -> Value {
        let mut body = json!({
            "prompt": req.prompt,
            "n_predict": req.max_tokens,
            "temperature": req.temperature,
            "top_k": req.top_k,
            "top_p": req.top_p,
            "repeat_penalty": req.repeat_penalty,
            "repeat_last_n": req.repeat_last_n,
            "stream": true,
            "cache_prompt": true,
        });
        if req.seed != 0 {
            body["seed"] = json!(req.seed);
        }
        if let Some(g) = req.grammar.as_deref().filter(|g| !g.is_empty()) {
            // The server always starts from the `root` rule; an explicit
            // grammar_root is expressed as an alias rule in front.
            let text = match req.grammar_root.as_deref() {
                Some(root) if !g.contains("root ::=") => format!("root ::= {root}\n{g}"),
                _ => g.to_string(),
            };
            body["grammar"] = json!(text);
        }
        body
    }
}

#[async_trait]
impl InferenceBackend for LlamaServerBackend {
    fn name(&self) -> &str {
        "llama-server"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.context_window
    }

    fn param_count(&self) -> u64 {
        self.params
    }

    async fn complete(&self, req: GenerationRequest) -> Result<TokenStream, ModelError> {
        let url = format!("{}/completion", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&self.request_body(&req))
            .send()
            .await
            .map_err(|e| ModelError::Generate(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 503 {
                ModelError::ModelLoad(format!("server has no model ready: {text}"))
            } else if text.contains("grammar") {
                ModelError::Grammar(text)
            } else {
                ModelError::Generate(format!("{status}: {text}"))
            });
        }

        // Fold the SSE byte stream into GenEvents.  Frames look like
        //   data: {"content":"tok","stop":false}
        // and the final frame carries stop=true plus tokens_predicted.
        let state = (resp.bytes_stream(), String::new(), VecDeque::new(), false);
        let stream = futures::stream::unfold(
            state,
            |(mut inner, mut buf, mut pending, mut done)| async move {
                loop {
                    if let Some(ev) = pending.pop_front() {
                        return Some((Ok(ev), (inner, buf, pending, done)));
                    }
                    if done {
                        return None;
                    }
                    match inner.next().await {
                        None => return None,
                        Some(Err(e)) => {
                            done = true;
                            return Some((
                                Err(ModelError::Generate(format!("stream read: {e}"))),
                                (inner, buf, pending, done),
                            ));
                        }
                        Some(Ok(chunk)) => {
                            buf.push_str(&String::from_utf8_lossy(&chunk));
                            while let Some(pos) = buf.find('\n') {
                                let line: String = buf.drain(..=pos).collect();
                                let line = line.trim();
                                let Some(data) = line.strip_prefix("data: ") else {
                                    continue;
                                };
                                let Ok(v) = serde_json::from_str::<Value>(data) else {
                                    warn!("unparseable SSE frame: {data}");
                                    continue;
                                };
                                if let Some(tok) = v["content"].as_str() {
                                    if !tok.is_empty() {
                                        pending.push_back(GenEvent::Token(tok.to_string()));
                                    }
                                }
                                if v["stop"].as_bool() == Some(true) {
                                    let n = v["tokens_predicted"].as_u64().unwrap_or(0) as u32;
                                    pending.push_back(GenEvent::Done { n_tokens: n });
                                    done = true;
                                }
                            }
                        }
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }

    async fn apply_chat_template(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        let url = format!("{}/apply-template", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&json!({ "messages": messages }))
            .send()
            .await
            .map_err(|e| ModelError::Generate(format!("POST {url}: {e}")))?;
        if !resp.status().is_success() {
            return Err(ModelError::Generate(format!(
                "apply-template: {}",
                resp.status()
            )));
        }
        let v: Value = resp
            .json()
            .await
            .map_err(|e| ModelError::Generate(e.to_string()))?;
        v["prompt"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ModelError::Generate("apply-template: no prompt in response".into()))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> LlamaServerBackend {
        LlamaServerBackend::new("http://127.0.0.1:9999/", "test-model", 4096, 3.0).unwrap()
    }

    #[test]
    fn trailing_slash_is_stripped_from_base_url() {
        let b = backend();
        assert_eq!(b.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn params_b_converts_to_absolute_count() {
        let b = backend();
        assert_eq!(b.param_count(), 3_000_000_000);
    }

    #[test]
    fn body_includes_sampler_parameters() {
        let b = backend();
        let req = GenerationRequest { max_tokens: 99, top_k: 7, ..Default::default() };
        let body = b.request_body(&req);
        assert_eq!(body["n_predict"], 99);
        assert_eq!(body["top_k"], 7);
        assert_eq!(body["stream"], true);
        assert!(body.get("grammar").is_none());
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn body_carries_grammar_text() {
        let b = backend();
        let req = GenerationRequest {
            grammar: Some("root ::= \"x\"".into()),
            ..Default::default()
        };
        let body = b.request_body(&req);
        assert_eq!(body["grammar"], "root ::= \"x\"");
    }

    #[test]
    fn grammar_root_prepends_alias_when_absent() {
        let b = backend();
        let req = GenerationRequest {
            grammar: Some("answer ::= \"y\"".into()),
            grammar_root: Some("answer".into()),
            ..Default::default()
        };
        let body = b.request_body(&req);
        let g = body["grammar"].as_str().unwrap();
        assert!(g.starts_with("root ::= answer\n"));
    }

    #[test]
    fn empty_grammar_is_omitted() {
        let b = backend();
        let req = GenerationRequest { grammar: Some(String::new()), ..Default::default() };
        assert!(b.request_body(&req).get("grammar").is_none());
    }

    #[test]
    fn nonzero_seed_is_forwarded() {
        let b = backend();
        let req = GenerationRequest { seed: 42, ..Default::default() };
        assert_eq!(b.request_body(&req)["seed"], 42);
    }
}
