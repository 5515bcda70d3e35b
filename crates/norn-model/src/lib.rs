// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `norn-model` — the seam between the agent loop and the token-level
//! inference backend.
//!
//! The backend (a llama.cpp-compatible server, or a mock in tests) owns
//! weights, tokenization, sampling and chat templating.  This crate owns the
//! *contract*: the [`InferenceBackend`] trait, the [`generate`] facade that
//! enforces parameter validation, context clamping and the token-callback
//! cancellation channel, and the static GBNF grammars that constrain every
//! completion to a single well-formed JSON object.

pub mod backend;
pub mod error;
pub mod facade;
pub mod grammar;
pub mod llama;
pub mod mock;
pub mod types;

pub use backend::{GenEvent, InferenceBackend, TokenStream};
pub use error::ModelError;
pub use facade::{generate, GenerationOutcome};
pub use llama::LlamaServerBackend;
pub use mock::{MockBackend, ScriptedBackend};
pub use types::{approx_tokens, ChatMessage, GenerationRequest, Role};
