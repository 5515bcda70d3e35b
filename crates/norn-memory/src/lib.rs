// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `norn-memory` — the tiered persistent memory store.
//!
//! Three tiers over one SQLite file (or `:memory:` for tests):
//! - **core** blocks — always injected verbatim into the system prompt
//!   (persona, human, instructions, plus user-defined labels);
//! - **recall** log — the session transcript, append-mostly, FTS5-indexed;
//! - **archival** facts — long-term key/value store with importance and
//!   access counting, FTS5-indexed over key and value.
//!
//! The FTS indexes are external-content tables kept in sync by triggers, so
//! a row and its index entry always change in the same transaction.

pub mod error;
pub mod store;
pub mod tools;

pub use error::MemoryError;
pub use store::{ArchivalFact, MemoryStore, RecallRow, DEFAULT_SESSION_ID};
pub use tools::register_memory_tools;
