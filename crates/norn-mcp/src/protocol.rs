// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! JSON-RPC 2.0 frame construction and the MCP protocol constants.
//!
//! Every frame is a single JSON object on one line.  Frames are built with
//! `serde_json` values rather than typed structs — the protocol surface is
//! small and half the fields are pass-through.

use serde_json::{json, Value};

/// MCP protocol revision announced in the initialize handshake.
pub const PROTOCOL_VERSION: &str = "2025-11-25";

/// Upper bound on a single frame, both directions.
pub const MAX_FRAME_BYTES: usize = 256 * 1024;

/// Per-request deadline on reads.
pub const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

// JSON-RPC error codes used by the MCP surface.
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const NOT_INITIALIZED: i64 = -32002;

pub fn request(id: u64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

pub fn notification(method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "method": method, "params": params })
}

pub fn response_ok(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

pub fn response_err(id: Value, code: i64, message: &str) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message } })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
