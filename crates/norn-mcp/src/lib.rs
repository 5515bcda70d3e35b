// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `norn-mcp` — MCP (Model Context Protocol) peer over stdio.
//!
//! Both directions of the protocol, as line-delimited JSON-RPC 2.0:
//!
//! - **Outbound**: [`McpClient`] spawns external MCP servers as child
//!   processes, performs the initialize handshake, discovers their tools and
//!   bridges them into a local [`norn_tools::ToolRegistry`].
//! - **Inbound**: [`serve_stdio`] exposes a local registry to any MCP host
//!   (Cursor, Claude Desktop, another norn) on stdin/stdout, logging only to
//!   stderr.
//!
//! ```text
//! agent loop ──► ToolRegistry ──► McpProxyTool ──► McpClient ──► child stdio
//! MCP host  ──► stdin/stdout  ──► serve_stdio ──► ToolRegistry ──► Tool
//! ```

pub mod bridge;
pub mod client;
pub mod config;
pub mod protocol;
pub mod server;

pub use client::{DiscoveredTool, McpClient, McpError, ServerConfig};
pub use config::load_mcp_config;
pub use protocol::PROTOCOL_VERSION;
pub use server::serve_stdio;
