// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "norn", about = "A local, offline, grammar-constrained AI agent runtime")]
pub struct Cli {
    /// Log to stderr (RUST_LOG overrides the level)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Explicit config file, merged over the discovered layers
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a single task to completion and print the answer
    Run {
        /// The task to solve
        task: String,

        /// MCP config file; its servers' tools join the registry
        #[arg(long)]
        mcp_config: Option<PathBuf>,

        /// Step budget override
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// Chat interactively on stdin/stdout
    Chat {
        /// MCP config file; its servers' tools join the registry
        #[arg(long)]
        mcp_config: Option<PathBuf>,
    },

    /// MCP peer operations
    Mcp {
        #[command(subcommand)]
        command: McpCommands,
    },
}

#[derive(Subcommand)]
pub enum McpCommands {
    /// Serve the built-in tools to an MCP host on stdio
    Serve {
        /// Comma-separated tool names to expose (default: all granted)
        #[arg(long)]
        tools: Option<String>,
    },

    /// Connect to the servers in an MCP config file and list their tools
    List {
        /// MCP config file
        #[arg(long)]
        mcp_config: PathBuf,
    },
}
