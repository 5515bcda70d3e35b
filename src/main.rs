// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::io::Write as _;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands, McpCommands};
use norn_config::Config;
use norn_core::{Agent, AgentEvent, AgentParams};
use norn_memory::{register_memory_tools, MemoryStore};
use norn_model::{InferenceBackend, LlamaServerBackend};
use norn_tools::{CapabilitySet, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = norn_config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { task, mcp_config, max_steps } => {
            run_task(&config, &task, mcp_config.as_deref(), max_steps).await
        }
        Commands::Chat { mcp_config } => chat(&config, mcp_config.as_deref()).await,
        Commands::Mcp { command } => match command {
            McpCommands::Serve { tools } => mcp_serve(&config, tools.as_deref()).await,
            McpCommands::List { mcp_config } => mcp_list(&mcp_config).await,
        },
    }
}

/// All logging goes to stderr — stdout belongs to answers (and, under
/// `mcp serve`, to protocol frames).
fn init_logging(verbose: bool) {
    let default = if verbose { "norn=debug,info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn InferenceBackend>> {
    let mut backend = LlamaServerBackend::new(
        &config.model.base_url,
        &config.model.name,
        config.model.context_window,
        config.model.params_b,
    )
    .context("backend construction failed")?;
    backend.probe_context_window().await;
    Ok(Arc::new(backend))
}

/// Registry + optional memory + optional MCP bridge, per config.
async fn build_registry(
    config: &Config,
    mcp_config: Option<&std::path::Path>,
) -> anyhow::Result<(Arc<ToolRegistry>, Option<Arc<MemoryStore>>, Option<Arc<norn_mcp::McpClient>>)>
{
    let caps = CapabilitySet::from_names(&config.tools.capabilities);
    let mut registry = ToolRegistry::new();
    registry
        .register_defaults(caps)
        .context("registering built-in tools")?;

    let memory = match &config.memory.path {
        Some(path) => {
            let store = Arc::new(MemoryStore::open(path).context("opening memory store")?);
            register_memory_tools(&mut registry, store.clone())
                .context("registering memory tools")?;
            Some(store)
        }
        None => None,
    };

    let mcp = match mcp_config {
        Some(path) => {
            let mut client = norn_mcp::McpClient::new();
            client.load_config(path).context("loading MCP config")?;
            let discovered = client.connect().await.context("connecting MCP servers")?;
            tracing::info!(tools = discovered, "MCP discovery complete");
            let client = Arc::new(client);
            client
                .register_tools(&mut registry)
                .context("bridging MCP tools")?;
            Some(client)
        }
        None => None,
    };

    Ok((Arc::new(registry), memory, mcp))
}

fn build_agent(
    config: &Config,
    backend: Arc<dyn InferenceBackend>,
    registry: Arc<ToolRegistry>,
    memory: Option<Arc<MemoryStore>>,
) -> Agent {
    let mut params = AgentParams::from_config(&config.agent);
    if let Some(t) = config.model.temperature {
        params.temperature = t;
    }
    if let Some(m) = config.model.max_tokens {
        params.max_tokens_per_step = m;
    }
    let mut agent = Agent::new(backend, registry, params);
    if let Some(store) = memory {
        agent.attach_memory(store, norn_memory::DEFAULT_SESSION_ID);
    }
    agent
}

/// Print step progress to stderr as events arrive.
fn spawn_event_printer(mut rx: mpsc::Receiver<AgentEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            match ev {
                AgentEvent::Step { index, action, observation, .. } => match observation {
                    None => eprintln!("[step {index}] -> {action}"),
                    Some(obs) => {
                        let obs = norn_core::compact::truncate_chars(&obs, 200);
                        eprintln!("[step {index}] {action}: {obs}");
                    }
                },
                AgentEvent::ContextCompacted { steps_compacted, .. } => {
                    eprintln!("[compacted {steps_compacted} earlier steps]");
                }
                AgentEvent::TurnComplete => break,
                _ => {}
            }
        }
    })
}

async fn run_task(
    config: &Config,
    task: &str,
    mcp_config: Option<&std::path::Path>,
    max_steps: Option<usize>,
) -> anyhow::Result<()> {
    let backend = build_backend(config).await?;
    let (registry, memory, mcp) = build_registry(config, mcp_config).await?;

    let mut config = config.clone();
    if let Some(n) = max_steps {
        config.agent.max_steps = n;
    }
    let mut agent = build_agent(&config, backend, registry, memory);

    let (tx, rx) = mpsc::channel(64);
    let printer = spawn_event_printer(rx);
    let outcome = agent.run(task, tx).await;
    let _ = printer.await;

    if let Some(client) = mcp {
        client.stop().await;
    }

    match outcome.text {
        Some(text) => {
            println!("{text}");
            Ok(())
        }
        None => anyhow::bail!(
            "run failed: {:?} after {} steps",
            outcome.status,
            outcome.steps_taken
        ),
    }
}

async fn chat(config: &Config, mcp_config: Option<&std::path::Path>) -> anyhow::Result<()> {
    let backend = build_backend(config).await?;
    let (registry, memory, mcp) = build_registry(config, mcp_config).await?;
    let mut agent = build_agent(config, backend, registry, memory);

    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/clear" {
            agent.clear_history();
            eprintln!("history cleared");
            continue;
        }
        if input == "/quit" {
            break;
        }

        let (tx, rx) = mpsc::channel(64);
        let printer = spawn_event_printer(rx);
        let outcome = agent.chat(input, tx).await;
        let _ = printer.await;
        if let Some(text) = outcome.text {
            println!("{text}");
        }
    }

    if let Some(client) = mcp {
        client.stop().await;
    }
    Ok(())
}

async fn mcp_serve(config: &Config, tools: Option<&str>) -> anyhow::Result<()> {
    let caps = CapabilitySet::from_names(&config.tools.capabilities);
    let mut registry = ToolRegistry::new();
    registry
        .register_defaults(caps)
        .context("registering built-in tools")?;

    // Optional subset filter: rebuild with only the named tools.
    let registry = match tools {
        Some(list) => {
            let wanted: Vec<&str> = list.split(',').map(str::trim).collect();
            let mut filtered = ToolRegistry::new();
            for tool in norn_tools::builtin::default_tools() {
                if wanted.contains(&tool.name()) && caps.contains(tool.required_capabilities()) {
                    filtered
                        .register_arc(tool)
                        .context("registering filtered tool")?;
                }
            }
            filtered
        }
        None => registry,
    };

    norn_mcp::serve_stdio(Arc::new(registry)).await
}

async fn mcp_list(mcp_config: &std::path::Path) -> anyhow::Result<()> {
    let mut client = norn_mcp::McpClient::new();
    client.load_config(mcp_config).context("loading MCP config")?;
    client.connect().await.context("connecting MCP servers")?;
    for tool in client.tools() {
        println!("{}\t{}", tool.name, tool.description);
    }
    client.stop().await;
    Ok(())
}
