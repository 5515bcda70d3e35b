// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! End-to-end scenarios across the crate seams: agent loop + registry +
//! memory + MCP bridge, with a scripted backend standing in for the
//! inference server.

use std::sync::Arc;

use tokio::sync::mpsc;

use norn_core::{Agent, AgentEvent, AgentParams, RunStatus};
use norn_memory::{register_memory_tools, MemoryStore};
use norn_model::ScriptedBackend;
use norn_tools::{CalculateTool, ToolCall, ToolRegistry};

async fn collect_events(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        let done = matches!(ev, AgentEvent::TurnComplete);
        events.push(ev);
        if done {
            break;
        }
    }
    events
}

// ── Scenario: pure arithmetic tool ───────────────────────────────────────────

#[tokio::test]
async fn arithmetic_task_routes_through_calculate() {
    let mut reg = ToolRegistry::new();
    reg.register(CalculateTool).unwrap();

    let backend = Arc::new(ScriptedBackend::new(vec![
        r#"{"thought":"multiply the sum","action":"calculate","args":{"expression":"12*(7+3)"}}"#,
        r#"{"thought":"the tool returned the product","answer":"12 * (7 + 3) = 120"}"#,
    ]));
    let mut agent = Agent::new(backend, Arc::new(reg), AgentParams::default());

    let (tx, rx) = mpsc::channel(64);
    let outcome = agent.run("What is 12 * (7 + 3)?", tx).await;
    let events = collect_events(rx).await;

    assert_eq!(outcome.status, RunStatus::Ok);
    assert!(outcome.text.unwrap().contains("120"));

    let observed_120 = events.iter().any(|e| matches!(
        e,
        AgentEvent::Step { action, observation: Some(obs), .. }
            if action == "calculate" && obs.trim() == "120"
    ));
    assert!(observed_120, "calculate observation should be 120: {events:?}");
}

// ── Scenario: sanitization rejection ─────────────────────────────────────────

#[tokio::test]
async fn injection_attempt_is_rejected_before_any_subprocess() {
    let mut reg = ToolRegistry::new();
    reg.register(CalculateTool).unwrap();

    let call = ToolCall {
        id: "direct".into(),
        name: "calculate".into(),
        args: serde_json::json!({"expression": "1; rm -rf /"}),
    };
    let out = reg.execute(&call).await;
    assert!(out.is_error);
    assert!(out.content.contains("disallowed"), "{}", out.content);
}

// ── Scenario: MCP tool discovery and routing ─────────────────────────────────

fn fake_mcp_server() -> norn_mcp::ServerConfig {
    let script = r#"
while IFS= read -r line; do
  case "$line" in
    *'"method":"initialize"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-11-25","serverInfo":{"name":"fake","version":"1.0"},"capabilities":{"tools":{"listChanged":false}}}}' ;;
    *'"method":"tools/list"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo","description":"echoes input","inputSchema":{"type":"object"}},{"name":"add","description":"adds numbers","inputSchema":{"type":"object"}}]}}' ;;
    *'"method":"tools/call"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"remote says: hello"}],"isError":false}}' ;;
  esac
done
"#;
    norn_mcp::ServerConfig {
        name: "fake".into(),
        command: "sh".into(),
        args: vec!["-c".into(), script.into()],
        env: vec![],
    }
}

#[tokio::test]
async fn discovered_mcp_tools_serve_an_agent_run() {
    let mut client = norn_mcp::McpClient::new();
    client.add_server(fake_mcp_server()).unwrap();
    let discovered = client.connect().await.unwrap();
    assert_eq!(discovered, 2);
    assert_eq!(client.tool_count(), 2);
    let client = Arc::new(client);

    let mut reg = ToolRegistry::new();
    let bridged = client.register_tools(&mut reg).unwrap();
    assert_eq!(bridged, 2);

    let backend = Arc::new(ScriptedBackend::new(vec![
        r#"{"thought":"ask the remote echo","action":"echo","args":{"text":"hello"}}"#,
        r#"{"thought":"got it","answer":"remote says: hello"}"#,
    ]));
    let mut agent = Agent::new(backend, Arc::new(reg), AgentParams::default());

    let (tx, rx) = mpsc::channel(64);
    let outcome = agent.run("echo hello through the remote server", tx).await;
    let events = collect_events(rx).await;

    assert_eq!(outcome.status, RunStatus::Ok);
    let via_remote = events.iter().any(|e| matches!(
        e,
        AgentEvent::Step { action, observation: Some(obs), .. }
            if action == "echo" && obs == "remote says: hello"
    ));
    assert!(via_remote, "remote result should come back as observation: {events:?}");
    client.stop().await;
}

// ── Scenario: model-driven memory tools ──────────────────────────────────────

#[tokio::test]
async fn agent_stores_facts_through_memory_tools() {
    let store = Arc::new(MemoryStore::open_in_memory().unwrap());
    let mut reg = ToolRegistry::new();
    register_memory_tools(&mut reg, store.clone()).unwrap();

    let backend = Arc::new(ScriptedBackend::new(vec![
        r#"{"thought":"worth remembering","action":"memory_store","args":{"key":"favorite_color","value":"teal","category":"personal"}}"#,
        r#"{"thought":"stored","answer":"Noted: your favorite color is teal."}"#,
    ]));
    let mut agent = Agent::new(backend, Arc::new(reg), AgentParams::default());
    agent.attach_memory(store.clone(), norn_memory::DEFAULT_SESSION_ID);

    let (tx, rx) = mpsc::channel(64);
    let outcome = agent.run("remember that my favorite color is teal", tx).await;
    collect_events(rx).await;

    assert_eq!(outcome.status, RunStatus::Ok);
    // The fact landed in archival memory and is searchable.
    let hits = store.archival_search("teal", 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].key, "favorite_color");
    // The run transcript landed in recall.
    let (messages, _tokens) = store.recall_stats(norn_memory::DEFAULT_SESSION_ID).unwrap();
    assert!(messages >= 2, "user input and answer should be in recall");
}

// ── Scenario: max-steps exhaustion in both modes ─────────────────────────────

#[tokio::test]
async fn exhaustion_is_max_steps_in_both_modes() {
    let loop_forever =
        r#"{"thought":"one more","action":"calculate","args":{"expression":"1+1"}}"#;

    let mut reg = ToolRegistry::new();
    reg.register(CalculateTool).unwrap();
    let reg = Arc::new(reg);

    let backend = Arc::new(ScriptedBackend::always(loop_forever));
    let params = AgentParams { max_steps: 2, ..Default::default() };

    let mut one_shot = Agent::new(backend.clone(), reg.clone(), params.clone());
    let (tx, rx) = mpsc::channel(64);
    let outcome = one_shot.run("never finishes", tx).await;
    collect_events(rx).await;
    assert_eq!(outcome.status, RunStatus::MaxSteps);
    assert_eq!(outcome.steps_taken, 2);
    assert!(outcome.text.is_none());

    let backend = Arc::new(ScriptedBackend::always(loop_forever));
    let mut chat = Agent::new(backend, reg, params);
    let (tx, rx) = mpsc::channel(64);
    let outcome = chat.chat("never finishes", tx).await;
    collect_events(rx).await;
    assert_eq!(outcome.status, RunStatus::MaxSteps);
    assert!(outcome.text.is_some(), "chat always produces text");
    assert_eq!(chat.history().len(), 2);
}
