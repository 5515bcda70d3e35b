// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Connection settings for the local inference server.
///
/// norn drives a llama.cpp-compatible server over its native `/completion`
/// endpoint; everything here describes that one local model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the llama.cpp server, without a trailing path.
    pub base_url: String,
    /// Model name, for display and logging only — the server decides what
    /// weights are loaded.
    pub name: String,
    /// Context window (n_ctx) to assume when the server's `/props` endpoint
    /// is unreachable.  The live probe overrides this value.
    pub context_window: usize,
    /// Parameter count in billions.  Selects between the terse prompt
    /// templates (≤ 4B) and the long-form ones (> 4B).
    pub params_b: f64,
    /// Sampling temperature override for one-shot runs.
    pub temperature: Option<f32>,
    /// Per-step generation budget override.
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".into(),
            name: "local".into(),
            context_window: 8192,
            params_b: 7.0,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum reasoning/tool steps per run.
    pub max_steps: usize,
    /// Generation budget per step, in tokens.
    pub max_tokens_per_step: u32,
    /// Sampling temperature for one-shot runs.
    pub temperature: f32,
    /// Sampling temperature for interactive chat turns.
    pub chat_temperature: f32,
    /// Prompt token budget.  0 = derive from the model context window
    /// (80% of it, floored at 1536).
    pub context_budget: usize,
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            max_tokens_per_step: 512,
            temperature: 0.3,
            chat_temperature: 0.7,
            context_budget: 0,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Capability names granted to the built-in tool set.  Recognised values:
    /// `filesystem`, `network`, `shell`, `memory`, `sensor`, `gpio`.
    /// Unknown names are ignored with a warning at registry build time.
    pub capabilities: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            capabilities: vec!["filesystem".into(), "network".into(), "shell".into()],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path of the persistent memory store.  `None` disables memory.
    pub path: Option<PathBuf>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let a = AgentConfig::default();
        assert_eq!(a.max_steps, 10);
        assert_eq!(a.max_tokens_per_step, 512);
        assert!((a.temperature - 0.3).abs() < 1e-6);
        assert!((a.chat_temperature - 0.7).abs() < 1e-6);
        assert_eq!(a.context_budget, 0);
    }

    #[test]
    fn model_defaults_point_at_localhost() {
        let m = ModelConfig::default();
        assert!(m.base_url.starts_with("http://127.0.0.1"));
        assert_eq!(m.context_window, 8192);
    }

    #[test]
    fn empty_yaml_deserializes_to_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg.agent.max_steps, 10);
        assert!(cfg.memory.path.is_none());
    }

    #[test]
    fn partial_yaml_overrides_only_named_fields() {
        let cfg: Config = serde_yaml::from_str("agent:\n  max_steps: 3\n").unwrap();
        assert_eq!(cfg.agent.max_steps, 3);
        assert_eq!(cfg.agent.max_tokens_per_step, 512);
    }

    #[test]
    fn default_capabilities_exclude_memory_and_gpio() {
        let t = ToolsConfig::default();
        assert!(t.capabilities.iter().any(|c| c == "shell"));
        assert!(!t.capabilities.iter().any(|c| c == "gpio"));
        assert!(!t.capabilities.iter().any(|c| c == "memory"));
    }
}
