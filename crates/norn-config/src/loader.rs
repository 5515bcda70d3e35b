// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use crate::Config;

/// Ordered list of config file locations searched from lowest to highest
/// priority.  Later files override earlier ones.
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("/etc/norn/config.yaml"));
    paths.push(PathBuf::from("/etc/norn/config.yml"));

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/norn/config.yaml"));
        paths.push(home.join(".config/norn/config.yml"));
    }

    paths.push(PathBuf::from(".norn.yaml"));
    paths.push(PathBuf::from(".norn.yml"));
    paths.push(PathBuf::from("norn.yaml"));

    paths
}

/// Load configuration by merging all discovered YAML files.
/// The `extra` argument may provide an explicit path (e.g. `--config` CLI flag).
pub fn load(extra: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());

    for path in config_search_paths() {
        if path.is_file() {
            debug!(path = %path.display(), "loading config layer");
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: serde_yaml::Value = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            merge_yaml(&mut merged, layer);
        }
    }

    if let Some(p) = extra {
        debug!(path = %p.display(), "loading explicit config");
        let text =
            std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
        let layer: serde_yaml::Value =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", p.display()))?;
        merge_yaml(&mut merged, layer);
    }

    let config: Config = if matches!(merged, serde_yaml::Value::Mapping(ref m) if m.is_empty()) {
        Config::default()
    } else {
        serde_yaml::from_value(merged).unwrap_or_default()
    };
    Ok(config)
}

/// Deep-merge `src` into `dst`; src wins on scalar conflicts.
fn merge_yaml(dst: &mut serde_yaml::Value, src: serde_yaml::Value) {
    match (dst, src) {
        (serde_yaml::Value::Mapping(d), serde_yaml::Value::Mapping(s)) => {
            for (k, v) in s {
                let entry = d
                    .entry(k)
                    .or_insert(serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
                merge_yaml(entry, v);
            }
        }
        (dst, src) => *dst = src,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn val(s: &str) -> serde_yaml::Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn merge_scalar_overrides() {
        let mut dst = val("agent:\n  max_steps: 10\n");
        merge_yaml(&mut dst, val("agent:\n  max_steps: 4\n"));
        let cfg: Config = serde_yaml::from_value(dst).unwrap();
        assert_eq!(cfg.agent.max_steps, 4);
    }

    #[test]
    fn merge_preserves_unrelated_keys() {
        let mut dst = val("model:\n  name: base\n  context_window: 4096\n");
        merge_yaml(&mut dst, val("model:\n  name: other\n"));
        let cfg: Config = serde_yaml::from_value(dst).unwrap();
        assert_eq!(cfg.model.name, "other");
        assert_eq!(cfg.model.context_window, 4096);
    }

    #[test]
    fn explicit_path_wins_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.yaml");
        std::fs::write(&path, "agent:\n  max_steps: 2\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert_eq!(cfg.agent.max_steps, 2);
    }

    #[test]
    fn load_without_any_file_yields_defaults() {
        // Search paths may exist on a developer machine; only assert the
        // explicit-path behaviour with a file that sets nothing.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        std::fs::write(&path, "{}\n").unwrap();
        let cfg = load(Some(&path)).unwrap();
        assert!(cfg.agent.max_steps >= 1);
    }
}
