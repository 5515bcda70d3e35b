// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Deterministic context compaction for the step history.
//!
//! No model call: a compacted range becomes a short bracketed summary that
//! names each tool used and the head of its observation.  The estimator is
//! the uniform ~3.5 chars/token heuristic from `norn-model` plus a fixed
//! per-message overhead for role tags; it governs *when* to compact, not
//! what the model sees.

use norn_model::ChatMessage;

use crate::agent::StepRecord;

/// Role-tag and framing overhead per message, in tokens.
pub const STEP_OVERHEAD_TOKENS: usize = 20;

/// Steps always kept verbatim at the tail of the window.
pub const KEEP_RECENT_STEPS: usize = 2;

/// Observation preview length inside a summary.
const OBSERVATION_PREVIEW_CHARS: usize = 80;

/// Estimated prompt size of an assembled message list.
pub fn estimate_messages(messages: &[ChatMessage]) -> usize {
    messages
        .iter()
        .map(|m| m.approx_tokens() + STEP_OVERHEAD_TOKENS)
        .sum()
}

/// Fold a step range into a summary string:
/// `[Earlier steps: Used shell -> …80 chars… Used calculate -> 120]`
pub fn summarize_steps(steps: &[StepRecord]) -> String {
    let parts: Vec<String> = steps
        .iter()
        .map(|s| {
            let tool = s.action.as_deref().unwrap_or("unknown");
            let obs = s.observation.as_deref().unwrap_or("");
            format!("Used {tool} -> {}", truncate_chars(obs, OBSERVATION_PREVIEW_CHARS))
        })
        .collect();
    format!("[Earlier steps: {}]", parts.join(" "))
}

/// Merge a pre-existing summary with a newly compacted range, keeping the
/// single bracketed form.
pub fn merge_summaries(prev: Option<&str>, new: &str) -> String {
    let Some(prev) = prev else {
        return new.to_string();
    };
    let head = prev.strip_suffix(']').unwrap_or(prev).trim_end();
    let tail = new
        .strip_prefix("[Earlier steps:")
        .and_then(|s| s.strip_suffix(']'))
        .map(str::trim)
        .unwrap_or(new);
    format!("{head} {tail}]")
}

/// Char-boundary-safe truncation with an ellipsis.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max).collect();
    format!("{truncated}…")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use norn_model::ChatMessage;

    use super::*;

    fn step(action: &str, obs: &str) -> StepRecord {
        StepRecord {
            raw_output: format!("{{\"thought\":\"t\",\"action\":\"{action}\",\"args\":{{}}}}"),
            action: Some(action.to_string()),
            observation: Some(obs.to_string()),
        }
    }

    #[test]
    fn estimate_counts_content_plus_overhead() {
        let msgs = vec![ChatMessage::user("x".repeat(35))]; // 10 tokens content
        assert_eq!(estimate_messages(&msgs), 10 + STEP_OVERHEAD_TOKENS);
    }

    #[test]
    fn estimate_of_empty_list_is_zero() {
        assert_eq!(estimate_messages(&[]), 0);
    }

    #[test]
    fn summary_names_tools_and_previews_observations() {
        let s = summarize_steps(&[step("shell", "file list here"), step("calculate", "120")]);
        assert!(s.starts_with("[Earlier steps:"));
        assert!(s.ends_with(']'));
        assert!(s.contains("Used shell -> file list here"));
        assert!(s.contains("Used calculate -> 120"));
    }

    #[test]
    fn long_observations_are_cut_to_preview_length() {
        let long = "y".repeat(500);
        let s = summarize_steps(&[step("http_get", &long)]);
        assert!(s.len() < 200);
        assert!(s.contains('…'));
    }

    #[test]
    fn merge_without_previous_is_identity() {
        let n = summarize_steps(&[step("a", "1")]);
        assert_eq!(merge_summaries(None, &n), n);
    }

    #[test]
    fn merge_folds_ranges_into_one_bracket() {
        let a = summarize_steps(&[step("first", "one")]);
        let b = summarize_steps(&[step("second", "two")]);
        let merged = merge_summaries(Some(&a), &b);
        assert_eq!(merged.matches("[Earlier steps:").count(), 1);
        assert!(merged.contains("Used first -> one"));
        assert!(merged.contains("Used second -> two"));
        assert!(merged.ends_with(']'));
    }

    #[test]
    fn truncate_respects_multibyte_boundaries() {
        let s = "åäö".repeat(50);
        let t = truncate_chars(&s, 10);
        assert_eq!(t.chars().count(), 11); // 10 + ellipsis
    }

    #[test]
    fn truncate_short_string_is_unchanged() {
        assert_eq!(truncate_chars("short", 80), "short");
    }
}
