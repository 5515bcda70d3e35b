// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Input sanitation for built-in tools that place an argument anywhere near
//! a subprocess.  This is not sandboxing — the capability mask is the coarse
//! gate — but it guarantees that model-supplied text cannot smuggle shell
//! syntax into a spawned command, even if a tool is later refactored from
//! `arg()`-style spawning to an interpolated command line.

/// Characters that must never appear in an argument handed to a subprocess.
pub const SHELL_METACHARACTERS: &[char] =
    &['\'', '`', '$', '|', ';', '&', '\n', '\r', '\0'];

/// Reject `arg` when it contains a shell metacharacter.
///
/// The error names the offending character so the model can self-correct
/// from the observation.
pub fn check_shell_safe(arg: &str) -> Result<(), String> {
    for c in arg.chars() {
        if SHELL_METACHARACTERS.contains(&c) {
            return Err(format!(
                "argument contains disallowed character {:?}; shell metacharacters \
                 (' ` $ | ; & newline null) are rejected",
                c
            ));
        }
    }
    Ok(())
}

/// Validate a calculator expression: digits, arithmetic operators,
/// parentheses, whitespace, letters (function names), underscore, dot and
/// comma only.
pub fn check_math_expression(expr: &str) -> Result<(), String> {
    check_shell_safe(expr)?;
    for c in expr.chars() {
        let ok = c.is_ascii_alphanumeric()
            || c.is_ascii_whitespace()
            || matches!(c, '+' | '-' | '*' | '/' | '%' | '^' | '(' | ')' | '.' | ',' | '_');
        if !ok {
            return Err(format!(
                "expression contains disallowed character {c:?}; only digits, operators, \
                 parentheses, whitespace, letters and underscore are allowed"
            ));
        }
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
