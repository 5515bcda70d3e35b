// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::sanitize::check_math_expression;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Arithmetic via `bc -l`, with an in-process evaluator as fallback when
/// `bc` is not installed.  The expression is validated before anything is
/// spawned and is delivered on stdin, never on a command line.
pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression, e.g. \"12*(7+3)\". Supports \
         + - * / % ^ and parentheses; bc functions like sqrt() when bc is \
         installed."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The arithmetic expression to evaluate"
                }
            },
            "required": ["expression"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let expression = match call.args.get("expression").and_then(|v| v.as_str()) {
            Some(e) => e.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'expression'"),
        };
        if let Err(e) = check_math_expression(&expression) {
            return ToolOutput::err(&call.id, e);
        }

        debug!(expr = %expression, "calculate tool");

        match bc(&expression).await {
            Ok(result) => ToolOutput::ok(&call.id, result),
            Err(BcError::Unavailable(e)) => {
                warn!("bc unavailable ({e}); using builtin evaluator");
                match eval(&expression) {
                    Ok(v) => ToolOutput::ok(&call.id, format_number(v)),
                    Err(e) => ToolOutput::err(&call.id, e),
                }
            }
            Err(BcError::Failed(msg)) => ToolOutput::err(&call.id, msg),
        }
    }
}

enum BcError {
    /// bc is not installed or could not be spawned.
    Unavailable(String),
    /// bc ran and rejected the expression.
    Failed(String),
}

async fn bc(expression: &str) -> Result<String, BcError> {
    let mut child = Command::new("bc")
        .arg("-l")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| BcError::Unavailable(e.to_string()))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(format!("{expression}\n").as_bytes())
            .await
            .map_err(|e| BcError::Failed(format!("write error: {e}")))?;
    }

    let output = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait_with_output())
        .await
        .map_err(|_| BcError::Failed("calculation timed out".into()))?
        .map_err(|e| BcError::Failed(format!("bc failed: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stderr.trim().is_empty() {
        return Err(BcError::Failed(format!("bc error: {}", stderr.trim())));
    }
    let result = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if result.is_empty() {
        return Err(BcError::Failed("bc produced no output".into()));
    }
    Ok(result)
}

fn format_number(v: f64) -> String {
    if v.fract().abs() < 1e-9 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

// ── Builtin evaluator ─────────────────────────────────────────────────────────
// Recursive descent over + - * / % ^ and parentheses.  No functions — those
// need bc.

fn eval(expr: &str) -> Result<f64, String> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pos = 0;
    let v = parse_sum(&tokens, &mut pos)?;
    if pos != tokens.len() {
        return Err(format!("unexpected input at position {pos}"));
    }
    Ok(v)
}

fn parse_sum(t: &[char], pos: &mut usize) -> Result<f64, String> {
    let mut acc = parse_product(t, pos)?;
    while let Some(&op) = t.get(*pos) {
        match op {
            '+' => {
                *pos += 1;
                acc += parse_product(t, pos)?;
            }
            '-' => {
                *pos += 1;
                acc -= parse_product(t, pos)?;
            }
            _ => break,
        }
    }
    Ok(acc)
}

fn parse_product(t: &[char], pos: &mut usize) -> Result<f64, String> {
    let mut acc = parse_power(t, pos)?;
    while let Some(&op) = t.get(*pos) {
        match op {
            '*' => {
                *pos += 1;
                acc *= parse_power(t, pos)?;
            }
            '/' => {
                *pos += 1;
                let rhs = parse_power(t, pos)?;
                if rhs == 0.0 {
                    return Err("division by zero".into());
                }
                acc /= rhs;
            }
            '%' => {
                *pos += 1;
                let rhs = parse_power(t, pos)?;
                if rhs == 0.0 {
                    return Err("modulo by zero".into());
                }
                acc %= rhs;
            }
            _ => break,
        }
    }
    Ok(acc)
}

fn parse_power(t: &[char], pos: &mut usize) -> Result<f64, String> {
    let base = parse_atom(t, pos)?;
    if t.get(*pos) == Some(&'^') {
        *pos += 1;
        // Right-associative.
        let exp = parse_power(t, pos)?;
        return Ok(base.powf(exp));
    }
    Ok(base)
}

fn parse_atom(t: &[char], pos: &mut usize) -> Result<f64, String> {
    match t.get(*pos) {
        Some('-') => {
            *pos += 1;
            Ok(-parse_atom(t, pos)?)
        }
        Some('(') => {
            *pos += 1;
            let v = parse_sum(t, pos)?;
            if t.get(*pos) != Some(&')') {
                return Err("unbalanced parentheses".into());
            }
            *pos += 1;
            Ok(v)
        }
        Some(c) if c.is_ascii_digit() || *c == '.' => {
            let start = *pos;
            while matches!(t.get(*pos), Some(c) if c.is_ascii_digit() || *c == '.') {
                *pos += 1;
            }
            let s: String = t[start..*pos].iter().collect();
            s.parse().map_err(|_| format!("bad number {s:?}"))
        }
        Some(c) if c.is_ascii_alphabetic() || *c == '_' => {
            Err("function calls require bc to be installed".into())
        }
        _ => Err("expected a number or parenthesized expression".into()),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall { id: "c".into(), name: "calculate".into(), args }
    }

    #[tokio::test]
    async fn evaluates_arithmetic() {
        let out = CalculateTool
            .execute(&call(json!({"expression": "12*(7+3)"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert_eq!(out.content, "120");
    }

    #[tokio::test]
    async fn division_produces_fraction() {
        let out = CalculateTool
            .execute(&call(json!({"expression": "1/4"})))
            .await;
        assert!(!out.is_error, "{}", out.content);
        assert!(
            out.content.starts_with(".25") || out.content.starts_with("0.25"),
            "{}",
            out.content
        );
    }

    #[tokio::test]
    async fn injection_is_rejected_without_spawning() {
        let out = CalculateTool
            .execute(&call(json!({"expression": "1; rm -rf /"})))
            .await;
        assert!(out.is_error);
        assert!(out.content.contains("disallowed"));
    }

    #[tokio::test]
    async fn redirect_is_rejected() {
        let out = CalculateTool
            .execute(&call(json!({"expression": "2 > /tmp/x"})))
            .await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn missing_expression_is_an_error() {
        let out = CalculateTool.execute(&call(json!({}))).await;
        assert!(out.is_error);
        assert!(out.content.contains("expression"));
    }

    // ── Builtin evaluator ─────────────────────────────────────────────────────

    #[test]
    fn eval_precedence_and_parens() {
        assert_eq!(eval("12*(7+3)").unwrap(), 120.0);
        assert_eq!(eval("2+3*4").unwrap(), 14.0);
        assert_eq!(eval("(2+3)*4").unwrap(), 20.0);
    }

    #[test]
    fn eval_power_is_right_associative() {
        assert_eq!(eval("2^3^2").unwrap(), 512.0);
    }

    #[test]
    fn eval_unary_minus_and_modulo() {
        assert_eq!(eval("-3+5").unwrap(), 2.0);
        assert_eq!(eval("10%3").unwrap(), 1.0);
    }

    #[test]
    fn eval_rejects_garbage() {
        assert!(eval("2+").is_err());
        assert!(eval("(2").is_err());
        assert!(eval("1/0").is_err());
    }

    #[test]
    fn format_drops_trailing_zero_fraction() {
        assert_eq!(format_number(120.0), "120");
        assert_eq!(format_number(0.25), "0.25");
    }
}
