// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::capability::CapabilitySet;
use crate::sanitize::check_shell_safe;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Byte cap on extracted text.
const MAX_BYTES: usize = 64 * 1024;

/// PDF text extraction: `pdftotext` when the system has it, otherwise a
/// minimal in-process parser that pulls literal `(...)` strings out of
/// BT/ET text blocks.  The fallback only handles uncompressed content
/// streams — good enough for simple generated documents, and clearly
/// labelled when it runs.
pub struct ReadPdfTool;

#[async_trait]
impl Tool for ReadPdfTool {
    fn name(&self) -> &str {
        "read_pdf"
    }

    fn description(&self) -> &str {
        "Extract text from a PDF file. Optional first_page/last_page select \
         a 1-indexed page range (page range requires pdftotext)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the PDF file"
                },
                "first_page": {
                    "type": "integer",
                    "description": "First page to extract, 1-indexed (optional)"
                },
                "last_page": {
                    "type": "integer",
                    "description": "Last page to extract, inclusive (optional)"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn required_capabilities(&self) -> CapabilitySet {
        CapabilitySet::FILESYSTEM
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };
        if let Err(e) = check_shell_safe(&path) {
            return ToolOutput::err(&call.id, e);
        }
        let first_page = call.args.get("first_page").and_then(|v| v.as_u64());
        let last_page = call.args.get("last_page").and_then(|v| v.as_u64());

        debug!(path = %path, ?first_page, ?last_page, "read_pdf tool");

        match pdftotext(&path, first_page, last_page).await {
            Ok(text) => ToolOutput::ok(&call.id, cap(text)),
            Err(e) => {
                warn!("pdftotext unavailable or failed ({e}); using builtin parser");
                let bytes = match tokio::fs::read(&path).await {
                    Ok(b) => b,
                    Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
                };
                if !bytes.starts_with(b"%PDF") {
                    return ToolOutput::err(&call.id, "not a PDF file (missing %PDF header)");
                }
                let text = extract_literal_text(&bytes);
                if text.trim().is_empty() {
                    return ToolOutput::err(
                        &call.id,
                        "no extractable text (compressed streams need pdftotext installed)",
                    );
                }
                ToolOutput::ok(&call.id, cap(format!("[builtin extractor]\n{text}")))
            }
        }
    }
}

async fn pdftotext(
    path: &str,
    first_page: Option<u64>,
    last_page: Option<u64>,
) -> anyhow::Result<String> {
    let mut cmd = Command::new("pdftotext");
    if let Some(f) = first_page {
        cmd.arg("-f").arg(f.to_string());
    }
    if let Some(l) = last_page {
        cmd.arg("-l").arg(l.to_string());
    }
    cmd.arg(path).arg("-").stdin(Stdio::null());
    let out = cmd.output().await?;
    if !out.status.success() {
        anyhow::bail!("pdftotext exit {:?}", out.status.code());
    }
    let text = String::from_utf8_lossy(&out.stdout).into_owned();
    if text.trim().is_empty() {
        anyhow::bail!("pdftotext produced no text");
    }
    Ok(text)
}

fn cap(text: String) -> String {
    if text.len() <= MAX_BYTES {
        return text;
    }
    let mut cut = MAX_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n[... truncated ...]", &text[..cut])
}

/// Pull literal `(...)` strings out of BT/ET text blocks.
///
/// Handles the `\(`, `\)` and `\\` escapes inside literals and inserts a
/// newline per text block.  Everything else (hex strings, compressed
/// streams, encodings) is out of scope for the fallback.
fn extract_literal_text(bytes: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0;
    let mut in_text_block = false;
    while i < bytes.len() {
        if !in_text_block {
            if bytes[i..].starts_with(b"BT") {
                in_text_block = true;
                i += 2;
                continue;
            }
            i += 1;
            continue;
        }
        if bytes[i..].starts_with(b"ET") {
            in_text_block = false;
            if !out.ends_with('\n') && !out.is_empty() {
                out.push('\n');
            }
            i += 2;
            continue;
        }
        if bytes[i] == b'(' {
            i += 1;
            let mut literal = Vec::new();
            let mut depth = 1usize;
            while i < bytes.len() && depth > 0 {
                match bytes[i] {
                    b'\\' if i + 1 < bytes.len() => {
                        match bytes[i + 1] {
                            b'(' => literal.push(b'('),
                            b')' => literal.push(b')'),
                            b'\\' => literal.push(b'\\'),
                            b'n' => literal.push(b'\n'),
                            other => literal.push(other),
                        }
                        i += 2;
                    }
                    b'(' => {
                        depth += 1;
                        literal.push(b'(');
                        i += 1;
                    }
                    b')' => {
                        depth -= 1;
                        if depth > 0 {
                            literal.push(b')');
                        }
                        i += 1;
                    }
                    b => {
                        literal.push(b);
                        i += 1;
                    }
                }
            }
            out.push_str(&String::from_utf8_lossy(&literal));
            out.push(' ');
            continue;
        }
        i += 1;
    }
    out
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
