// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Static GBNF grammars constraining the model to emit exactly one
//! well-formed JSON object per step.
//!
//! Two roots share the standard JSON productions:
//! - one-shot: `{thought, action, args}` (tool call) or `{thought, answer}`
//!   (terminal answer);
//! - interactive: the same two plus `{reply}` for conversational turns that
//!   need no tools.
//!
//! The `tool-name` rule is the splice point: the registry's
//! `grammar_names()` fragment constrains `action` values to registered tool
//! names; without a fragment any JSON string is accepted.

/// Standard JSON productions shared by both roots.  Strings accept the full
/// escape set including `\uXXXX`.
const JSON_PRODUCTIONS: &str = r#"object ::= "{" ws ( member ( ws "," ws member )* )? ws "}"
member ::= string ws ":" ws value
array ::= "[" ws ( value ( ws "," ws value )* )? ws "]"
value ::= object | array | string | number | "true" | "false" | "null"
string ::= "\"" char* "\""
char ::= [^"\\\x00-\x1F] | "\\" (["\\/bfnrt] | "u" [0-9a-fA-F] [0-9a-fA-F] [0-9a-fA-F] [0-9a-fA-F])
number ::= "-"? ("0" | [1-9] [0-9]*) ("." [0-9]+)? ([eE] [-+]? [0-9]+)?
ws ::= [ \t\n\r]*
"#;

const ONESHOT_ROOT: &str = r#"root ::= tool-call | final-answer
tool-call ::= "{" ws thought-member ws "," ws "\"action\"" ws ":" ws tool-name ws "," ws "\"args\"" ws ":" ws object ws "}"
final-answer ::= "{" ws thought-member ws "," ws "\"answer\"" ws ":" ws string ws "}"
thought-member ::= "\"thought\"" ws ":" ws string
"#;

const INTERACTIVE_ROOT: &str = r#"root ::= tool-call | final-answer | reply-turn
tool-call ::= "{" ws thought-member ws "," ws "\"action\"" ws ":" ws tool-name ws "," ws "\"args\"" ws ":" ws object ws "}"
final-answer ::= "{" ws thought-member ws "," ws "\"answer\"" ws ":" ws string ws "}"
reply-turn ::= "{" ws "\"reply\"" ws ":" ws string ws "}"
thought-member ::= "\"thought\"" ws ":" ws string
"#;

/// Grammar for stateless one-shot runs: tool call or terminal answer.
pub fn oneshot_grammar(tool_fragment: Option<&str>) -> String {
    compose(ONESHOT_ROOT, tool_fragment)
}

/// Grammar for interactive chat turns: tool call, terminal answer, or a
/// direct `{reply}`.
pub fn interactive_grammar(tool_fragment: Option<&str>) -> String {
    compose(INTERACTIVE_ROOT, tool_fragment)
}

fn compose(root: &str, tool_fragment: Option<&str>) -> String {
    let mut g = String::with_capacity(root.len() + JSON_PRODUCTIONS.len() + 128);
    g.push_str(root);
    match tool_fragment {
        Some(f) if !f.trim().is_empty() => {
            g.push_str(f.trim_end());
            g.push('\n');
        }
        _ => g.push_str("tool-name ::= string\n"),
    }
    g.push_str(JSON_PRODUCTIONS);
    g
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
