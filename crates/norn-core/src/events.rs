// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
/// Events streamed from the agent loop to the caller.
///
/// Tool steps produce two [`AgentEvent::Step`] events with the same index:
/// one when the call is dispatched (no observation yet) and one when the
/// observation is in.  Terminal turns use the action tags `"final_answer"`
/// and `"reply"`.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    Step {
        index: usize,
        thought: Option<String>,
        action: String,
        observation: Option<String>,
    },
    /// The one-shot terminal answer.
    FinalAnswer(String),
    /// The interactive no-tools-needed terminal reply.
    Reply(String),
    /// Earlier steps were folded into the context summary.
    ContextCompacted {
        steps_compacted: usize,
        summary_chars: usize,
    },
    /// The run is over; no further events follow.
    TurnComplete,
}
