// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use norn_memory::MemoryStore;
use norn_model::{
    approx_tokens, facade, grammar, ChatMessage, GenerationRequest, InferenceBackend, ModelError,
    Role,
};
use norn_tools::{ToolCall, ToolRegistry};

use crate::compact::{
    estimate_messages, merge_summaries, summarize_steps, KEEP_RECENT_STEPS,
};
use crate::events::AgentEvent;
use crate::prompts::{interactive_prompt, oneshot_prompt, SMALL_MODEL_PARAMS};

/// Fraction of the budget that triggers compaction checks is built into
/// [`AgentParams::context_budget`] resolution: the default budget *is* 80%
/// of the context window.
const MIN_CONTEXT_BUDGET: usize = 1536;

/// Earliest step at which compaction is considered.
const COMPACTION_MIN_STEP: usize = 3;

/// What interactive mode says when the step budget runs out.
const MAX_STEPS_FALLBACK: &str =
    "I ran out of reasoning steps before finishing that. Could you rephrase \
     or split the task into smaller parts?";

#[derive(Debug, Clone)]
pub struct AgentParams {
    pub max_steps: usize,
    pub max_tokens_per_step: u32,
    /// One-shot sampling temperature.
    pub temperature: f32,
    /// Interactive sampling temperature.
    pub chat_temperature: f32,
    /// Prompt token budget; 0 derives 80% of the context window (min 1536).
    pub context_budget: usize,
    pub verbose: bool,
}

impl Default for AgentParams {
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

impl AgentParams {
    pub fn from_config(cfg: &norn_config::AgentConfig) -> Self {
        Self {
            max_steps: cfg.max_steps,
            max_tokens_per_step: cfg.max_tokens_per_step,
            temperature: cfg.temperature,
            chat_temperature: cfg.chat_temperature,
            context_budget: cfg.context_budget,
            verbose: cfg.verbose,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    MaxSteps,
    Generate,
    InvalidParam,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// The final answer or reply.  `None` on one-shot failure.
    pub text: Option<String>,
    pub steps_taken: usize,
}

/// One completed loop step, kept only for the duration of a run.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// The JSON the model emitted, verbatim.
    pub raw_output: String,
    /// Tool name, `"error"` for malformed output, `None` for terminals.
    pub action: Option<String>,
    pub observation: Option<String>,
}

/// The agent.  Holds non-owning (`Arc`) refs to the backend, the registry
/// and optionally the memory store — all must be built before the agent and
/// are treated as read-only while a run is in flight.
pub struct Agent {
    backend: Arc<dyn InferenceBackend>,
    tools: Arc<ToolRegistry>,
    params: AgentParams,
    system_prompt: String,
    chat_prompt: String,
    memory: Option<Arc<MemoryStore>>,
    memory_session: i64,
    /// Interactive conversation history.  Only terminal assistant text lands
    /// here — tool steps stay in the turn-local buffer.
    history: Vec<ChatMessage>,
}

impl Agent {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        tools: Arc<ToolRegistry>,
        params: AgentParams,
    ) -> Self {
        let catalog = tools.prompt_description();
        let small = backend.param_count() <= SMALL_MODEL_PARAMS;
        Self {
            system_prompt: oneshot_prompt(small, &catalog),
            chat_prompt: interactive_prompt(small, &catalog),
            backend,
            tools,
            params,
            memory: None,
            memory_session: norn_memory::DEFAULT_SESSION_ID,
            history: Vec::with_capacity(32),
        }
    }

    /// Attach a memory store; prompts get enriched and transcripts recorded
    /// under `session_id` from the next run on.
    pub fn attach_memory(&mut self, store: Arc<MemoryStore>, session_id: i64) {
        self.memory = Some(store);
        self.memory_session = session_id;
    }

    /// Reset the conversation history.  Memory is untouched.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// One-shot run: stateless across invocations.
    pub async fn run(&mut self, input: &str, tx: mpsc::Sender<AgentEvent>) -> RunOutcome {
        self.run_loop(input, tx, false).await
    }

    /// Interactive turn: stateful through the conversation history.
    pub async fn chat(&mut self, input: &str, tx: mpsc::Sender<AgentEvent>) -> RunOutcome {
        self.run_loop(input, tx, true).await
    }

    async fn run_loop(
        &mut self,
        input: &str,
        tx: mpsc::Sender<AgentEvent>,
        interactive: bool,
    ) -> RunOutcome {
        if input.trim().is_empty() || self.params.max_steps == 0 {
            let _ = tx.send(AgentEvent::TurnComplete).await;
            return RunOutcome { status: RunStatus::InvalidParam, text: None, steps_taken: 0 };
        }

        let budget = self.effective_budget();
        // Enrichment is scoped to this run; the stored base prompt is never
        // modified.
        let system = self.build_system_prompt(interactive);
        self.memory_log("user", input);

        if interactive {
            self.history.push(ChatMessage::user(input));
        }

        let fragment = self.tools.grammar_names();
        let fragment = (!fragment.is_empty()).then_some(fragment);
        let grammar_text = if interactive {
            grammar::interactive_grammar(fragment.as_deref())
        } else {
            grammar::oneshot_grammar(fragment.as_deref())
        };

        let mut steps: Vec<StepRecord> = Vec::with_capacity(self.params.max_steps);
        let mut first_active = 0usize;
        let mut summary: Option<String> = None;

        let mut status = RunStatus::MaxSteps;
        let mut final_text: Option<String> = None;
        let mut steps_taken = 0usize;

        for step in 0..self.params.max_steps {
            // ── Context compaction ───────────────────────────────────────────
            if step >= COMPACTION_MIN_STEP {
                loop {
                    let msgs = self.assemble(
                        &system,
                        input,
                        interactive,
                        summary.as_deref(),
                        &steps[first_active..],
                    );
                    let est = estimate_messages(&msgs) + self.params.max_tokens_per_step as usize;
                    let active = steps.len() - first_active;
                    if est <= budget || active <= KEEP_RECENT_STEPS {
                        break;
                    }
                    let upto = steps.len() - KEEP_RECENT_STEPS;
                    let folded = summarize_steps(&steps[first_active..upto]);
                    summary = Some(merge_summaries(summary.as_deref(), &folded));
                    // Compacted step outputs leave the live window; persist
                    // them to recall so nothing is lost outright.
                    for s in &steps[first_active..upto] {
                        self.memory_log("assistant", &s.raw_output);
                    }
                    let n = upto - first_active;
                    first_active = upto;
                    debug!(steps = n, "compacted step history");
                    let _ = tx
                        .send(AgentEvent::ContextCompacted {
                            steps_compacted: n,
                            summary_chars: summary.as_deref().map(str::len).unwrap_or(0),
                        })
                        .await;
                }
            }

            // ── Prompt assembly ──────────────────────────────────────────────
            let msgs = self.assemble(
                &system,
                input,
                interactive,
                summary.as_deref(),
                &steps[first_active..],
            );
            let prompt = match self.backend.apply_chat_template(&msgs).await {
                Ok(p) => p,
                Err(e) => {
                    debug!("chat template unavailable ({e}); using plain layout");
                    plain_prompt(&msgs)
                }
            };

            // ── Constrained generation ───────────────────────────────────────
            let req = GenerationRequest {
                prompt,
                max_tokens: self.params.max_tokens_per_step,
                temperature: if interactive {
                    self.params.chat_temperature
                } else {
                    self.params.temperature
                },
                grammar: Some(grammar_text.clone()),
                ..Default::default()
            };
            let out = match facade::generate(self.backend.as_ref(), req, None).await {
                Ok(o) => o,
                Err(ModelError::InvalidParam(msg)) => {
                    warn!("invalid generation parameters: {msg}");
                    status = RunStatus::InvalidParam;
                    break;
                }
                Err(e) => {
                    warn!("generation failed: {e}");
                    status = RunStatus::Generate;
                    break;
                }
            };
            steps_taken = step + 1;
            let raw = out.text.trim().to_string();
            let thought = norn_scan::find_string(&raw, "thought");

            // ── Dispatch ─────────────────────────────────────────────────────
            // Tool call first: the grammar puts "action" before "args", so a
            // top-level "action" key can never be shadowed by argument keys.
            if let Some(action) = norn_scan::find_string(&raw, "action") {
                let _ = tx
                    .send(AgentEvent::Step {
                        index: step,
                        thought: thought.clone(),
                        action: action.clone(),
                        observation: None,
                    })
                    .await;
                let args = norn_scan::extract_object(&raw, "args")
                    .and_then(|o| serde_json::from_str(o).ok())
                    .unwrap_or_else(|| json!({}));
                let call = ToolCall { id: format!("step-{step}"), name: action.clone(), args };
                let output = self.tools.execute(&call).await;
                let observation = output.content;
                let _ = tx
                    .send(AgentEvent::Step {
                        index: step,
                        thought,
                        action: action.clone(),
                        observation: Some(observation.clone()),
                    })
                    .await;
                steps.push(StepRecord {
                    raw_output: raw,
                    action: Some(action),
                    observation: Some(observation),
                });
                continue;
            }

            if let Some(answer) = norn_scan::find_string(&raw, "answer") {
                let _ = tx
                    .send(AgentEvent::Step {
                        index: step,
                        thought,
                        action: "final_answer".into(),
                        observation: None,
                    })
                    .await;
                let _ = tx.send(AgentEvent::FinalAnswer(answer.clone())).await;
                self.memory_log("assistant", &answer);
                if interactive {
                    self.history.push(ChatMessage::assistant(&answer));
                }
                final_text = Some(answer);
                status = RunStatus::Ok;
                break;
            }

            if interactive {
                if let Some(reply) = norn_scan::find_string(&raw, "reply") {
                    let _ = tx
                        .send(AgentEvent::Step {
                            index: step,
                            thought: None,
                            action: "reply".into(),
                            observation: None,
                        })
                        .await;
                    let _ = tx.send(AgentEvent::Reply(reply.clone())).await;
                    self.memory_log("assistant", &reply);
                    self.history.push(ChatMessage::assistant(&reply));
                    final_text = Some(reply);
                    status = RunStatus::Ok;
                    break;
                }
            }

            // Malformed despite the grammar (or a mock): synthesize a
            // corrective observation and let the model try again.
            let obs = corrective_observation(interactive);
            let _ = tx
                .send(AgentEvent::Step {
                    index: step,
                    thought,
                    action: "error".into(),
                    observation: Some(obs.to_string()),
                })
                .await;
            steps.push(StepRecord {
                raw_output: raw,
                action: Some("error".into()),
                observation: Some(obs.to_string()),
            });
        }

        if status == RunStatus::MaxSteps && interactive {
            // The conversation must not end abruptly: surface a textual
            // fallback and keep the history consistent.
            self.history.push(ChatMessage::assistant(MAX_STEPS_FALLBACK));
            final_text = Some(MAX_STEPS_FALLBACK.to_string());
        }

        let _ = tx.send(AgentEvent::TurnComplete).await;
        RunOutcome { status, text: final_text, steps_taken }
    }

    /// [system] + user turns + optional summary + active steps, in prompt
    /// order.  Step output for step *i* always precedes its observation.
    fn assemble(
        &self,
        system: &str,
        input: &str,
        interactive: bool,
        summary: Option<&str>,
        steps: &[StepRecord],
    ) -> Vec<ChatMessage> {
        let mut msgs = Vec::with_capacity(self.history.len() + steps.len() * 2 + 3);
        msgs.push(ChatMessage::system(system));
        if interactive {
            msgs.extend(self.history.iter().cloned());
        } else {
            msgs.push(ChatMessage::user(input));
        }
        if let Some(s) = summary {
            msgs.push(ChatMessage::user(s));
        }
        for s in steps {
            msgs.push(ChatMessage::assistant(&s.raw_output));
            if let (Some(action), Some(obs)) = (&s.action, &s.observation) {
                msgs.push(ChatMessage::user(format!("Observation from {action}: {obs}")));
            }
        }
        msgs
    }

    fn effective_budget(&self) -> usize {
        let cw = self.backend.context_window();
        if self.params.context_budget > 0 {
            self.params.context_budget.min(cw)
        } else {
            (cw * 8 / 10).max(MIN_CONTEXT_BUDGET).min(cw)
        }
    }

    /// Base prompt, enriched with core memory and tier stats when a store
    /// is attached.  Memory failures degrade to the base prompt — they are
    /// never fatal to the run.
    fn build_system_prompt(&self, interactive: bool) -> String {
        let base = if interactive { &self.chat_prompt } else { &self.system_prompt };
        let Some(mem) = &self.memory else {
            return base.clone();
        };
        let mut enriched = base.clone();
        match mem.core_dump() {
            Ok(dump) if !dump.is_empty() => {
                enriched.push_str("\n\nCore memory:\n");
                enriched.push_str(&dump);
            }
            Ok(_) => {}
            Err(e) => warn!("core memory dump failed: {e}"),
        }
        let stats = mem.recall_stats(self.memory_session);
        let facts = mem.archival_count();
        match (stats, facts) {
            (Ok((n, t)), Ok(k)) => {
                enriched.push_str(&format!(
                    "Recall memory: {n} messages ({t} tokens); Archival memory: {k} facts.\n"
                ));
            }
            (Err(e), _) | (_, Err(e)) => warn!("memory stats unavailable: {e}"),
        }
        enriched
    }

    fn memory_log(&self, role: &str, content: &str) {
        if let Some(mem) = &self.memory {
            if let Err(e) =
                mem.recall_add(self.memory_session, role, content, approx_tokens(content))
            {
                warn!("recall append failed: {e}");
            }
        }
    }
}

fn corrective_observation(interactive: bool) -> &'static str {
    if interactive {
        "Your response did not match the required format. Reply with exactly one \
         JSON object: {\"reply\":\"...\"} for a direct answer, \
         {\"thought\":\"...\",\"action\":\"...\",\"args\":{...}} to call a tool, or \
         {\"thought\":\"...\",\"answer\":\"...\"} to finish."
    } else {
        "Your response did not match the required format. Reply with exactly one \
         JSON object: {\"thought\":\"...\",\"action\":\"...\",\"args\":{...}} to call \
         a tool, or {\"thought\":\"...\",\"answer\":\"...\"} to finish."
    }
}

/// Plain-text prompt layout, used when the backend has no chat template.
/// Must steer the model identically to the templated path; only latency
/// differs.
fn plain_prompt(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    for m in messages {
        match m.role {
            Role::System => {
                out.push_str(&m.content);
                out.push('\n');
            }
            Role::User => {
                out.push_str("User: ");
                out.push_str(&m.content);
                out.push_str("\n\n");
            }
            Role::Assistant => {
                out.push_str("Assistant: ");
                out.push_str(&m.content);
                out.push('\n');
            }
        }
    }
    out.push_str("Assistant: ");
    out
}
