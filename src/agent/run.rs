//! Agentic Loop (§4.E): the per-run state machine that drives LLM ↔ tool
//! cycles. New component; grounded in the teacher's step-driven run loop
//! (the deleted `agentic_loop.rs`'s `LoopCallback`/step-by-step shape) but
//! rebuilt around `RunOutcome` instead of sentinel errors, per the Design
//! Notes redesign flag ("sentinel errors as control flow").

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::agent::backend::BackendCapabilities;
use crate::agent::checkpoint::{
    AgenticMode, Checkpoint, CheckpointAction, CheckpointHandler, CheckpointReason, CheckpointResponse,
    SupervisedConfig,
};
use crate::agent::loop_detector::{LoopState, LoopTrigger};
use crate::agent::parser::parse_tool_calls;
use crate::agent::prompt::{PromptComposer, PromptContext};
use crate::agent::tier::resolve_tier;
use crate::agent::types::{
    new_run_id, ChatMessage, GenerationOptions, RunId, RunResponse, Step, StepEvent, StepObserver,
};
use crate::error::{Error, Result};
use crate::tools::ToolRegistry;

/// Tagged outcome of one `Agent::run` call. Every variant carries the
/// `RunResponse` accumulated so far so token accounting is captured on
/// every exit path (§3 invariants), and callers can never mistake a
/// control-flow signal for a plain failure or success.
pub enum RunOutcome {
    Completed(RunResponse),
    Cancelled(RunResponse),
    Escalated(RunResponse),
    NeedsMoreSteps { additional_steps: u32, response: RunResponse },
    NeedsGuidance { guidance: String, response: RunResponse },
    Failed { error: Error, response: RunResponse },
}

impl RunOutcome {
    pub fn response(&self) -> &RunResponse {
        match self {
            RunOutcome::Completed(r)
            | RunOutcome::Cancelled(r)
            | RunOutcome::Escalated(r)
            | RunOutcome::NeedsMoreSteps { response: r, .. }
            | RunOutcome::NeedsGuidance { response: r, .. }
            | RunOutcome::Failed { response: r, .. } => r,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

const TOOL_OUTPUT_PREVIEW_CHARS: usize = 300;
const USER_MESSAGE_PREVIEW_CHARS: usize = 120;

/// One agentic run's collaborators and per-call configuration. Built
/// fresh (or reused across retries with a fresh conversation) by the
/// Resilient Dispatcher.
pub struct Agent {
    pub backend: Arc<dyn BackendCapabilities>,
    pub tools: Arc<ToolRegistry>,
    pub checkpoint_handler: Option<Arc<dyn CheckpointHandler>>,
    pub supervised: SupervisedConfig,
    pub prompt_composer: Arc<PromptComposer>,
    pub observer: Arc<dyn StepObserver>,
    pub cwd: PathBuf,
    pub persona: Option<String>,
    pub user_facts: Option<String>,
    pub unrestricted: bool,
    pub knowledge: Vec<String>,
    pub max_steps: Option<u32>,
}

impl Agent {
    /// Run one full agentic loop for `user_message`, seeded with `history`.
    pub async fn run(&mut self, ctx: CancellationToken, history: &[ChatMessage], user_message: &str) -> RunOutcome {
        let run_id: RunId = new_run_id();
        let (tier_steps, tier) = resolve_tier(self.backend.model());
        let max_steps = self.max_steps.unwrap_or(tier_steps);

        let mut conversation: Vec<ChatMessage> = history.to_vec();
        conversation.push(ChatMessage::user(user_message));

        let mut steps: Vec<Step> = Vec::new();
        let mut tools_used: Vec<String> = Vec::new();
        let mut loop_state = LoopState::default();
        let start = Instant::now();
        let mut long_running_triggered = false;
        let long_running_timeout = Duration::from_secs(self.supervised.long_running_timeout_secs);

        if let Some(ta) = self.backend.as_token_accounting() {
            ta.reset_tokens();
        }

        let mut step_index: u32 = 0;
        let outcome = 'run: loop {
            if step_index >= max_steps {
                break self
                    .handle_step_limit(&ctx, run_id, step_index, max_steps, &steps, &tools_used)
                    .await;
            }

            // 1. cancellation check
            if ctx.is_cancelled() {
                break self.finish(
                    RunOutcomeKind::Cancelled,
                    run_id,
                    "Task cancelled by user",
                    steps,
                    tools_used,
                    step_index,
                );
            }

            // 2. long-running checkpoint
            if !long_running_triggered && start.elapsed() > long_running_timeout && self.checkpoint_handler.is_some() {
                long_running_triggered = true;
                let checkpoint = self.build_checkpoint(
                    CheckpointReason::LongRunning,
                    "run exceeded the long-running timeout",
                    step_index,
                    max_steps,
                    &steps,
                    &tools_used,
                    None,
                );
                match self.consult_checkpoint(&ctx, run_id, step_index, checkpoint).await {
                    // Autonomous mode (or no handler) short-circuits to nil: no pause, run
                    // keeps going under the timer it already reset above.
                    Ok(CheckpointConsult::NoPause) => {}
                    Ok(CheckpointConsult::Response(response)) => match response.action {
                        CheckpointAction::Wait => long_running_triggered = false,
                        CheckpointAction::DifferentApproach => {
                            conversation.push(ChatMessage::system(
                                "Try a simpler, more direct approach to complete this task.",
                            ));
                        }
                        CheckpointAction::Escalate => {
                            break self.finish(
                                RunOutcomeKind::Escalated,
                                run_id,
                                "escalation requested",
                                steps,
                                tools_used,
                                step_index,
                            );
                        }
                        CheckpointAction::Abort => {
                            break self.finish(
                                RunOutcomeKind::Cancelled,
                                run_id,
                                "task aborted",
                                steps,
                                tools_used,
                                step_index,
                            );
                        }
                        _ => {}
                    },
                    Ok(CheckpointConsult::Nil) => {
                        break self.finish(
                            RunOutcomeKind::Cancelled,
                            run_id,
                            "task aborted",
                            steps,
                            tools_used,
                            step_index,
                        );
                    }
                    Err(e) => {
                        break RunOutcome::Failed { error: e, response: self.drain_response(run_id, "", &steps, &tools_used, step_index, false) };
                    }
                }
            }

            // 3. thinking preview
            self.emit(StepEvent::new(
                crate::agent::types::StepEventKind::Thinking,
                step_index,
                format!("Thinking about: {}", preview(user_message, USER_MESSAGE_PREVIEW_CHARS)),
            ));

            // 4. call the LLM — prefer the streaming variant when the backend exposes one,
            // emitting a `Streaming` event per token; otherwise issue a single call.
            let system_prompt = self.compose_system_prompt(tier);
            let options = GenerationOptions::balanced();
            let chat_result = if let Some(streaming) = self.backend.as_streaming() {
                let observer = Arc::clone(&self.observer);
                let mut on_token = move |token: &str| {
                    observer.on_step(StepEvent::new(
                        crate::agent::types::StepEventKind::Streaming,
                        step_index,
                        token.to_string(),
                    ));
                };
                streaming
                    .chat_stream(ctx.clone(), &conversation, &system_prompt, &options, &mut on_token)
                    .await
            } else {
                self.backend.chat(ctx.clone(), &conversation, &system_prompt, &options).await
            };
            let text = match chat_result {
                Ok(text) => text,
                Err(e) => {
                    self.emit(StepEvent::new(crate::agent::types::StepEventKind::Error, step_index, e.to_string()));
                    break RunOutcome::Failed {
                        error: e,
                        response: self.drain_response(run_id, "", &steps, &tools_used, step_index, false),
                    };
                }
            };

            // 5. parse
            let (mut calls, cleaned) = parse_tool_calls(&text, crate::tools::CATALOG_NAMES);

            // 6. zero tool calls -> complete
            if calls.is_empty() {
                conversation.push(ChatMessage::assistant(cleaned.as_str()));
                steps.push(Step::terminal(cleaned.as_str()));
                self.emit(StepEvent::new(
                    crate::agent::types::StepEventKind::Complete,
                    step_index,
                    "task completed",
                ));
                break RunOutcome::Completed(self.drain_response(run_id, &cleaned, &steps, &tools_used, step_index + 1, true));
            }

            // 7. planning preview
            if calls.len() > 1 {
                let names: Vec<&str> = calls.iter().map(|c| c.name.as_str()).collect();
                self.emit(StepEvent::new(
                    crate::agent::types::StepEventKind::Thinking,
                    step_index,
                    format!("Planning to use: {}", names.join(", ")),
                ));
            } else {
                self.emit(StepEvent::new(
                    crate::agent::types::StepEventKind::Thinking,
                    step_index,
                    format!("Formulating response: {}", preview(&cleaned, USER_MESSAGE_PREVIEW_CHARS)),
                ));
            }

            // 8. execute the first call only
            let call = calls.remove(0);
            self.emit(StepEvent::tool_call(step_index, &call.name, &call.params_canonical_json()));
            let mut result = self.tools.dispatch(ctx.clone(), &call, &mut self.cwd).await;
            let preview_text = preview(
                if result.success { &result.output } else { &result.error },
                TOOL_OUTPUT_PREVIEW_CHARS,
            );
            self.emit(StepEvent::tool_result(step_index, &result, &preview_text));
            if !tools_used.contains(&call.name) {
                tools_used.push(call.name.clone());
            }

            // 8b. tool error checkpoint (§4.D "tool_error")
            if !result.success && self.supervised.checkpoint_on_error {
                loop {
                    let checkpoint = self.build_checkpoint(
                        CheckpointReason::ToolError,
                        &format!("tool '{}' failed: {}", call.name, result.error),
                        step_index,
                        max_steps,
                        &steps,
                        &tools_used,
                        Some(&result),
                    );
                    match self.consult_checkpoint(&ctx, run_id, step_index, checkpoint).await {
                        // Autonomous mode (or no handler): no pause, fall through with the
                        // failure as recorded.
                        Ok(CheckpointConsult::NoPause) => break,
                        Ok(CheckpointConsult::Response(response)) if response.action == CheckpointAction::Retry => {
                            result = self.tools.dispatch(ctx.clone(), &call, &mut self.cwd).await;
                            let preview_text = preview(
                                if result.success { &result.output } else { &result.error },
                                TOOL_OUTPUT_PREVIEW_CHARS,
                            );
                            self.emit(StepEvent::tool_result(step_index, &result, &preview_text));
                            if result.success {
                                break;
                            }
                        }
                        Ok(CheckpointConsult::Response(response)) if response.action == CheckpointAction::Continue => break,
                        Ok(CheckpointConsult::Response(response)) if response.action == CheckpointAction::Guide => {
                            if let Some(guidance) = response.guidance {
                                conversation.push(ChatMessage::system(guidance));
                            }
                            break;
                        }
                        Ok(CheckpointConsult::Response(_)) | Ok(CheckpointConsult::Nil) => {
                            break 'run self.finish(
                                RunOutcomeKind::Cancelled,
                                run_id,
                                "task aborted",
                                steps,
                                tools_used,
                                step_index,
                            );
                        }
                        Err(e) => {
                            break 'run RunOutcome::Failed {
                                error: e,
                                response: self.drain_response(run_id, "", &steps, &tools_used, step_index, false),
                            };
                        }
                    }
                }
            }

            // 9. loop detector
            if self.supervised.checkpoint_on_loop {
                if let Some(trigger) = loop_state.record(&call, &result) {
                    let (reason, message) = match &trigger {
                        LoopTrigger::LoopDetected { reason } => (CheckpointReason::LoopDetected, reason.clone()),
                        LoopTrigger::EmptyResults { reason } => (CheckpointReason::EmptyResults, reason.clone()),
                    };
                    let checkpoint = self.build_checkpoint(
                        reason,
                        &message,
                        step_index,
                        max_steps,
                        &steps,
                        &tools_used,
                        Some(&result),
                    );
                    match self.consult_checkpoint(&ctx, run_id, step_index, checkpoint).await {
                        // Autonomous mode (or no handler) short-circuits to nil: no pause,
                        // fall through to step 10 under the existing step budget.
                        Ok(CheckpointConsult::NoPause) => {}
                        Ok(CheckpointConsult::Response(response)) if response.action == CheckpointAction::Continue => {
                            loop_state.reset();
                        }
                        Ok(CheckpointConsult::Response(response)) if response.action == CheckpointAction::Guide => {
                            loop_state.reset();
                            if let Some(guidance) = response.guidance {
                                conversation.push(ChatMessage::system(guidance));
                            }
                        }
                        Ok(CheckpointConsult::Response(response)) if response.action == CheckpointAction::Escalate => {
                            break self.finish(
                                RunOutcomeKind::Escalated,
                                run_id,
                                "escalation requested",
                                steps,
                                tools_used,
                                step_index,
                            );
                        }
                        Ok(CheckpointConsult::Response(_)) | Ok(CheckpointConsult::Nil) => {
                            break self.finish(
                                RunOutcomeKind::Cancelled,
                                run_id,
                                "task aborted",
                                steps,
                                tools_used,
                                step_index,
                            );
                        }
                        Err(e) => {
                            break RunOutcome::Failed {
                                error: e,
                                response: self.drain_response(run_id, "", &steps, &tools_used, step_index, false),
                            };
                        }
                    }
                }
            }

            // 10. append to conversation and continue
            conversation.push(ChatMessage::assistant(text.as_str()));
            conversation.push(ChatMessage::tool_result_block(format_tool_result_block(&result)));
            steps.push(Step::with_tool(cleaned.as_str(), call, result));
            step_index += 1;
        };

        outcome
    }

    fn compose_system_prompt(&self, tier: crate::agent::tier::PromptTier) -> String {
        let ctx = PromptContext {
            persona: self.persona.as_deref(),
            user_facts: self.user_facts.as_deref(),
            unrestricted: self.unrestricted,
            task: "agentic_tool_use",
            tier,
            working_dir: self.cwd.to_str(),
            knowledge: &self.knowledge,
            tools: &self.tools.tool_specs(),
        };
        self.prompt_composer.compose(&ctx)
    }

    fn emit(&self, event: StepEvent) {
        self.observer.on_step(event);
    }

    #[allow(clippy::too_many_arguments)]
    fn build_checkpoint(
        &self,
        reason: CheckpointReason,
        message: &str,
        steps_run: u32,
        steps_max: u32,
        steps: &[Step],
        tools_used: &[String],
        last_result: Option<&crate::agent::types::ToolResult>,
    ) -> Checkpoint {
        let mut checkpoint = Checkpoint::new(reason, message, steps_run, steps_max);
        checkpoint.progress = steps.iter().map(|s| preview(&s.thought, 80)).collect();
        checkpoint.tools_used = tools_used.to_vec();
        if let Some(result) = last_result {
            checkpoint.last_action = Some(result.tool_name.clone());
            if !result.success {
                checkpoint.last_error = Some(result.error.clone());
            }
        }
        checkpoint
    }

    async fn consult_checkpoint(
        &self,
        ctx: &CancellationToken,
        run_id: RunId,
        step_index: u32,
        checkpoint: Checkpoint,
    ) -> Result<CheckpointConsult> {
        if self.supervised.mode == AgenticMode::Autonomous || self.checkpoint_handler.is_none() {
            return Ok(CheckpointConsult::NoPause);
        }
        let _ = run_id;
        self.emit(StepEvent::new(
            crate::agent::types::StepEventKind::Checkpoint,
            step_index,
            checkpoint.reason_message.clone(),
        ));
        let handler = self.checkpoint_handler.as_ref().unwrap();
        match handler.handle(ctx.clone(), checkpoint).await? {
            Some(response) => Ok(CheckpointConsult::Response(response)),
            None => Ok(CheckpointConsult::Nil),
        }
    }

    async fn handle_step_limit(
        &self,
        ctx: &CancellationToken,
        run_id: RunId,
        step_index: u32,
        max_steps: u32,
        steps: &[Step],
        tools_used: &[String],
    ) -> RunOutcome {
        if !self.supervised.checkpoint_on_step_limit || self.checkpoint_handler.is_none() {
            return self.finish(RunOutcomeKind::Cancelled, run_id, "step limit reached", steps.to_vec(), tools_used.to_vec(), step_index);
        }
        let checkpoint = self.build_checkpoint(
            CheckpointReason::StepLimit,
            "step budget exhausted",
            step_index,
            max_steps,
            steps,
            tools_used,
            None,
        );
        match self.consult_checkpoint(ctx, run_id, step_index, checkpoint).await {
            Ok(CheckpointConsult::Response(response)) if response.action == CheckpointAction::Continue => RunOutcome::NeedsMoreSteps {
                additional_steps: response.additional_steps.unwrap_or(10),
                response: self.drain_response(run_id, "", steps, tools_used, step_index, false),
            },
            Ok(CheckpointConsult::Response(response)) if response.action == CheckpointAction::Guide => RunOutcome::NeedsGuidance {
                guidance: response.guidance.unwrap_or_else(|| "awaiting guidance after step limit".to_string()),
                response: self.drain_response(run_id, "", steps, tools_used, step_index, false),
            },
            // NoPause (autonomous/no handler) has no extra budget to fall through to at the
            // hard step cap, same as a genuine nil or non-continue response: stop here.
            _ => self.finish(RunOutcomeKind::Cancelled, run_id, "task aborted", steps.to_vec(), tools_used.to_vec(), step_index),
        }
    }

    fn finish(
        &self,
        kind: RunOutcomeKind,
        run_id: RunId,
        message: &str,
        steps: Vec<Step>,
        tools_used: Vec<String>,
        step_index: u32,
    ) -> RunOutcome {
        let response = self.drain_response(run_id, message, &steps, &tools_used, step_index, false);
        match kind {
            RunOutcomeKind::Cancelled => RunOutcome::Cancelled(response),
            RunOutcomeKind::Escalated => RunOutcome::Escalated(response),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn drain_response(
        &self,
        _run_id: RunId,
        message: &str,
        steps: &[Step],
        tools_used: &[String],
        step_index: u32,
        completed: bool,
    ) -> RunResponse {
        let tokens_used = self
            .backend
            .as_token_accounting()
            .map(|ta| ta.total_tokens())
            .unwrap_or(0);
        RunResponse {
            message: message.to_string(),
            steps: steps.to_vec(),
            tools_used: tools_used.to_vec(),
            completed,
            steps_count: step_index,
            provider: self.backend.provider_name().to_string(),
            model: self.backend.model().to_string(),
            tokens_used,
        }
    }
}

enum RunOutcomeKind {
    Cancelled,
    Escalated,
}

/// Outcome of consulting the checkpoint handler, distinguishing an
/// autonomous-mode (or handler-less) short-circuit — which must never be
/// treated as an abort — from an actual handler response or an explicit nil.
enum CheckpointConsult {
    NoPause,
    Response(CheckpointResponse),
    Nil,
}

fn preview(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(max_chars).collect();
        format!("{truncated}…")
    }
}

/// The delimited block subsequent LLM turns see in place of a raw tool
/// result (§4.E "Tool result formatting").
fn format_tool_result_block(result: &crate::agent::types::ToolResult) -> String {
    let mut block = format!("[Tool Result: {}]\n", result.tool_name);
    block.push_str(&format!("Status: {}\n", if result.success { "Success" } else { "Failed" }));
    if !result.success {
        block.push_str(&format!("Error: {}\n", result.error));
    }
    if !result.output.is_empty() {
        block.push_str(&format!("Output: {}\n", result.output));
    }
    block.push_str("[End Tool Result]");
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_block_has_the_documented_shape() {
        let result = crate::agent::types::ToolResult::success("read_file", "hello");
        let block = format_tool_result_block(&result);
        assert!(block.starts_with("[Tool Result: read_file]"));
        assert!(block.contains("Status: Success"));
        assert!(block.contains("Output: hello"));
        assert!(block.ends_with("[End Tool Result]"));
    }

    #[test]
    fn failed_tool_result_block_includes_error_line() {
        let result = crate::agent::types::ToolResult::failure("run_command", "boom");
        let block = format_tool_result_block(&result);
        assert!(block.contains("Status: Failed"));
        assert!(block.contains("Error: boom"));
    }

    #[test]
    fn preview_truncates_long_text_with_ellipsis() {
        let text = "x".repeat(500);
        let out = preview(&text, 10);
        assert_eq!(out.chars().count(), 11);
        assert!(out.ends_with('…'));
    }
}
