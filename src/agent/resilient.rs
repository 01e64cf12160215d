//! Resilient Dispatcher (§4.K): wraps the Agentic Loop with a primary
//! backend and an ordered list of fallbacks, consulting the Health Prober
//! and Recovery Analyzer whenever a run fails or the Quality Gate flags a
//! regression. New component; grounded in the teacher's provider-list
//! fallback scan in `client.rs`, generalised from "pick the first reachable
//! provider" into the full probe → analyze → act cycle of §4.J/§4.K.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::agent::backend::BackendCapabilities;
use crate::agent::checkpoint::{CheckpointHandler, SupervisedConfig};
use crate::agent::health::HealthProbe;
use crate::agent::prompt::PromptComposer;
use crate::agent::quality::{self, QualityAssessment};
use crate::agent::recovery::{self, FallbackProvider, RecoveryAction, TaskContext};
use crate::agent::run::{Agent, RunOutcome};
use crate::agent::types::{ChatMessage, RunResponse, StepEvent, StepEventKind, StepObserver};
use crate::error::Error;
use crate::tools::ToolRegistry;

const MAX_SAME_BACKEND_RETRIES: u32 = 1;

/// Per-attempt deadline (§4.K step 5): each retry/fallback attempt gets a
/// fresh context decoupled from whatever deadline the previous attempt
/// ran against, rather than inheriting an already-expired one.
const ATTEMPT_DEADLINE: Duration = Duration::from_secs(180);

/// A configured fallback candidate paired with a live backend handle.
/// `FallbackProvider` alone only carries selection metadata (name, model,
/// credential, priority); the dispatcher needs an actual callable backend
/// to run against, so the two travel together.
pub struct FallbackBackend {
    pub provider: FallbackProvider,
    pub backend: Arc<dyn BackendCapabilities>,
    pub probe: Arc<dyn HealthProbe>,
}

/// A note the Recovery Analyzer or Quality Gate decided is worth
/// remembering for next time (§4.J "should_learn"). What a sink does with
/// it — write to a file, emit a metric, feed a future prompt — is outside
/// this core's concerns.
#[derive(Debug, Clone)]
pub struct LearningRecord {
    pub provider: String,
    pub model: String,
    pub reason: String,
    pub note: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Receives learning records. Implementors must not block the dispatch
/// loop; queue and return quickly.
pub trait LearningSink: Send + Sync {
    fn record(&self, note: LearningRecord);
}

/// Drops every record; used when no learning sink is configured.
pub struct NoOpLearningSink;

impl LearningSink for NoOpLearningSink {
    fn record(&self, _note: LearningRecord) {}
}

/// Shared configuration for every attempt the dispatcher makes, primary
/// or fallback. Mirrors `Agent`'s fields minus `backend`, which varies
/// per attempt.
pub struct ResilientDispatcher {
    pub primary: Arc<dyn BackendCapabilities>,
    pub primary_probe: Arc<dyn HealthProbe>,
    pub fallbacks: Vec<FallbackBackend>,
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
    pub learning_sink: Arc<dyn LearningSink>,
}

impl ResilientDispatcher {
    /// Run one user turn to completion, retrying and falling back as the
    /// Recovery Analyzer directs. Only `Completed`/`Failed` outcomes (and a
    /// quality-gate regression on a `Completed` one) trigger recovery;
    /// `Cancelled`, `Escalated`, `NeedsMoreSteps`, and `NeedsGuidance` are
    /// control-flow signals from the checkpoint arbiter and are returned
    /// to the caller untouched.
    pub async fn dispatch(
        &self,
        ctx: CancellationToken,
        history: &[ChatMessage],
        user_message: &str,
    ) -> RunOutcome {
        let start = Instant::now();
        let mut conversation_len = history.len() as u32 + 1;
        let mut same_backend_retries = 0u32;

        let mut current: Option<(String, Arc<dyn BackendCapabilities>)> =
            Some(("primary".to_string(), Arc::clone(&self.primary)));
        let mut tried_fallbacks: Vec<String> = Vec::new();
        let mut extra_guidance: Vec<ChatMessage> = Vec::new();

        loop {
            let Some((name, backend)) = current.take() else {
                return RunOutcome::Failed {
                    error: Error::FallbackExhausted("no backend available to attempt the run".to_string()),
                    response: empty_response(),
                };
            };

            let mut seeded_history = history.to_vec();
            seeded_history.extend(extra_guidance.iter().cloned());
            conversation_len = seeded_history.len() as u32 + 1;

            let mut agent = self.build_agent(Arc::clone(&backend));
            let outcome = self.run_with_fresh_deadline(&ctx, &mut agent, &seeded_history, user_message).await;

            match &outcome {
                RunOutcome::Completed(response) => {
                    let assessment = quality::assess(user_message, &response.message, !response.tools_used.is_empty());
                    if !assessment.should_fallback {
                        return outcome;
                    }
                    self.emit(format!("quality gate flagged {name}'s response: {}", assessment.reason));
                    match self.recover_from_quality(&ctx, &name, &assessment, response, &mut tried_fallbacks).await {
                        Some(next) => {
                            current = Some(next);
                            continue;
                        }
                        None => return outcome,
                    }
                }
                RunOutcome::Failed { error, response } => {
                    let task_ctx = TaskContext {
                        task: user_message.to_string(),
                        steps_completed: response.steps_count,
                        distinct_tools_used: response.tools_used.len() as u32,
                        elapsed: start.elapsed(),
                        conversation_size: conversation_len,
                        last_tool_output: response
                            .steps
                            .last()
                            .and_then(|s| s.tool_result.as_ref())
                            .map(|r| r.output.clone()),
                    };

                    let probe: &Arc<dyn HealthProbe> = if name == "primary" {
                        &self.primary_probe
                    } else {
                        self.fallbacks
                            .iter()
                            .find(|f| f.provider.name == name)
                            .map(|f| &f.probe)
                            .unwrap_or(&self.primary_probe)
                    };
                    let health = probe.probe(ctx.clone()).await;
                    let providers = self.remaining_fallback_providers(&tried_fallbacks);
                    let decision = recovery::analyze(&health, &task_ctx, &providers);
                    self.emit(format!("recovery: {:?} - {}", decision.action, decision.reason));

                    if decision.should_learn {
                        self.learning_sink.record(LearningRecord {
                            provider: name.clone(),
                            model: backend.model().to_string(),
                            reason: decision.reason.clone(),
                            note: decision.learning_note.clone(),
                            recorded_at: Utc::now(),
                        });
                    }

                    match decision.action {
                        RecoveryAction::Retry if same_backend_retries < MAX_SAME_BACKEND_RETRIES => {
                            same_backend_retries += 1;
                            current = Some((name, backend));
                        }
                        RecoveryAction::WaitAndRetry => {
                            if let Some(wait) = decision.wait_duration {
                                tokio::select! {
                                    _ = ctx.cancelled() => return outcome,
                                    _ = tokio::time::sleep(wait) => {}
                                }
                            }
                            current = Some((name, backend));
                        }
                        RecoveryAction::Simplify => {
                            extra_guidance.push(ChatMessage::system(
                                "The previous attempt failed. Take a simpler, more direct approach.",
                            ));
                            current = Some((name, backend));
                        }
                        RecoveryAction::Fallback | RecoveryAction::Retry => {
                            tried_fallbacks.push(name.clone());
                            current = self.pick_fallback(&decision, &tried_fallbacks);
                            if current.is_none() {
                                return RunOutcome::Failed {
                                    error: Error::FallbackExhausted(format!(
                                        "all fallback providers exhausted after {name} failed: {error}"
                                    )),
                                    response: response.clone(),
                                };
                            }
                        }
                        RecoveryAction::Abort => {
                            return RunOutcome::Failed {
                                error: Error::FallbackExhausted(format!("recovery aborted: {}", decision.reason)),
                                response: response.clone(),
                            };
                        }
                    }
                }
                _ => return outcome,
            }
        }
    }

    /// Run `agent` against a child of `ctx` carrying its own 3 minute
    /// deadline, so a fallback or retry attempt never inherits the
    /// previous attempt's already-expired deadline. Real cancellation of
    /// `ctx` still propagates, since the attempt token is a child token.
    async fn run_with_fresh_deadline(
        &self,
        ctx: &CancellationToken,
        agent: &mut Agent,
        history: &[ChatMessage],
        user_message: &str,
    ) -> RunOutcome {
        let attempt_ctx = ctx.child_token();
        let deadline_ctx = attempt_ctx.clone();
        let deadline_timer = tokio::spawn(async move {
            tokio::time::sleep(ATTEMPT_DEADLINE).await;
            deadline_ctx.cancel();
        });
        let outcome = agent.run(attempt_ctx, history, user_message).await;
        deadline_timer.abort();
        outcome
    }

    fn build_agent(&self, backend: Arc<dyn BackendCapabilities>) -> Agent {
        Agent {
            backend,
            tools: Arc::clone(&self.tools),
            checkpoint_handler: self.checkpoint_handler.clone(),
            supervised: self.supervised.clone(),
            prompt_composer: Arc::clone(&self.prompt_composer),
            observer: Arc::clone(&self.observer),
            cwd: self.cwd.clone(),
            persona: self.persona.clone(),
            user_facts: self.user_facts.clone(),
            unrestricted: self.unrestricted,
            knowledge: self.knowledge.clone(),
            max_steps: self.max_steps,
        }
    }

    fn emit(&self, message: impl Into<String>) {
        self.observer.on_step(StepEvent::new(StepEventKind::Recovery, 0, message.into()));
    }

    fn remaining_fallback_providers(&self, tried: &[String]) -> Vec<FallbackProvider> {
        self.fallbacks
            .iter()
            .filter(|f| !tried.contains(&f.provider.name))
            .map(|f| f.provider.clone())
            .collect()
    }

    fn pick_fallback(&self, decision: &recovery::RecoveryDecision, tried: &[String]) -> Option<(String, Arc<dyn BackendCapabilities>)> {
        let by_name = decision
            .fallback_name
            .as_ref()
            .and_then(|name| self.fallbacks.iter().find(|f| &f.provider.name == name && !tried.contains(name)));

        let chosen = by_name.or_else(|| {
            let remaining = self.remaining_fallback_providers(tried);
            let candidate = recovery::choose_fallback_provider(&remaining)?;
            self.fallbacks.iter().find(|f| f.provider.name == candidate.name)
        })?;

        Some((chosen.provider.name.clone(), Arc::clone(&chosen.backend)))
    }

    async fn recover_from_quality(
        &self,
        _ctx: &CancellationToken,
        name: &str,
        assessment: &QualityAssessment,
        response: &RunResponse,
        tried_fallbacks: &mut Vec<String>,
    ) -> Option<(String, Arc<dyn BackendCapabilities>)> {
        self.learning_sink.record(LearningRecord {
            provider: name.to_string(),
            model: response.model.clone(),
            reason: assessment.reason.clone(),
            note: assessment.issue_type.map(|k| format!("{k:?}")),
            recorded_at: Utc::now(),
        });
        tried_fallbacks.push(name.to_string());
        let remaining = self.remaining_fallback_providers(tried_fallbacks.as_slice());
        let candidate = recovery::choose_fallback_provider(&remaining)?;
        let backend = self.fallbacks.iter().find(|f| f.provider.name == candidate.name)?;
        Some((backend.provider.name.clone(), Arc::clone(&backend.backend)))
    }
}

fn empty_response() -> RunResponse {
    RunResponse {
        message: String::new(),
        steps: Vec::new(),
        tools_used: Vec::new(),
        completed: false,
        steps_count: 0,
        provider: "none".to_string(),
        model: "none".to_string(),
        tokens_used: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::health::HealthStatus;
    use async_trait::async_trait;
    use std::time::Duration;

    fn provider(name: &str, priority: u32, credential: Option<&str>) -> FallbackProvider {
        FallbackProvider {
            name: name.to_string(),
            model: format!("{name}-model"),
            credential: credential.map(|c| c.to_string()),
            priority,
        }
    }

    #[test]
    fn remaining_providers_excludes_already_tried() {
        struct StubProbe;
        #[async_trait]
        impl HealthProbe for StubProbe {
            async fn probe(&self, _ctx: CancellationToken) -> HealthStatus {
                HealthStatus {
                    available: true,
                    response_time: Duration::from_millis(1),
                    models_loaded: vec![],
                    error: None,
                    checked_at: chrono::Utc::now(),
                    server_version: None,
                }
            }
        }

        struct StubBackend;
        #[async_trait]
        impl crate::agent::backend::LlmBackend for StubBackend {
            fn model(&self) -> &str {
                "stub"
            }
            fn provider_name(&self) -> &str {
                "stub"
            }
            async fn chat(
                &self,
                _ctx: CancellationToken,
                _messages: &[ChatMessage],
                _system_prompt: &str,
                _options: &crate::agent::types::GenerationOptions,
            ) -> crate::error::Result<String> {
                Ok("hi".to_string())
            }
        }
        impl BackendCapabilities for StubBackend {}

        let dispatcher = ResilientDispatcher {
            primary: Arc::new(StubBackend),
            primary_probe: Arc::new(StubProbe),
            fallbacks: vec![
                FallbackBackend { provider: provider("a", 0, Some("k")), backend: Arc::new(StubBackend), probe: Arc::new(StubProbe) },
                FallbackBackend { provider: provider("b", 1, Some("k")), backend: Arc::new(StubBackend), probe: Arc::new(StubProbe) },
            ],
            tools: Arc::new(ToolRegistry::new()),
            checkpoint_handler: None,
            supervised: SupervisedConfig::default(),
            prompt_composer: Arc::new(PromptComposer::new(Box::new(crate::agent::prompt::EmptyTemplateStore))),
            observer: Arc::new(crate::agent::types::NoOpObserver),
            cwd: PathBuf::from("."),
            persona: None,
            user_facts: None,
            unrestricted: false,
            knowledge: Vec::new(),
            max_steps: None,
            learning_sink: Arc::new(NoOpLearningSink),
        };

        let remaining = dispatcher.remaining_fallback_providers(&["a".to_string()]);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "b");
    }

    #[test]
    fn no_op_learning_sink_drops_records() {
        let sink = NoOpLearningSink;
        sink.record(LearningRecord {
            provider: "x".to_string(),
            model: "y".to_string(),
            reason: "z".to_string(),
            note: None,
            recorded_at: Utc::now(),
        });
    }
}
