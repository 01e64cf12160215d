//! Recovery Analyzer (§4.J).
//!
//! Classifies a failure using the probed backend health and a snapshot of
//! run progress, then chooses retry / wait_and_retry / fallback / abort.
//! New component; grounded in the teacher's tiered fallback selection in
//! `client.rs` (scanning an ordered provider list for one with a
//! credential), generalised into a full decision table.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::health::HealthStatus;
use crate::error::ErrorKind;

/// Snapshot of one run's progress, fed to the analyzer alongside the
/// failure that triggered it.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task: String,
    pub steps_completed: u32,
    pub distinct_tools_used: u32,
    pub elapsed: Duration,
    pub conversation_size: u32,
    pub last_tool_output: Option<String>,
}

/// Coarse complexity band derived from a `TaskContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Sum the weighted signals from §4.J and bucket the result.
pub fn complexity_score(ctx: &TaskContext) -> u32 {
    let mut score = 0;
    score += if ctx.steps_completed > 5 {
        2
    } else if ctx.steps_completed > 2 {
        1
    } else {
        0
    };
    score += if ctx.conversation_size > 20 {
        2
    } else if ctx.conversation_size > 10 {
        1
    } else {
        0
    };
    score += if ctx.distinct_tools_used > 3 {
        2
    } else if ctx.distinct_tools_used > 1 {
        1
    } else {
        0
    };
    score += if ctx.task.chars().count() > 200 { 1 } else { 0 };
    score
}

pub fn complexity_band(ctx: &TaskContext) -> Complexity {
    let score = complexity_score(ctx);
    if score >= 5 {
        Complexity::Complex
    } else if score >= 2 {
        Complexity::Moderate
    } else {
        Complexity::Simple
    }
}

/// What the dispatcher should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Retry,
    WaitAndRetry,
    Fallback,
    Simplify,
    Abort,
}

/// The analyzer's verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryDecision {
    pub action: RecoveryAction,
    pub reason: String,
    pub fallback_name: Option<String>,
    pub fallback_model: Option<String>,
    pub wait_duration: Option<Duration>,
    pub should_learn: bool,
    pub learning_note: Option<String>,
}

impl RecoveryDecision {
    fn retry(reason: impl Into<String>) -> Self {
        RecoveryDecision {
            action: RecoveryAction::Retry,
            reason: reason.into(),
            fallback_name: None,
            fallback_model: None,
            wait_duration: None,
            should_learn: false,
            learning_note: None,
        }
    }

    fn wait_and_retry(reason: impl Into<String>, wait: Duration) -> Self {
        RecoveryDecision {
            action: RecoveryAction::WaitAndRetry,
            reason: reason.into(),
            fallback_name: None,
            fallback_model: None,
            wait_duration: Some(wait),
            should_learn: false,
            learning_note: None,
        }
    }

    fn fallback(reason: impl Into<String>, provider: Option<&FallbackProvider>) -> Self {
        RecoveryDecision {
            action: RecoveryAction::Fallback,
            reason: reason.into(),
            fallback_name: provider.map(|p| p.name.clone()),
            fallback_model: provider.map(|p| p.model.clone()),
            wait_duration: None,
            should_learn: true,
            learning_note: None,
        }
    }
}

const WAIT_AND_RETRY_DURATION: Duration = Duration::from_secs(10);
const SLOW_RESPONSE_THRESHOLD: Duration = Duration::from_secs(2);

/// An ordered fallback candidate. Lowest `priority` is tried first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackProvider {
    pub name: String,
    pub model: String,
    pub credential: Option<String>,
    pub priority: u32,
}

/// Pick the first configured fallback with a non-empty credential.
pub fn choose_fallback_provider(providers: &[FallbackProvider]) -> Option<&FallbackProvider> {
    let mut sorted: Vec<&FallbackProvider> = providers.iter().collect();
    sorted.sort_by_key(|p| p.priority);
    sorted
        .into_iter()
        .find(|p| p.credential.as_deref().is_some_and(|c| !c.is_empty()))
}

/// Apply the §4.J decision table.
pub fn analyze(
    health: &HealthStatus,
    task_ctx: &TaskContext,
    providers: &[FallbackProvider],
) -> RecoveryDecision {
    let chosen = choose_fallback_provider(providers);

    if !health.available {
        let reason = match health.error_kind() {
            Some(ErrorKind::Other) if health.error.as_deref().unwrap_or("").to_lowercase().contains("connection refused") => {
                "primary not running"
            }
            Some(ErrorKind::TimeoutLike) => "network",
            _ => "backend unavailable",
        };
        return RecoveryDecision::fallback(reason, chosen);
    }

    let band = complexity_band(task_ctx);
    match band {
        Complexity::Complex => RecoveryDecision::fallback("task too complex for primary; escalating to frontier", chosen),
        Complexity::Moderate if health.response_time > SLOW_RESPONSE_THRESHOLD => {
            RecoveryDecision::wait_and_retry("primary responding slowly", WAIT_AND_RETRY_DURATION)
        }
        Complexity::Moderate => RecoveryDecision::fallback("moderate complexity task", chosen),
        Complexity::Simple => RecoveryDecision::retry("transient error on a simple task"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(steps: u32, conv: u32, tools: u32, task_len: usize) -> TaskContext {
        TaskContext {
            task: "x".repeat(task_len),
            steps_completed: steps,
            distinct_tools_used: tools,
            elapsed: Duration::from_secs(1),
            conversation_size: conv,
            last_tool_output: None,
        }
    }

    #[test]
    fn complexity_bands_match_table_boundaries() {
        assert_eq!(complexity_band(&ctx(0, 0, 0, 0)), Complexity::Simple);
        assert_eq!(complexity_band(&ctx(3, 0, 0, 0)), Complexity::Moderate);
        assert_eq!(complexity_band(&ctx(6, 21, 4, 201)), Complexity::Complex);
    }

    fn available(response_time: Duration) -> HealthStatus {
        HealthStatus {
            available: true,
            response_time,
            models_loaded: vec![],
            error: None,
            checked_at: chrono::Utc::now(),
            server_version: None,
        }
    }

    fn unavailable(error: &str) -> HealthStatus {
        HealthStatus {
            available: false,
            response_time: Duration::from_secs(5),
            models_loaded: vec![],
            error: Some(error.to_string()),
            checked_at: chrono::Utc::now(),
            server_version: None,
        }
    }

    #[test]
    fn connection_refused_falls_back_with_not_running_reason() {
        let decision = analyze(&unavailable("connection refused"), &ctx(0, 0, 0, 0), &[]);
        assert_eq!(decision.action, RecoveryAction::Fallback);
        assert_eq!(decision.reason, "primary not running");
    }

    #[test]
    fn complex_task_escalates_to_fallback() {
        let decision = analyze(&available(Duration::from_millis(100)), &ctx(6, 21, 4, 201), &[]);
        assert_eq!(decision.action, RecoveryAction::Fallback);
    }

    #[test]
    fn slow_moderate_task_waits_and_retries() {
        let decision = analyze(&available(Duration::from_secs(3)), &ctx(3, 0, 0, 0), &[]);
        assert_eq!(decision.action, RecoveryAction::WaitAndRetry);
        assert_eq!(decision.wait_duration, Some(WAIT_AND_RETRY_DURATION));
        assert!(!decision.should_learn);
    }

    #[test]
    fn simple_task_retries_without_learning() {
        let decision = analyze(&available(Duration::from_millis(50)), &ctx(0, 0, 0, 0), &[]);
        assert_eq!(decision.action, RecoveryAction::Retry);
        assert!(!decision.should_learn);
    }

    #[test]
    fn fallback_picks_first_provider_with_credential() {
        let providers = vec![
            FallbackProvider { name: "a".into(), model: "m-a".into(), credential: None, priority: 0 },
            FallbackProvider { name: "b".into(), model: "m-b".into(), credential: Some("key".into()), priority: 1 },
        ];
        let chosen = choose_fallback_provider(&providers).unwrap();
        assert_eq!(chosen.name, "b");
    }
}
