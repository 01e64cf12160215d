//! Checkpoint Arbiter (§4.D).
//!
//! Interposes a user decision between the Loop Detector's signal (or a
//! step-budget exhaustion, tool error, or long wall-time) and the loop's
//! next action. New component with no single teacher analogue; grounded
//! in the teacher's callback-trait idiom (`LoopCallback` in
//! `agentic_loop.rs`) generalised from a fire-and-forget observer to a
//! request/response arbiter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Why a checkpoint was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    LoopDetected,
    StepLimit,
    ToolError,
    EmptyResults,
    ComplexTask,
    CostThreshold,
    UserRequested,
    LongRunning,
}

/// What the caller decided to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointAction {
    Continue,
    Guide,
    Simplify,
    Abort,
    Escalate,
    Retry,
    Wait,
    DifferentApproach,
}

/// One option offered to the handler for a given reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointOption {
    pub key: char,
    pub action: CheckpointAction,
    pub label: String,
    /// Extra step budget this option would grant, if relevant.
    pub additional_steps: Option<u32>,
}

impl CheckpointOption {
    fn new(key: char, action: CheckpointAction, label: &str) -> Self {
        CheckpointOption { key, action, label: label.to_string(), additional_steps: None }
    }

    fn with_steps(key: char, action: CheckpointAction, label: &str, steps: u32) -> Self {
        CheckpointOption {
            key,
            action,
            label: label.to_string(),
            additional_steps: Some(steps),
        }
    }
}

/// The minimum-viable option set per reason (§4.D table). Reasons outside
/// the table (`complex_task`, `cost_threshold`, `user_requested`) get the
/// generic guide/escalate/abort set — an Open Question decision recorded
/// in DESIGN.md, since the source table does not name a row for them.
pub fn default_options(reason: CheckpointReason) -> Vec<CheckpointOption> {
    use CheckpointAction::*;
    use CheckpointReason::*;
    match reason {
        LoopDetected | EmptyResults => vec![
            CheckpointOption::with_steps('c', Continue, "Continue with 5 more steps", 5),
            CheckpointOption::new('g', Guide, "Provide guidance"),
            CheckpointOption::new('a', Abort, "Abort the task"),
            CheckpointOption::new('e', Escalate, "Escalate to a more capable backend"),
        ],
        ToolError => vec![
            CheckpointOption::new('r', Retry, "Retry the last tool call"),
            CheckpointOption::new('c', Continue, "Continue"),
            CheckpointOption::new('g', Guide, "Provide guidance"),
            CheckpointOption::new('a', Abort, "Abort the task"),
        ],
        StepLimit => vec![
            CheckpointOption::with_steps('c', Continue, "Continue with 10 more steps", 10),
            CheckpointOption::new('g', Guide, "Provide guidance"),
            CheckpointOption::new('a', Abort, "Abort the task"),
        ],
        LongRunning => vec![
            CheckpointOption::new('w', Wait, "Wait and reset the timer"),
            CheckpointOption::new('d', DifferentApproach, "Try a simpler approach"),
            CheckpointOption::new('e', Escalate, "Escalate to a more capable backend"),
            CheckpointOption::new('a', Abort, "Abort the task"),
        ],
        ComplexTask | CostThreshold | UserRequested => vec![
            CheckpointOption::new('g', Guide, "Provide guidance"),
            CheckpointOption::new('e', Escalate, "Escalate to a more capable backend"),
            CheckpointOption::new('a', Abort, "Abort the task"),
        ],
    }
}

/// A snapshot of run state presented to the handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub reason: CheckpointReason,
    pub reason_message: String,
    pub steps_run: u32,
    pub steps_max: u32,
    pub last_action: Option<String>,
    pub last_error: Option<String>,
    pub progress: Vec<String>,
    pub tools_used: Vec<String>,
    pub tokens_used: u32,
    pub options: Vec<CheckpointOption>,
}

impl Checkpoint {
    pub fn new(
        reason: CheckpointReason,
        reason_message: impl Into<String>,
        steps_run: u32,
        steps_max: u32,
    ) -> Self {
        Checkpoint {
            reason,
            reason_message: reason_message.into(),
            steps_run,
            steps_max,
            last_action: None,
            last_error: None,
            progress: Vec::new(),
            tools_used: Vec::new(),
            tokens_used: 0,
            options: default_options(reason),
        }
    }
}

/// The handler's decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointResponse {
    pub action: CheckpointAction,
    pub guidance: Option<String>,
    pub additional_steps: Option<u32>,
}

impl CheckpointResponse {
    pub fn action(action: CheckpointAction) -> Self {
        CheckpointResponse { action, guidance: None, additional_steps: None }
    }

    pub fn continue_with(additional_steps: u32) -> Self {
        CheckpointResponse {
            action: CheckpointAction::Continue,
            guidance: None,
            additional_steps: Some(additional_steps),
        }
    }

    pub fn guide(text: impl Into<String>) -> Self {
        CheckpointResponse {
            action: CheckpointAction::Guide,
            guidance: Some(text.into()),
            additional_steps: None,
        }
    }
}

/// Consults a user (or automated supervisor) at a checkpoint. May block;
/// returning `Ok(None)` means abort.
#[async_trait]
pub trait CheckpointHandler: Send + Sync {
    async fn handle(
        &self,
        ctx: CancellationToken,
        checkpoint: Checkpoint,
    ) -> Result<Option<CheckpointResponse>>;
}

/// Overall supervision mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgenticMode {
    Supervised,
    Autonomous,
    Disabled,
}

/// Per-run configuration of which triggers actually open a checkpoint.
/// In `autonomous` mode the arbiter short-circuits to `None` regardless
/// of these bits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedConfig {
    pub mode: AgenticMode,
    pub step_limit: u32,
    pub checkpoint_on_loop: bool,
    pub checkpoint_on_error: bool,
    pub checkpoint_on_step_limit: bool,
    pub auto_escalate_on_loop: bool,
    pub cost_checkpoint_tokens: Option<u32>,
    pub long_running_timeout_secs: u64,
}

impl Default for SupervisedConfig {
    fn default() -> Self {
        SupervisedConfig {
            mode: AgenticMode::Supervised,
            step_limit: 12,
            checkpoint_on_loop: true,
            checkpoint_on_error: true,
            checkpoint_on_step_limit: true,
            auto_escalate_on_loop: false,
            cost_checkpoint_tokens: None,
            long_running_timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_detected_options_match_table() {
        let opts = default_options(CheckpointReason::LoopDetected);
        let keys: Vec<char> = opts.iter().map(|o| o.key).collect();
        assert_eq!(keys, vec!['c', 'g', 'a', 'e']);
        assert_eq!(opts[0].additional_steps, Some(5));
    }

    #[test]
    fn step_limit_grants_ten_more_steps() {
        let opts = default_options(CheckpointReason::StepLimit);
        let continue_opt = opts.iter().find(|o| o.action == CheckpointAction::Continue).unwrap();
        assert_eq!(continue_opt.additional_steps, Some(10));
    }
}
