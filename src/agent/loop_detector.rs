//! Loop Detector (§4.C).
//!
//! Tracks the last N call signatures and a streak of "effectively empty"
//! tool results, so the Agentic Loop can recognise a futile reasoning
//! cycle and hand control to the Checkpoint Arbiter. Generalises the
//! teacher's `LoopGuard` (single "N identical results in a row" policy)
//! into the spec's two independent signals: a signature appearing twice
//! in the ring buffer, and three consecutive empty results.

use std::collections::VecDeque;

use crate::agent::types::{ToolCall, ToolResult};

const DEFAULT_BUFFER_SIZE: usize = 5;
const EMPTY_RESULT_THRESHOLD: u32 = 3;

const EMPTY_PHRASES: &[&str] = &[
    "no files found",
    "not found",
    "no results",
    "no matches",
    "empty",
    "0 results",
    "nothing found",
];

/// Why the detector interrupted the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopTrigger {
    LoopDetected { reason: String },
    EmptyResults { reason: String },
}

impl LoopTrigger {
    pub fn reason(&self) -> &str {
        match self {
            LoopTrigger::LoopDetected { reason } | LoopTrigger::EmptyResults { reason } => reason,
        }
    }
}

/// Pure function of a [`ToolCall`]: `"<tool_name>:<canonical-JSON>"`.
pub fn loop_signature(call: &ToolCall) -> String {
    format!("{}:{}", call.name, call.params_canonical_json())
}

/// Per-run ring buffer of recent signatures plus a consecutive-empty-result
/// counter. No two concurrent runs share a `LoopState`.
pub struct LoopState {
    signatures: VecDeque<String>,
    capacity: usize,
    empty_streak: u32,
}

impl LoopState {
    pub fn new(capacity: usize) -> Self {
        LoopState {
            signatures: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            empty_streak: 0,
        }
    }

    /// Record one call+result pair and evaluate both triggers. Loop
    /// detection takes priority: a signal is returned on the first
    /// condition met.
    pub fn record(&mut self, call: &ToolCall, result: &ToolResult) -> Option<LoopTrigger> {
        let signature = loop_signature(call);
        self.signatures.push_back(signature.clone());
        while self.signatures.len() > self.capacity {
            self.signatures.pop_front();
        }

        let occurrences = self.signatures.iter().filter(|s| **s == signature).count();
        if occurrences >= 2 {
            return Some(LoopTrigger::LoopDetected {
                reason: format!(
                    "the tool call `{signature}` has appeared {occurrences} times in the last {} calls",
                    self.signatures.len()
                ),
            });
        }

        if is_effectively_empty(result) {
            self.empty_streak += 1;
            if self.empty_streak >= EMPTY_RESULT_THRESHOLD {
                return Some(LoopTrigger::EmptyResults {
                    reason: format!(
                        "the last {} tool results were effectively empty",
                        self.empty_streak
                    ),
                });
            }
        } else {
            self.empty_streak = 0;
        }

        None
    }

    /// Reset after the caller grants guidance or additional steps.
    pub fn reset(&mut self) {
        self.signatures.clear();
        self.empty_streak = 0;
    }
}

impl Default for LoopState {
    fn default() -> Self {
        LoopState::new(DEFAULT_BUFFER_SIZE)
    }
}

fn is_effectively_empty(result: &ToolResult) -> bool {
    if !result.success {
        return true;
    }
    let output = result.output.trim();
    if output.is_empty() || output.len() < 10 {
        return true;
    }
    let lower = output.to_lowercase();
    EMPTY_PHRASES.iter().any(|phrase| lower.contains(phrase))
}
