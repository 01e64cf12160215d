//! Quality Gate (§4.H).
//!
//! A post-hoc heuristic classifying a completed run's response as one of
//! several known regressions before declaring success. New module; per
//! the Design Notes ("isolate free-form lowercase string matching"), every
//! phrase list is a `const` slice, never matched ad hoc inline.

use serde::{Deserialize, Serialize};

/// The kind of regression detected, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    EmptyResponse,
    EchoResponse,
    NoTools,
    Refusal,
    Prediction,
    Repetitive,
    Shallow,
}

/// Outcome of applying the gate to one completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub should_fallback: bool,
    pub reason: String,
    pub score: u8,
    pub issue_type: Option<IssueKind>,
}

impl QualityAssessment {
    fn pass() -> Self {
        QualityAssessment { should_fallback: false, reason: "ok".to_string(), score: 100, issue_type: None }
    }

    fn fail(issue: IssueKind, score: u8, reason: impl Into<String>) -> Self {
        QualityAssessment {
            should_fallback: true,
            reason: reason.into(),
            score,
            issue_type: Some(issue),
        }
    }
}

const REFUSAL_PHRASES: &[&str] = &[
    "i can't help with that",
    "i cannot execute commands",
    "i can't execute commands",
    "i am not able to run",
    "i'm not able to run",
    "you would need to run this yourself",
    "i don't have the ability to execute",
    "i do not have the ability to execute",
];

const CAPABILITY_QUESTION_WHITELIST: &[&str] =
    &["speak", "language", "translate", "vision", "see images", "hear audio"];

const PREDICTION_PHRASES: &[&str] =
    &["the output will be", "this will output", "would result in", "the result would be"];

const PATH_PREFIXES: &[&str] = &["/", "./", "~/"];

const CLI_PREFIXES: &[&str] =
    &["git ", "npm ", "docker ", "sqlite3 ", "cargo ", "pip ", "kubectl ", "curl ", "ls ", "cd "];

const SHELL_OPERATORS: &[&str] =
    &["&&", "||", "|", ";", "$(", "${", "> ", ">>", "2>&1"];

const IMPERATIVE_VERBS: &[&str] = &[
    "run ", "list ", "install ", "analyse ", "analyze ", "delete ", "create ", "build ",
    "execute ", "search for",
];

const TOPICAL_QUESTION_PATTERNS: &[&str] =
    &["weather", "news", "stock price", "stock quote", "forecast"];

const SHALLOW_INDICATORS: &[&str] = &["and then", "step 1", "refactor", "implement"];
const SENTENCE_ENDERS: &[char] = &['.', '!', '?'];

const MIN_REPETITIVE_LEN: usize = 100;
const MIN_SHALLOW_COMPLEXITY_LEN: usize = 200;
const MAX_SHALLOW_RESPONSE_LEN: usize = 50;

/// Apply the gate to a completed run.
pub fn assess(request: &str, response: &str, tool_called: bool) -> QualityAssessment {
    let trimmed = response.trim();

    if trimmed.chars().count() < 20 {
        return QualityAssessment::fail(IssueKind::EmptyResponse, 5, "response shorter than 20 characters");
    }

    if is_echo_response(request, trimmed) {
        return QualityAssessment::fail(
            IssueKind::EchoResponse,
            10,
            "response echoes the request without adding information",
        );
    }

    if !tool_called && looks_like_command(request) {
        return QualityAssessment::fail(
            IssueKind::NoTools,
            15,
            "request looks actionable but no tool was invoked",
        );
    }

    if is_refusal(trimmed) {
        return QualityAssessment::fail(IssueKind::Refusal, 20, "response refuses to execute the task");
    }

    if is_prediction(trimmed) {
        return QualityAssessment::fail(
            IssueKind::Prediction,
            25,
            "response predicts tool output instead of invoking a tool",
        );
    }

    if is_repetitive(trimmed) {
        return QualityAssessment::fail(IssueKind::Repetitive, 30, "response repeats the same phrase or line");
    }

    if is_shallow(request, trimmed, tool_called) {
        return QualityAssessment::fail(
            IssueKind::Shallow,
            35,
            "request is complex but response is short with no tool use",
        );
    }

    QualityAssessment::pass()
}

fn is_echo_response(request: &str, response: &str) -> bool {
    let request = request.trim();
    if request.chars().count() < 20 {
        return false;
    }
    if response.chars().count() as f64 > 2.0 * request.chars().count() as f64 {
        return false;
    }
    let request_lower = request.to_lowercase();
    let prefix: String = request_lower.chars().take(50).collect();
    prefix.contains(&response.to_lowercase())
}

fn looks_like_command(request: &str) -> bool {
    let lower = request.to_lowercase();
    PATH_PREFIXES.iter().any(|p| lower.contains(p))
        || CLI_PREFIXES.iter().any(|p| lower.contains(p))
        || SHELL_OPERATORS.iter().any(|p| lower.contains(p))
        || IMPERATIVE_VERBS.iter().any(|p| lower.contains(p))
        || TOPICAL_QUESTION_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_refusal(response: &str) -> bool {
    let lower = response.to_lowercase();
    if CAPABILITY_QUESTION_WHITELIST.iter().any(|w| lower.contains(w)) {
        return false;
    }
    REFUSAL_PHRASES.iter().any(|p| lower.contains(p))
}

fn is_prediction(response: &str) -> bool {
    let lower = response.to_lowercase();
    if PREDICTION_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    let has_fenced_block = lower.contains("```");
    let has_output_label = lower.contains("output:") || lower.contains("result:");
    let has_tool_marker = response.contains("<tool>");
    has_fenced_block && has_output_label && !has_tool_marker
}

fn is_repetitive(response: &str) -> bool {
    if response.chars().count() < MIN_REPETITIVE_LEN {
        return false;
    }

    let words: Vec<&str> = response.split_whitespace().collect();
    if words.len() >= 3 {
        let mut counts = std::collections::HashMap::new();
        for window in words.windows(3) {
            let phrase = window.join(" ");
            if phrase.len() > 15 {
                *counts.entry(phrase).or_insert(0u32) += 1;
            }
        }
        if counts.values().any(|&c| c >= 3) {
            return true;
        }
    }

    let mut line_counts = std::collections::HashMap::new();
    for line in response.lines() {
        let line = line.trim();
        if line.len() > 20 {
            *line_counts.entry(line.to_string()).or_insert(0u32) += 1;
        }
    }
    line_counts.values().any(|&c| c >= 3)
}

fn request_is_complex(request: &str) -> bool {
    let lower = request.to_lowercase();
    if SHALLOW_INDICATORS.iter().any(|p| lower.contains(p)) {
        return true;
    }
    let sentence_enders = request.chars().filter(|c| SENTENCE_ENDERS.contains(c)).count();
    sentence_enders >= 2 || request.chars().count() > MIN_SHALLOW_COMPLEXITY_LEN
}

fn is_shallow(request: &str, response: &str, tool_called: bool) -> bool {
    request_is_complex(request)
        && response.chars().count() < MAX_SHALLOW_RESPONSE_LEN
        && !tool_called
}
