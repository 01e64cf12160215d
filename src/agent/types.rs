//! Core data model shared by every component of the agentic loop: chat
//! messages, tool calls/results, steps, step events, and the final
//! `RunResponse` that a `Run` invocation returns.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Role of a message in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One message in the conversation. Ordered, immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::Assistant, content: content.into() }
    }

    /// A tool result is always represented as a `user` message containing
    /// a delimited block, never a dedicated `tool` role message.
    pub fn tool_result_block(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::User, content: content.into() }
    }
}

/// A tool invocation extracted by the parser. `params` maps string keys to
/// string values only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub params: HashMap<String, String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, params: HashMap<String, String>) -> Self {
        ToolCall { name: name.into(), params }
    }

    /// Canonical JSON encoding of `params` with keys sorted — the basis of
    /// the loop detector's signature (`"<tool_name>:<canonical-JSON>"`).
    pub fn params_canonical_json(&self) -> String {
        let mut keys: Vec<&String> = self.params.keys().collect();
        keys.sort();
        let map: serde_json::Map<String, serde_json::Value> = keys
            .into_iter()
            .map(|k| (k.clone(), serde_json::Value::String(self.params[k].clone())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

/// The outcome of executing one [`ToolCall`]. `error` is non-empty iff
/// `success` is false.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub success: bool,
    pub output: String,
    pub error: String,
}

impl ToolResult {
    pub fn success(tool_name: impl Into<String>, output: impl Into<String>) -> Self {
        ToolResult {
            tool_name: tool_name.into(),
            success: true,
            output: output.into(),
            error: String::new(),
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>) -> Self {
        ToolResult {
            tool_name: tool_name.into(),
            success: false,
            output: String::new(),
            error: error.into(),
        }
    }
}

/// One iteration of the agentic loop. A step always has a thought; a
/// non-terminal step has both a call and a result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub thought: String,
    pub tool_call: Option<ToolCall>,
    pub tool_result: Option<ToolResult>,
}

impl Step {
    pub fn terminal(thought: impl Into<String>) -> Self {
        Step { thought: thought.into(), tool_call: None, tool_result: None }
    }

    pub fn with_tool(thought: impl Into<String>, call: ToolCall, result: ToolResult) -> Self {
        Step { thought: thought.into(), tool_call: Some(call), tool_result: Some(result) }
    }
}

/// Kind of a [`StepEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepEventKind {
    Thinking,
    Streaming,
    ToolCall,
    ToolResult,
    Complete,
    Error,
    LoopExit,
    Checkpoint,
    Recovery,
}

/// A single event emitted to an optional observer during a run, in strict
/// order: a `tool_call` event for step _k_ is always followed by its
/// `tool_result` before any event for step _k+1_.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub kind: StepEventKind,
    pub step_index: u32,
    pub message: String,
    pub tool_name: Option<String>,
    pub tool_input: Option<String>,
    pub output: Option<String>,
    pub success: Option<bool>,
    pub error: Option<String>,
}

impl StepEvent {
    pub fn new(kind: StepEventKind, step_index: u32, message: impl Into<String>) -> Self {
        StepEvent {
            kind,
            step_index,
            message: message.into(),
            tool_name: None,
            tool_input: None,
            output: None,
            success: None,
            error: None,
        }
    }

    pub fn tool_call(step_index: u32, name: &str, input: &str) -> Self {
        StepEvent {
            tool_name: Some(name.to_string()),
            tool_input: Some(input.to_string()),
            ..StepEvent::new(StepEventKind::ToolCall, step_index, format!("Calling {name}"))
        }
    }

    pub fn tool_result(step_index: u32, result: &ToolResult, output_preview: &str) -> Self {
        StepEvent {
            tool_name: Some(result.tool_name.clone()),
            output: Some(output_preview.to_string()),
            success: Some(result.success),
            error: if result.success { None } else { Some(result.error.clone()) },
            ..StepEvent::new(
                StepEventKind::ToolResult,
                step_index,
                format!("{} finished", result.tool_name),
            )
        }
    }
}

/// Observes step events as a run progresses. Non-blocking contract: an
/// implementor must not perform long-running work inline.
pub trait StepObserver: Send + Sync {
    fn on_step(&self, event: StepEvent);
}

/// Drops every event; used when no caller-supplied observer is registered.
pub struct NoOpObserver;

impl StepObserver for NoOpObserver {
    fn on_step(&self, _event: StepEvent) {}
}

/// The final outcome of one `Run` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub message: String,
    pub steps: Vec<Step>,
    pub tools_used: Vec<String>,
    pub completed: bool,
    pub steps_count: u32,
    pub provider: String,
    pub model: String,
    pub tokens_used: u32,
}

/// Sampling / generation knobs for a single LLM call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub stop: Option<Vec<String>>,
}

impl GenerationOptions {
    pub fn balanced() -> Self {
        GenerationOptions { temperature: Some(0.5), ..Default::default() }
    }
}

/// Token usage accumulated over the course of a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn accumulate(&mut self, delta: Usage) {
        self.prompt_tokens += delta.prompt_tokens;
        self.completion_tokens += delta.completion_tokens;
        self.total_tokens += delta.total_tokens;
    }
}

/// Correlates log lines and step events across one `Run` invocation.
pub type RunId = Uuid;

/// Generate a fresh [`RunId`].
pub fn new_run_id() -> RunId {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_json_is_order_independent() {
        let mut a = HashMap::new();
        a.insert("b".to_string(), "2".to_string());
        a.insert("a".to_string(), "1".to_string());
        let mut b = HashMap::new();
        b.insert("a".to_string(), "1".to_string());
        b.insert("b".to_string(), "2".to_string());
        let call_a = ToolCall::new("search_files", a);
        let call_b = ToolCall::new("search_files", b);
        assert_eq!(call_a.params_canonical_json(), call_b.params_canonical_json());
    }

    #[test]
    fn tool_result_constructors_set_flags() {
        let ok = ToolResult::success("read_file", "hello");
        assert!(ok.success);
        assert!(ok.error.is_empty());

        let err = ToolResult::failure("read_file", "not found");
        assert!(!err.success);
        assert_eq!(err.error, "not found");
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total.accumulate(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 });
        total.accumulate(Usage { prompt_tokens: 20, completion_tokens: 10, total_tokens: 30 });
        assert_eq!(total.total_tokens, 45);
    }
}
