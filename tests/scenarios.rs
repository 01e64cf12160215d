//! End-to-end scenarios (spec.md/SPEC_FULL.md §8 "concrete end-to-end
//! scenarios"), each driven through a scripted, queue-based `LlmBackend`.
//! Grounded in the `MockProvider` pattern from
//! `other_examples/e301f6c9_zverozabr-zeroclaw__tests-agent_loop_robustness.rs.rs`:
//! a mutex-guarded queue of canned replies consumed in call order, falling
//! back to a default reply once exhausted.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use agentcore::agent::prompt::EmptyTemplateStore;
use agentcore::agent::{
    format_tool_call, AgenticMode, BackendCapabilities, Checkpoint, CheckpointAction,
    CheckpointHandler, CheckpointResponse, ChatMessage, FallbackBackend, FallbackProvider,
    GenerationOptions, HealthProbe, HealthStatus, LearningRecord, LearningSink, LlmBackend,
    NoOpLearningSink, NoOpObserver, PromptComposer, ResilientDispatcher, RunOutcome, StepEvent,
    StepEventKind, StepObserver, SupervisedConfig, ToolCall,
};
use agentcore::agent::run::Agent;
use agentcore::error::{Error, Result};
use agentcore::tools::{ListDirectoryTool, ReadFileTool, SearchFilesTool, ToolRegistry};

/// One scripted reply: either a turn's raw text, or a simulated backend
/// failure.
enum Reply {
    Text(String),
    Err(String),
}

/// A chat backend that yields scripted replies in order, then repeats a
/// default once the queue is empty.
struct ScriptedBackend {
    name: String,
    model: String,
    queue: Mutex<VecDeque<Reply>>,
}

impl ScriptedBackend {
    fn new(name: &str, model: &str, replies: Vec<Reply>) -> Self {
        ScriptedBackend { name: name.to_string(), model: model.to_string(), queue: Mutex::new(replies.into()) }
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        _ctx: CancellationToken,
        _messages: &[ChatMessage],
        _system_prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String> {
        match self.queue.lock().unwrap().pop_front() {
            Some(Reply::Text(t)) => Ok(t),
            Some(Reply::Err(e)) => Err(Error::Backend(e)),
            None => Ok("Done.".to_string()),
        }
    }
}

impl BackendCapabilities for ScriptedBackend {}

/// A health probe with a fixed, caller-chosen verdict.
struct StaticProbe {
    available: bool,
    response_time: Duration,
}

#[async_trait]
impl HealthProbe for StaticProbe {
    async fn probe(&self, _ctx: CancellationToken) -> HealthStatus {
        HealthStatus {
            available: self.available,
            response_time: self.response_time,
            models_loaded: Vec::new(),
            error: None,
            checked_at: chrono::Utc::now(),
            server_version: None,
        }
    }
}

/// Captures every `StepEvent` emitted during a run, in order.
#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<StepEvent>>,
}

impl StepObserver for RecordingObserver {
    fn on_step(&self, event: StepEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// A checkpoint handler that always returns the same scripted response.
struct ScriptedCheckpointHandler(CheckpointResponse);

#[async_trait]
impl CheckpointHandler for ScriptedCheckpointHandler {
    async fn handle(&self, _ctx: CancellationToken, _checkpoint: Checkpoint) -> Result<Option<CheckpointResponse>> {
        Ok(Some(self.0.clone()))
    }
}

/// Captures every learning record handed to it.
#[derive(Default)]
struct CapturingLearningSink {
    records: Mutex<Vec<LearningRecord>>,
}

impl LearningSink for CapturingLearningSink {
    fn record(&self, note: LearningRecord) {
        self.records.lock().unwrap().push(note);
    }
}

fn tool_call_text(name: &str, params: &[(&str, &str)]) -> String {
    let map: HashMap<String, String> = params.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    format_tool_call(&ToolCall::new(name, map))
}

fn bare_agent(backend: Arc<dyn BackendCapabilities>, tools: ToolRegistry, cwd: PathBuf, max_steps: u32) -> Agent {
    Agent {
        backend,
        tools: Arc::new(tools),
        checkpoint_handler: None,
        supervised: SupervisedConfig::default(),
        prompt_composer: Arc::new(PromptComposer::new(Box::new(EmptyTemplateStore))),
        observer: Arc::new(NoOpObserver),
        cwd,
        persona: None,
        user_facts: None,
        unrestricted: false,
        knowledge: Vec::new(),
        max_steps: Some(max_steps),
    }
}

// Scenario 1: simple chat.
#[tokio::test]
async fn simple_chat_completes_in_one_step() {
    let backend = Arc::new(ScriptedBackend::new(
        "primary",
        "llama3.2:3b",
        vec![Reply::Text("Your project is Apollo.".to_string())],
    ));
    let mut agent = bare_agent(backend, ToolRegistry::new(), PathBuf::from("."), 6);
    agent.supervised.mode = AgenticMode::Autonomous;

    let outcome = agent.run(CancellationToken::new(), &[], "what's my project called?").await;
    let response = match outcome {
        RunOutcome::Completed(r) => r,
        _ => panic!("expected Completed"),
    };
    assert_eq!(response.message, "Your project is Apollo.");
    assert_eq!(response.steps_count, 1);
    assert!(response.tools_used.is_empty());
    assert!(response.completed);
}

// Scenario 2: single tool use.
#[tokio::test]
async fn single_tool_use_reads_a_file_then_completes() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::write(dir.path().join("main.go"), "package main\n\nfunc main() {}\n").await.unwrap();

    let backend = Arc::new(ScriptedBackend::new(
        "primary",
        "llama3.2:3b",
        vec![
            Reply::Text(tool_call_text("read_file", &[("path", "main.go")])),
            Reply::Text("Here's main.go:\n<content>".to_string()),
        ],
    ));

    let mut tools = ToolRegistry::new();
    tools.register(ReadFileTool::new(None));

    let observer = Arc::new(RecordingObserver::default());
    let mut agent = bare_agent(backend, tools, dir.path().to_path_buf(), 6);
    agent.observer = observer.clone();

    let outcome = agent.run(CancellationToken::new(), &[], "show me main.go").await;
    let response = match outcome {
        RunOutcome::Completed(r) => r,
        _ => panic!("expected Completed"),
    };
    assert_eq!(response.steps_count, 2);
    assert_eq!(response.tools_used, vec!["read_file".to_string()]);
    assert!(response.completed);

    let kinds: Vec<StepEventKind> = observer.events.lock().unwrap().iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            StepEventKind::Thinking,
            StepEventKind::Thinking,
            StepEventKind::ToolCall,
            StepEventKind::ToolResult,
            StepEventKind::Thinking,
            StepEventKind::Complete,
        ]
    );
}

// Scenario 3: loop detected & escalation.
#[tokio::test]
async fn loop_detected_triggers_escalation_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let call_text = tool_call_text("search_files", &[("pattern", "*.md")]);

    let backend = Arc::new(ScriptedBackend::new(
        "primary",
        "llama3.2:3b",
        vec![Reply::Text(call_text.clone()), Reply::Text(call_text.clone()), Reply::Text(call_text)],
    ));

    let mut tools = ToolRegistry::new();
    tools.register(SearchFilesTool);

    let observer = Arc::new(RecordingObserver::default());
    let handler = Arc::new(ScriptedCheckpointHandler(CheckpointResponse::action(CheckpointAction::Escalate)));

    let mut agent = bare_agent(backend, tools, dir.path().to_path_buf(), 6);
    agent.checkpoint_handler = Some(handler);
    agent.observer = observer.clone();

    let outcome = agent.run(CancellationToken::new(), &[], "find the readme").await;
    let response = match outcome {
        RunOutcome::Escalated(r) => r,
        _ => panic!("expected Escalated"),
    };
    assert!(!response.completed);

    let last_kind = observer.events.lock().unwrap().last().unwrap().kind;
    assert_eq!(last_kind, StepEventKind::Checkpoint);
}

// Scenario 4: step-limit with continuation.
#[tokio::test]
async fn step_limit_grants_the_requested_additional_steps() {
    let dir = tempfile::tempdir().unwrap();
    tokio::fs::create_dir(dir.path().join("a")).await.unwrap();
    tokio::fs::create_dir(dir.path().join("b")).await.unwrap();

    let backend = Arc::new(ScriptedBackend::new(
        "primary",
        "llama3.2:3b",
        vec![
            Reply::Text(tool_call_text("list_directory", &[("path", "a")])),
            Reply::Text(tool_call_text("list_directory", &[("path", "b")])),
        ],
    ));

    let mut tools = ToolRegistry::new();
    tools.register(ListDirectoryTool);

    let handler = Arc::new(ScriptedCheckpointHandler(CheckpointResponse::continue_with(3)));

    let mut agent = bare_agent(backend, tools, dir.path().to_path_buf(), 2);
    agent.checkpoint_handler = Some(handler);

    let outcome = agent.run(CancellationToken::new(), &[], "explore the tree").await;
    match outcome {
        RunOutcome::NeedsMoreSteps { additional_steps, .. } => assert_eq!(additional_steps, 3),
        _ => panic!("expected NeedsMoreSteps"),
    }
}

// Scenario 5: primary timeout -> fallback.
#[tokio::test]
async fn primary_timeout_falls_back_after_retry_budget() {
    let primary = Arc::new(ScriptedBackend::new(
        "primary",
        "llama3.2:3b",
        vec![
            Reply::Err("context deadline exceeded".to_string()),
            Reply::Err("context deadline exceeded".to_string()),
        ],
    ));
    let fallback_backend = Arc::new(ScriptedBackend::new(
        "anthropic",
        "claude-haiku-4.5",
        vec![Reply::Text("The requested task has been completed successfully without further action needed.".to_string())],
    ));

    let primary_probe = Arc::new(StaticProbe { available: true, response_time: Duration::from_millis(50) });
    let fallback_probe = Arc::new(StaticProbe { available: true, response_time: Duration::from_millis(50) });
    let observer = Arc::new(RecordingObserver::default());

    let dispatcher = ResilientDispatcher {
        primary: primary as Arc<dyn BackendCapabilities>,
        primary_probe: primary_probe as Arc<dyn HealthProbe>,
        fallbacks: vec![FallbackBackend {
            provider: FallbackProvider {
                name: "anthropic".to_string(),
                model: "claude-haiku-4.5".to_string(),
                credential: Some("key".to_string()),
                priority: 0,
            },
            backend: fallback_backend as Arc<dyn BackendCapabilities>,
            probe: fallback_probe as Arc<dyn HealthProbe>,
        }],
        tools: Arc::new(ToolRegistry::new()),
        checkpoint_handler: None,
        supervised: SupervisedConfig::default(),
        prompt_composer: Arc::new(PromptComposer::new(Box::new(EmptyTemplateStore))),
        observer: observer.clone() as Arc<dyn StepObserver>,
        cwd: PathBuf::from("."),
        persona: None,
        user_facts: None,
        unrestricted: false,
        knowledge: Vec::new(),
        max_steps: Some(6),
        learning_sink: Arc::new(NoOpLearningSink),
    };

    let outcome = dispatcher.dispatch(CancellationToken::new(), &[], "summarize the changelog").await;
    let response = match outcome {
        RunOutcome::Completed(r) => r,
        _ => panic!("expected Completed via fallback"),
    };
    assert_eq!(response.provider, "anthropic");
    assert_eq!(response.model, "claude-haiku-4.5");
    assert!(response.completed);

    let recovery_events = observer.events.lock().unwrap().iter().filter(|e| e.kind == StepEventKind::Recovery).count();
    assert!(recovery_events >= 1, "expected at least one recovery event between the primary and fallback runs");
}

// Scenario 6: quality gate echo.
#[tokio::test]
async fn quality_gate_flags_an_echoed_response_and_falls_back() {
    let request = "run `ls -la` in the current directory please";
    let primary = Arc::new(ScriptedBackend::new("primary", "llama3.2:3b", vec![Reply::Text("run `ls -la`".to_string())]));
    let fallback_backend = Arc::new(ScriptedBackend::new(
        "anthropic",
        "claude-haiku-4.5",
        vec![Reply::Text("Here is the directory listing you asked for, with full file details included.".to_string())],
    ));

    let primary_probe = Arc::new(StaticProbe { available: true, response_time: Duration::from_millis(20) });
    let fallback_probe = Arc::new(StaticProbe { available: true, response_time: Duration::from_millis(20) });
    let sink = Arc::new(CapturingLearningSink::default());

    let dispatcher = ResilientDispatcher {
        primary: primary as Arc<dyn BackendCapabilities>,
        primary_probe: primary_probe as Arc<dyn HealthProbe>,
        fallbacks: vec![FallbackBackend {
            provider: FallbackProvider {
                name: "anthropic".to_string(),
                model: "claude-haiku-4.5".to_string(),
                credential: Some("key".to_string()),
                priority: 0,
            },
            backend: fallback_backend as Arc<dyn BackendCapabilities>,
            probe: fallback_probe as Arc<dyn HealthProbe>,
        }],
        tools: Arc::new(ToolRegistry::new()),
        checkpoint_handler: None,
        supervised: SupervisedConfig::default(),
        prompt_composer: Arc::new(PromptComposer::new(Box::new(EmptyTemplateStore))),
        observer: Arc::new(NoOpObserver),
        cwd: PathBuf::from("."),
        persona: None,
        user_facts: None,
        unrestricted: false,
        knowledge: Vec::new(),
        max_steps: Some(6),
        learning_sink: sink.clone() as Arc<dyn LearningSink>,
    };

    let outcome = dispatcher.dispatch(CancellationToken::new(), &[], request).await;
    let response = match outcome {
        RunOutcome::Completed(r) => r,
        _ => panic!("expected Completed via fallback"),
    };
    assert_eq!(response.provider, "anthropic");

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].note.as_deref(), Some("EchoResponse"));
}
