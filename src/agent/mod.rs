//! Agent module: the agentic execution core.
//!
//! - [`types`] — shared data model (messages, tool calls/results, steps).
//! - [`backend`] — the external LLM contract (§6).
//! - [`parser`] — Tool Protocol Parser (§4.A).
//! - [`loop_detector`] — Loop Detector (§4.C).
//! - [`checkpoint`] — Checkpoint Arbiter (§4.D).
//! - [`tier`] — Model-Tier Selector (§4.F).
//! - [`prompt`] — Prompt Composer (§4.G).
//! - [`quality`] — Quality Gate (§4.H).
//! - [`health`] — Health Prober (§4.I).
//! - [`recovery`] — Recovery Analyzer (§4.J).
//! - [`run`] — Agentic Loop (§4.E).
//! - [`resilient`] — Resilient Dispatcher (§4.K).

pub mod backend;
pub mod checkpoint;
pub mod health;
pub mod loop_detector;
pub mod parser;
pub mod prompt;
pub mod quality;
pub mod recovery;
pub mod resilient;
pub mod run;
pub mod tier;
pub mod types;

pub use backend::{BackendCapabilities, LlmBackend, StreamingBackend, TokenAccounting};
pub use checkpoint::{
    AgenticMode, Checkpoint, CheckpointAction, CheckpointHandler, CheckpointOption,
    CheckpointReason, CheckpointResponse, SupervisedConfig,
};
pub use health::{GenericGetHealthProbe, HealthProbe, HealthStatus, OllamaHealthProbe, OpenAiStyleHealthProbe};
pub use loop_detector::{LoopState, LoopTrigger};
pub use parser::{format_tool_call, parse_tool_calls};
pub use prompt::{ParamSpec, PromptComposer, PromptContext, PromptTemplateStore, ToolSpec};
pub use quality::{IssueKind, QualityAssessment};
pub use recovery::{Complexity, FallbackProvider, RecoveryAction, RecoveryDecision, TaskContext};
pub use resilient::{FallbackBackend, LearningRecord, LearningSink, NoOpLearningSink, ResilientDispatcher};
pub use run::{Agent, RunOutcome};
pub use tier::{resolve_tier, PromptTier};
pub use types::{
    new_run_id, ChatMessage, GenerationOptions, NoOpObserver, Role, RunId, RunResponse, Step,
    StepEvent, StepEventKind, StepObserver, ToolCall, ToolResult, Usage,
};
