//! agentcore-cli: a demo binary wiring a mock, stdin-driven backend to the
//! Resilient Dispatcher so the crate runs end to end without a live LLM
//! credential. Mirrors the teacher's `src/bin/cli.rs` in its `clap` +
//! `tracing_subscriber` setup; everything past that differs, since the
//! teacher's CLI drives a Telegram/Postgres/OpenRouter stack this crate
//! doesn't have.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use agentcore::agent::prompt::EmptyTemplateStore;
use agentcore::agent::{
    BackendCapabilities, ChatMessage, FallbackBackend, GenerationOptions, HealthProbe,
    HealthStatus, LlmBackend, NoOpLearningSink, NoOpObserver, PromptComposer, ResilientDispatcher,
    Role, RunOutcome,
};
use agentcore::config::AgentSettings;
use agentcore::tools::{
    ListDirectoryTool, NoOpPidRegistry, ReadFileTool, RunCommandTool, SearchFilesTool,
    ToolRegistry, WebSearchTool, WriteFileTool,
};
use agentcore::{Result, VERSION};
use async_trait::async_trait;
use clap::Parser;
use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "agentcore",
    version = VERSION,
    about = "agentcore demo CLI: runs one message through the agentic loop",
    long_about = None
)]
struct Cli {
    /// The user message to run through the agentic loop.
    message: String,

    /// Working directory the tool-using steps operate in.
    #[arg(long, default_value = ".")]
    cwd: PathBuf,

    /// Persona text prepended to the system prompt.
    #[arg(long)]
    persona: Option<String>,

    /// Skip the "unrestricted" refusal-avoidance preamble.
    #[arg(long)]
    unrestricted: bool,

    /// Prompt for each mock reply on stdin instead of using the canned echo.
    #[arg(long)]
    interactive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("agentcore=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let settings = AgentSettings::load()?;

    let tools = Arc::new(build_tools(&settings));
    let prompt_composer = Arc::new(PromptComposer::new(Box::new(EmptyTemplateStore)));

    let primary: Arc<dyn BackendCapabilities> =
        Arc::new(MockBackend::new("primary", &settings.default_model, cli.interactive));

    let fallbacks: Vec<FallbackBackend> = settings
        .fallback_providers()
        .into_iter()
        .map(|provider| FallbackBackend {
            backend: Arc::new(MockBackend::new(&provider.name, &provider.model, false))
                as Arc<dyn BackendCapabilities>,
            probe: Arc::new(AlwaysAvailableProbe) as Arc<dyn HealthProbe>,
            provider,
        })
        .collect();

    let dispatcher = ResilientDispatcher {
        primary,
        primary_probe: Arc::new(AlwaysAvailableProbe),
        fallbacks,
        tools,
        checkpoint_handler: None,
        supervised: settings.supervised_config(),
        prompt_composer,
        observer: Arc::new(NoOpObserver),
        cwd: cli.cwd,
        persona: cli.persona,
        user_facts: None,
        unrestricted: cli.unrestricted,
        knowledge: Vec::new(),
        max_steps: None,
        learning_sink: Arc::new(NoOpLearningSink),
    };

    info!(model = %settings.default_model, "dispatching one run");
    let outcome = dispatcher
        .dispatch(CancellationToken::new(), &[], &cli.message)
        .await;
    print_outcome(&outcome);
    Ok(())
}

fn build_tools(settings: &AgentSettings) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(ReadFileTool::new(None));
    tools.register(WriteFileTool::new(None));
    tools.register(ListDirectoryTool);
    tools.register(SearchFilesTool);
    tools.register(RunCommandTool::new(Arc::new(NoOpPidRegistry)));
    tools.register(WebSearchTool::new(
        settings.tavily_api_key.clone().map(SecretString::from),
    ));
    tools
}

fn print_outcome(outcome: &RunOutcome) {
    let response = outcome.response();
    match outcome {
        RunOutcome::Completed(_) => println!("\n{}\n", response.message),
        RunOutcome::Cancelled(_) => println!("\n[cancelled]\n"),
        RunOutcome::Escalated(_) => println!("\n[escalated]\n{}\n", response.message),
        RunOutcome::NeedsMoreSteps { additional_steps, .. } => {
            println!("\n[needs {additional_steps} more steps]\n{}\n", response.message)
        }
        RunOutcome::NeedsGuidance { guidance, .. } => println!("\n[needs guidance: {guidance}]\n"),
        RunOutcome::Failed { error, .. } => println!("\n[failed: {error}]\n"),
    }
    println!(
        "provider={} model={} steps={} tools_used={:?} tokens={}",
        response.provider, response.model, response.steps_count, response.tools_used, response.tokens_used
    );
}

/// A mock, possibly stdin-driven chat backend standing in for a real LLM
/// so the agentic loop is runnable without credentials. With `interactive`
/// set, each turn's reply is typed at the terminal; otherwise it echoes the
/// last user message back, tagged with the backend's name.
struct MockBackend {
    name: String,
    model: String,
    interactive: bool,
}

impl MockBackend {
    fn new(name: impl Into<String>, model: impl Into<String>, interactive: bool) -> Self {
        MockBackend { name: name.into(), model: model.into(), interactive }
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn model(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        _ctx: CancellationToken,
        messages: &[ChatMessage],
        _system_prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<String> {
        if self.interactive {
            print!("[{} reply] ", self.name);
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok(line.trim().to_string())
        } else {
            let last_user = messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(format!("({} mock) heard: {last_user}", self.name))
        }
    }
}

impl BackendCapabilities for MockBackend {}

/// Reports healthy without making a network call — the mock backends above
/// aren't endpoints a real probe could reach.
struct AlwaysAvailableProbe;

#[async_trait]
impl HealthProbe for AlwaysAvailableProbe {
    async fn probe(&self, _ctx: CancellationToken) -> HealthStatus {
        HealthStatus {
            available: true,
            response_time: std::time::Duration::from_millis(0),
            models_loaded: Vec::new(),
            error: None,
            checked_at: chrono::Utc::now(),
            server_version: None,
        }
    }
}
