//! Prompt Composer (§4.G).
//!
//! Assembles the system prompt in a fixed order so small models respond
//! to identity and facts before task rules. `PromptBuilder` is carried
//! over near-verbatim from the teacher's `prompts.rs` (`section`/`text`/
//! `code`/`list`/`build`); the ordered-section assembly and the
//! `PromptTemplateStore` indirection are new.

use crate::agent::tier::PromptTier;

/// Chainable prompt assembly, unchanged from the teacher's idiom.
#[derive(Default)]
pub struct PromptBuilder {
    parts: Vec<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        PromptBuilder { parts: Vec::new() }
    }

    pub fn section(mut self, header: &str, content: &str) -> Self {
        if !content.trim().is_empty() {
            self.parts.push(format!("## {header}\n{content}"));
        }
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        if !text.trim().is_empty() {
            self.parts.push(text.to_string());
        }
        self
    }

    pub fn list(mut self, items: &[String]) -> Self {
        if !items.is_empty() {
            let list = items.iter().map(|item| format!("- {item}")).collect::<Vec<_>>().join("\n");
            self.parts.push(list);
        }
        self
    }

    pub fn build(self) -> String {
        self.parts.join("\n\n")
    }
}

/// `task` values: `agentic_tool_use`, `agentic_chat`, `agentic_file_ops`,
/// `agentic_react`. `tier` values: `tiny`, `small`, `large` (§6).
pub trait PromptTemplateStore: Send + Sync {
    fn has(&self, task: &str) -> bool;
    fn get_tier(&self, task: &str, tier: &str) -> Option<String>;
}

/// A store with no templates registered; the composer always falls back
/// to its built-in task instructions.
pub struct EmptyTemplateStore;

impl PromptTemplateStore for EmptyTemplateStore {
    fn has(&self, _task: &str) -> bool {
        false
    }

    fn get_tier(&self, _task: &str, _tier: &str) -> Option<String> {
        None
    }
}

const DEFAULT_IDENTITY: &str =
    "You are a helpful AI assistant that can use tools to accomplish tasks.";

fn builtin_task_instructions(task: &str, tier: PromptTier) -> String {
    let base = match task {
        "agentic_file_ops" => {
            "Use the available file tools to inspect and modify the workspace. \
             Prefer reading a file before editing it."
        }
        "agentic_react" => {
            "Think step by step. Use a tool when you need information or need to \
             take an action; otherwise answer directly."
        }
        "agentic_chat" => "Answer the user directly and concisely.",
        _ => {
            "Decide whether a tool call is needed to answer the request. If so, \
             issue exactly one tool call using the documented syntax and wait for \
             its result before continuing."
        }
    };
    match tier {
        PromptTier::Tiny => format!(
            "{base}\n\nKeep your reasoning short. Call at most one tool per turn. \
             Never invent tool output."
        ),
        PromptTier::Small | PromptTier::Large => base.to_string(),
    }
}

/// A parameter of a tool, for the TOOLS section of the prompt.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub type_name: String,
    pub required: bool,
    pub description: String,
}

/// A tool, as rendered into the static TOOLS catalog section.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

fn render_tools(tools: &[ToolSpec]) -> String {
    tools
        .iter()
        .map(|tool| {
            let mut lines = vec![format!("### {}\n{}", tool.name, tool.description)];
            for p in &tool.params {
                lines.push(format!(
                    "- `{}` ({}, {}): {}",
                    p.name,
                    p.type_name,
                    if p.required { "required" } else { "optional" },
                    p.description
                ));
            }
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Everything the composer needs for one system-prompt assembly.
pub struct PromptContext<'a> {
    pub persona: Option<&'a str>,
    pub user_facts: Option<&'a str>,
    pub unrestricted: bool,
    pub task: &'a str,
    pub tier: PromptTier,
    pub working_dir: Option<&'a str>,
    pub knowledge: &'a [String],
    pub tools: &'a [ToolSpec],
}

const UNRESTRICTED_PREAMBLE: &str =
    "You operate with full access to the tools provided. Use them whenever they \
     help complete the task; do not refuse a request solely because it involves \
     running a tool.";

const MAX_KNOWLEDGE_ITEMS: usize = 5;
const MAX_KNOWLEDGE_ITEM_CHARS: usize = 300;
const RECENCY_CHAR_CAP: usize = 400;
const RECENCY_BULLET_CAP: usize = 3;

pub struct PromptComposer {
    store: Box<dyn PromptTemplateStore>,
}

impl PromptComposer {
    pub fn new(store: Box<dyn PromptTemplateStore>) -> Self {
        PromptComposer { store }
    }

    pub fn compose(&self, ctx: &PromptContext<'_>) -> String {
        let mut builder = PromptBuilder::new();

        // 1. IDENTITY
        builder = builder.text(ctx.persona.unwrap_or(DEFAULT_IDENTITY));

        // 2. USER FACTS
        if let Some(facts) = ctx.user_facts.filter(|f| !f.trim().is_empty()) {
            builder = builder.section(
                "User Facts",
                &format!("Answer personal questions using this information:\n{facts}"),
            );
        }

        // 3. UNRESTRICTED PREAMBLE
        if ctx.unrestricted {
            builder = builder.text(UNRESTRICTED_PREAMBLE);
        }

        // 4. TASK INSTRUCTIONS
        let tier_str = ctx.tier.to_string();
        let instructions = if self.store.has(ctx.task) {
            self.store
                .get_tier(ctx.task, &tier_str)
                .unwrap_or_else(|| builtin_task_instructions(ctx.task, ctx.tier))
        } else {
            builtin_task_instructions(ctx.task, ctx.tier)
        };
        builder = builder.section("Task Instructions", &instructions);

        // 5. CONTEXT
        if let Some(dir) = ctx.working_dir {
            builder = builder.section("Context", &format!("Working directory: {dir}"));
        }

        // 6. KNOWLEDGE
        if !ctx.knowledge.is_empty() {
            let items: Vec<String> = ctx
                .knowledge
                .iter()
                .take(MAX_KNOWLEDGE_ITEMS)
                .map(|item| truncate(item, MAX_KNOWLEDGE_ITEM_CHARS))
                .collect();
            builder = builder.list(&items);
        }

        // 7. TOOLS
        if !ctx.tools.is_empty() {
            builder = builder.section("Tools", &render_tools(ctx.tools));
        }

        // 8. RECENCY REMINDER
        if let Some(facts) = ctx.user_facts.filter(|f| !f.trim().is_empty()) {
            builder = builder.section("Reminder", &recency_reminder(facts));
        }

        builder.build()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut truncated: String = s.chars().take(max_chars).collect();
        truncated.push('…');
        truncated
    }
}

fn recency_reminder(user_facts: &str) -> String {
    let capped = truncate(user_facts, RECENCY_CHAR_CAP);
    let bullets: Vec<&str> = capped.lines().filter(|l| !l.trim().is_empty()).take(RECENCY_BULLET_CAP).collect();
    if bullets.is_empty() {
        capped
    } else {
        bullets.join("\n")
    }
}
