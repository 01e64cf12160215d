//! Memory tools (§6 "Memory tools are delegated verbatim to an external
//! memory interface"). Five thin pass-throughs onto a `MemoryBackend`
//! collaborator — the tools themselves hold no storage logic, only
//! parameter validation and `ToolResult` shaping.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ParamSpec;
use crate::agent::types::{ToolCall, ToolResult};
use crate::error::Result;

use super::traits::Tool;

/// External long-term memory store. Implemented outside this crate; the
/// core only sequences calls to it (§1 non-goals: "no persistent memory
/// of decisions is retained across runs by this core").
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    async fn recall_search(&self, query: &str) -> Result<String>;
    async fn core_read(&self) -> Result<String>;
    async fn core_append(&self, content: &str) -> Result<String>;
    async fn archival_search(&self, query: &str) -> Result<String>;
    async fn archival_insert(&self, content: &str) -> Result<String>;
}

fn param_or_fail(call: &ToolCall, tool_name: &str, key: &str) -> std::result::Result<String, ToolResult> {
    call.params
        .get(key)
        .cloned()
        .ok_or_else(|| ToolResult::failure(tool_name, format!("missing required parameter: {key}")))
}

fn shape(tool_name: &str, outcome: Result<String>) -> ToolResult {
    match outcome {
        Ok(text) => ToolResult::success(tool_name, text),
        Err(e) => ToolResult::failure(tool_name, e.to_string()),
    }
}

pub struct RecallMemorySearchTool {
    backend: std::sync::Arc<dyn MemoryBackend>,
}

impl RecallMemorySearchTool {
    pub fn new(backend: std::sync::Arc<dyn MemoryBackend>) -> Self {
        RecallMemorySearchTool { backend }
    }
}

#[async_trait]
impl Tool for RecallMemorySearchTool {
    fn name(&self) -> &str {
        "recall_memory_search"
    }

    fn description(&self) -> &str {
        "Search recent conversation memory for relevant prior exchanges."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "query".to_string(),
            type_name: "string".to_string(),
            required: true,
            description: "What to search for.".to_string(),
        }]
    }

    async fn execute(&self, _ctx: CancellationToken, call: &ToolCall, _cwd: &mut PathBuf) -> ToolResult {
        let query = match param_or_fail(call, self.name(), "query") {
            Ok(q) => q,
            Err(result) => return result,
        };
        shape(self.name(), self.backend.recall_search(&query).await)
    }
}

pub struct CoreMemoryReadTool {
    backend: std::sync::Arc<dyn MemoryBackend>,
}

impl CoreMemoryReadTool {
    pub fn new(backend: std::sync::Arc<dyn MemoryBackend>) -> Self {
        CoreMemoryReadTool { backend }
    }
}

#[async_trait]
impl Tool for CoreMemoryReadTool {
    fn name(&self) -> &str {
        "core_memory_read"
    }

    fn description(&self) -> &str {
        "Read the always-in-context core memory block."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![]
    }

    async fn execute(&self, _ctx: CancellationToken, _call: &ToolCall, _cwd: &mut PathBuf) -> ToolResult {
        shape(self.name(), self.backend.core_read().await)
    }
}

pub struct CoreMemoryAppendTool {
    backend: std::sync::Arc<dyn MemoryBackend>,
}

impl CoreMemoryAppendTool {
    pub fn new(backend: std::sync::Arc<dyn MemoryBackend>) -> Self {
        CoreMemoryAppendTool { backend }
    }
}

#[async_trait]
impl Tool for CoreMemoryAppendTool {
    fn name(&self) -> &str {
        "core_memory_append"
    }

    fn description(&self) -> &str {
        "Append a fact to the always-in-context core memory block."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "content".to_string(),
            type_name: "string".to_string(),
            required: true,
            description: "Fact to append.".to_string(),
        }]
    }

    async fn execute(&self, _ctx: CancellationToken, call: &ToolCall, _cwd: &mut PathBuf) -> ToolResult {
        let content = match param_or_fail(call, self.name(), "content") {
            Ok(c) => c,
            Err(result) => return result,
        };
        shape(self.name(), self.backend.core_append(&content).await)
    }
}

pub struct ArchivalMemorySearchTool {
    backend: std::sync::Arc<dyn MemoryBackend>,
}

impl ArchivalMemorySearchTool {
    pub fn new(backend: std::sync::Arc<dyn MemoryBackend>) -> Self {
        ArchivalMemorySearchTool { backend }
    }
}

#[async_trait]
impl Tool for ArchivalMemorySearchTool {
    fn name(&self) -> &str {
        "archival_memory_search"
    }

    fn description(&self) -> &str {
        "Search long-term archival memory."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "query".to_string(),
            type_name: "string".to_string(),
            required: true,
            description: "What to search for.".to_string(),
        }]
    }

    async fn execute(&self, _ctx: CancellationToken, call: &ToolCall, _cwd: &mut PathBuf) -> ToolResult {
        let query = match param_or_fail(call, self.name(), "query") {
            Ok(q) => q,
            Err(result) => return result,
        };
        shape(self.name(), self.backend.archival_search(&query).await)
    }
}

pub struct ArchivalMemoryInsertTool {
    backend: std::sync::Arc<dyn MemoryBackend>,
}

impl ArchivalMemoryInsertTool {
    pub fn new(backend: std::sync::Arc<dyn MemoryBackend>) -> Self {
        ArchivalMemoryInsertTool { backend }
    }
}

#[async_trait]
impl Tool for ArchivalMemoryInsertTool {
    fn name(&self) -> &str {
        "archival_memory_insert"
    }

    fn description(&self) -> &str {
        "Insert a fact into long-term archival memory."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "content".to_string(),
            type_name: "string".to_string(),
            required: true,
            description: "Fact to insert.".to_string(),
        }]
    }

    async fn execute(&self, _ctx: CancellationToken, call: &ToolCall, _cwd: &mut PathBuf) -> ToolResult {
        let content = match param_or_fail(call, self.name(), "content") {
            Ok(c) => c,
            Err(result) => return result,
        };
        shape(self.name(), self.backend.archival_insert(&content).await)
    }
}
