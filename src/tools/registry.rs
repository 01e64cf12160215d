//! Tool Dispatcher (§4.B): validates a call against the catalog, invokes
//! the matching `Tool`, and shapes the result. Unknown names never reach
//! a `Tool` impl — they fail fast with a `ToolResult` so the loop's
//! invariant ("every call has a paired result") always holds.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ToolSpec;
use crate::agent::types::{ToolCall, ToolResult};

use super::catalog::{ToolName, CATALOG_NAMES};
use super::traits::Tool;

/// Registry + dispatcher for the fixed tool catalog.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry { tools: HashMap::new() }
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Validate `call.name` against the catalog and execute it.
    /// Unregistered names, including those outside the closed
    /// enumeration, fail with a diagnostic `ToolResult` rather than
    /// panicking or silently no-opping.
    pub async fn dispatch(&self, ctx: CancellationToken, call: &ToolCall, cwd: &mut PathBuf) -> ToolResult {
        let tool_name = ToolName::from(call.name.as_str());
        match self.get(tool_name.as_str()) {
            Some(tool) => tool.execute(ctx, call, cwd).await,
            None => {
                tracing::warn!(tool = %call.name, "dispatch requested for unregistered tool");
                ToolResult::failure(call.name.clone(), format!("unknown tool: {}", call.name))
            }
        }
    }

    /// Static catalog rendering for the Prompt Composer, in catalog order.
    pub fn tool_specs(&self) -> Vec<ToolSpec> {
        CATALOG_NAMES
            .iter()
            .filter_map(|name| self.get(name))
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                params: tool.params(),
            })
            .collect()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}
