//! Core tool trait (§4.B, §6 "Tool executor").
//!
//! `ToolCall`/`ToolResult` live in `agent::types` — they are conversation
//! data, not tool-crate-private types. A tool never fails at the Rust
//! level: an execution problem is expressed as `ToolResult::failure`, per
//! §7 ("tool errors never bubble out of the loop").

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ParamSpec;
use crate::agent::types::{ToolCall, ToolResult};

/// A tool invocable by the dispatcher.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn params(&self) -> Vec<ParamSpec>;

    /// Execute against `call.params`. `cwd` is the run's working
    /// directory; only `run_command` ever mutates it (the `cd X && pwd`
    /// special case, §4.B).
    async fn execute(&self, ctx: CancellationToken, call: &ToolCall, cwd: &mut PathBuf) -> ToolResult;
}

/// Truncate `output` to `max_bytes`, appending a marker noting how many
/// bytes were dropped. Shared by every capped tool (§4.B).
pub fn cap_output(output: String, max_bytes: usize) -> String {
    if output.len() <= max_bytes {
        return output;
    }
    let mut end = max_bytes;
    while !output.is_char_boundary(end) {
        end -= 1;
    }
    let dropped = output.len() - end;
    format!("{}\n... [truncated, {} bytes omitted]", &output[..end], dropped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_output_leaves_short_text_untouched() {
        assert_eq!(cap_output("hello".to_string(), 100), "hello");
    }

    #[test]
    fn cap_output_truncates_and_marks_dropped_bytes() {
        let text = "x".repeat(200);
        let capped = cap_output(text, 100);
        assert!(capped.starts_with(&"x".repeat(100)));
        assert!(capped.contains("truncated"));
    }
}
