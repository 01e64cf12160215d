//! `read_file` tool (§4.B). Resolves relative paths against the run's
//! working directory; caps output at 50,000 bytes.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ParamSpec;
use crate::agent::types::{ToolCall, ToolResult};

use super::traits::{cap_output, Tool};

const MAX_OUTPUT_BYTES: usize = 50_000;

/// Reads UTF-8 file contents. When `safety_root` is set, a resolved path
/// that escapes it is rejected rather than read.
pub struct ReadFileTool {
    safety_root: Option<PathBuf>,
}

impl ReadFileTool {
    pub fn new(safety_root: Option<PathBuf>) -> Self {
        ReadFileTool { safety_root }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file as text."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "path".to_string(),
            type_name: "string".to_string(),
            required: true,
            description: "Path to the file, relative to the working directory.".to_string(),
        }]
    }

    async fn execute(&self, _ctx: CancellationToken, call: &ToolCall, cwd: &mut PathBuf) -> ToolResult {
        let Some(path) = call.params.get("path") else {
            return ToolResult::failure(self.name(), "missing required parameter: path");
        };

        let resolved = cwd.join(path);

        if let Some(root) = &self.safety_root {
            let canonical_root = tokio::fs::canonicalize(root).await.unwrap_or_else(|_| root.clone());
            let canonical_target = tokio::fs::canonicalize(&resolved).await.unwrap_or_else(|_| resolved.clone());
            if !canonical_target.starts_with(&canonical_root) {
                return ToolResult::failure(self.name(), "path escapes the allowed workspace");
            }
        }

        match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => ToolResult::success(self.name(), cap_output(content, MAX_OUTPUT_BYTES)),
            Err(e) => ToolResult::failure(self.name(), format!("failed to read {}: {e}", resolved.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn reads_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("hello.txt");
        tokio::fs::write(&file_path, "hello world").await.unwrap();

        let tool = ReadFileTool::new(None);
        let mut cwd = dir.path().to_path_buf();
        let mut params = HashMap::new();
        params.insert("path".to_string(), "hello.txt".to_string());
        let call = ToolCall::new("read_file", params);

        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;
        assert!(result.success);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn missing_file_fails_without_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(None);
        let mut cwd = dir.path().to_path_buf();
        let mut params = HashMap::new();
        params.insert("path".to_string(), "missing.txt".to_string());
        let call = ToolCall::new("read_file", params);

        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn escaping_safety_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = dir.path().join("workspace");
        tokio::fs::create_dir_all(&workspace).await.unwrap();
        tokio::fs::write(dir.path().join("secret.txt"), "nope").await.unwrap();

        let tool = ReadFileTool::new(Some(workspace.clone()));
        let mut cwd = workspace;
        let mut params = HashMap::new();
        params.insert("path".to_string(), "../secret.txt".to_string());
        let call = ToolCall::new("read_file", params);

        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;
        assert!(!result.success);
        assert!(result.error.contains("escapes"));
    }
}
