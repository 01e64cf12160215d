//! `list_directory` tool (§4.B). Bounded by the same depth/scan/result
//! limits as `search_files` so a huge tree never floods the conversation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ParamSpec;
use crate::agent::types::{ToolCall, ToolResult};

use super::search_files::{walk_bounded, DEFAULT_MAX_FILES_SCANNED, DEFAULT_MAX_RESULTS};
use super::traits::Tool;

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories under a path, one level deep by default."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "path".to_string(),
            type_name: "string".to_string(),
            required: false,
            description: "Directory to list, relative to the working directory (default: \".\").".to_string(),
        }]
    }

    async fn execute(&self, _ctx: CancellationToken, call: &ToolCall, cwd: &mut PathBuf) -> ToolResult {
        let rel = call.params.get("path").map(String::as_str).unwrap_or(".");
        let root = cwd.join(rel);

        if !root.is_dir() {
            return ToolResult::failure(self.name(), format!("{} is not a directory", root.display()));
        }

        let (entries, scanned, overran) = walk_bounded(&root, 1, DEFAULT_MAX_FILES_SCANNED, DEFAULT_MAX_RESULTS, None);

        let mut names: Vec<String> = entries
            .into_iter()
            .map(|p| relative_label(&root, &p))
            .collect();
        names.sort();

        let mut output = names.join("\n");
        if overran {
            output.push_str(&format!(
                "\n... [stopped after scanning {scanned} entries; results may be incomplete]"
            ));
        }
        ToolResult::success(self.name(), output)
    }
}

fn relative_label(root: &Path, entry: &Path) -> String {
    let suffix = entry.strip_prefix(root).unwrap_or(entry);
    let label = suffix.display().to_string();
    if entry.is_dir() {
        format!("{label}/")
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn lists_top_level_entries() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "a").await.unwrap();
        tokio::fs::create_dir(dir.path().join("sub")).await.unwrap();

        let tool = ListDirectoryTool;
        let mut cwd = dir.path().to_path_buf();
        let call = ToolCall::new("list_directory", HashMap::new());
        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;

        assert!(result.success);
        assert!(result.output.contains("a.txt"));
        assert!(result.output.contains("sub/"));
    }
}
