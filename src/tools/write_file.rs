//! `write_file` tool (§4.B). Creates intermediate directories with mode
//! 0755 and writes the file with mode 0644.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ParamSpec;
use crate::agent::types::{ToolCall, ToolResult};

use super::traits::Tool;

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

pub struct WriteFileTool {
    safety_root: Option<PathBuf>,
}

impl WriteFileTool {
    pub fn new(safety_root: Option<PathBuf>) -> Self {
        WriteFileTool { safety_root }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text content to a file, creating parent directories as needed."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec {
                name: "path".to_string(),
                type_name: "string".to_string(),
                required: true,
                description: "Path to the file, relative to the working directory.".to_string(),
            },
            ParamSpec {
                name: "content".to_string(),
                type_name: "string".to_string(),
                required: true,
                description: "Text content to write.".to_string(),
            },
        ]
    }

    async fn execute(&self, _ctx: CancellationToken, call: &ToolCall, cwd: &mut PathBuf) -> ToolResult {
        let Some(path) = call.params.get("path") else {
            return ToolResult::failure(self.name(), "missing required parameter: path");
        };
        let Some(content) = call.params.get("content") else {
            return ToolResult::failure(self.name(), "missing required parameter: content");
        };

        let resolved = cwd.join(path);

        if let Some(root) = &self.safety_root {
            let canonical_root = tokio::fs::canonicalize(root).await.unwrap_or_else(|_| root.clone());
            let parent_check = resolved.parent().unwrap_or(&resolved).to_path_buf();
            if !parent_check.starts_with(&canonical_root) && !resolved.starts_with(&canonical_root) {
                return ToolResult::failure(self.name(), "path escapes the allowed workspace");
            }
        }

        if let Some(parent) = resolved.parent() {
            if let Err(e) = create_dir_all_with_mode(parent).await {
                return ToolResult::failure(self.name(), format!("failed to create directories: {e}"));
            }
        }

        match tokio::fs::write(&resolved, content).await {
            Ok(()) => {
                set_file_mode(&resolved).await;
                ToolResult::success(
                    self.name(),
                    format!("wrote {} bytes to {}", content.len(), resolved.display()),
                )
            }
            Err(e) => ToolResult::failure(self.name(), format!("failed to write {}: {e}", resolved.display())),
        }
    }
}

async fn create_dir_all_with_mode(dir: &std::path::Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(DIR_MODE);
        let _ = tokio::fs::set_permissions(dir, perms).await;
    }
    Ok(())
}

async fn set_file_mode(path: &std::path::Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(FILE_MODE);
        let _ = tokio::fs::set_permissions(path, perms).await;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}
