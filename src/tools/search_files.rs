//! `search_files` tool (§4.B). Bounds work by max depth, max files
//! scanned, and max results; prunes hidden directories and well-known
//! noisy ones; an overrun still returns success with a diagnostic suffix
//! rather than failing outright.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ParamSpec;
use crate::agent::types::{ToolCall, ToolResult};

use super::traits::Tool;

pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_MAX_FILES_SCANNED: usize = 10_000;
pub const DEFAULT_MAX_RESULTS: usize = 100;

const NOISY_DIRS: &[&str] = &["node_modules", "target", ".git", "dist", "build", ".cache", "vendor"];

/// Breadth-limited walk from `root`. Returns matched paths (files only
/// when `pattern` is set; both files and immediate directories when it
/// is not, for `list_directory`'s reuse), the number of entries scanned,
/// and whether either bound was hit.
pub fn walk_bounded(
    root: &Path,
    max_depth: usize,
    max_scanned: usize,
    max_results: usize,
    pattern: Option<&str>,
) -> (Vec<PathBuf>, usize, bool) {
    let mut results = Vec::new();
    let mut scanned = 0usize;
    let mut overran = false;
    let mut stack = vec![(root.to_path_buf(), 0usize)];

    while let Some((dir, depth)) = stack.pop() {
        if results.len() >= max_results {
            overran = true;
            break;
        }
        let Ok(read_dir) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in read_dir.flatten() {
            if scanned >= max_scanned {
                overran = true;
                break;
            }
            scanned += 1;

            let path = entry.path();
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();

            if name.starts_with('.') || NOISY_DIRS.contains(&name.as_ref()) {
                continue;
            }

            let is_dir = path.is_dir();
            if is_dir && pattern.is_none() {
                results.push(path.clone());
            }
            if is_dir {
                if depth + 1 < max_depth {
                    stack.push((path, depth + 1));
                }
                continue;
            }

            let matches = pattern.map(|p| glob_match(p, &name)).unwrap_or(true);
            if matches {
                results.push(path);
                if results.len() >= max_results {
                    overran = true;
                    break;
                }
            }
        }
        if overran {
            break;
        }
    }

    (results, scanned, overran)
}

/// Minimal `*`/`?` glob matcher, sufficient for `search_files` patterns
/// like `*.md`.
fn glob_match(pattern: &str, name: &str) -> bool {
    fn recurse(p: &[char], n: &[char]) -> bool {
        match p.first() {
            None => n.is_empty(),
            Some('*') => recurse(&p[1..], n) || (!n.is_empty() && recurse(p, &n[1..])),
            Some('?') => !n.is_empty() && recurse(&p[1..], &n[1..]),
            Some(c) => n.first() == Some(c) && recurse(&p[1..], &n[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    recurse(&p, &n)
}

pub struct SearchFilesTool;

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search for files under the working directory matching a glob pattern."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "pattern".to_string(),
            type_name: "string".to_string(),
            required: true,
            description: "Glob pattern, e.g. \"*.md\".".to_string(),
        }]
    }

    async fn execute(&self, _ctx: CancellationToken, call: &ToolCall, cwd: &mut PathBuf) -> ToolResult {
        let Some(pattern) = call.params.get("pattern") else {
            return ToolResult::failure(self.name(), "missing required parameter: pattern");
        };

        let root = cwd.clone();
        let pattern = pattern.clone();
        let (matches, scanned, overran) = tokio::task::spawn_blocking(move || {
            walk_bounded(&root, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILES_SCANNED, DEFAULT_MAX_RESULTS, Some(&pattern))
        })
        .await
        .unwrap_or((Vec::new(), 0, false));

        if matches.is_empty() {
            return ToolResult::success(self.name(), "no files found");
        }

        let mut output = matches
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");

        if overran {
            output.push_str(&format!(
                "\n... [stopped after scanning {scanned} files / {DEFAULT_MAX_RESULTS} results; results may be incomplete]"
            ));
        }

        ToolResult::success(self.name(), output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn finds_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("readme.md"), "x").await.unwrap();
        tokio::fs::write(dir.path().join("main.rs"), "x").await.unwrap();

        let tool = SearchFilesTool;
        let mut cwd = dir.path().to_path_buf();
        let mut params = HashMap::new();
        params.insert("pattern".to_string(), "*.md".to_string());
        let call = ToolCall::new("search_files", params);

        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;
        assert!(result.success);
        assert!(result.output.contains("readme.md"));
        assert!(!result.output.contains("main.rs"));
    }

    #[tokio::test]
    async fn no_matches_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SearchFilesTool;
        let mut cwd = dir.path().to_path_buf();
        let mut params = HashMap::new();
        params.insert("pattern".to_string(), "*.nonexistent".to_string());
        let call = ToolCall::new("search_files", params);

        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;
        assert!(result.success);
        assert_eq!(result.output, "no files found");
    }

    #[test]
    fn hidden_and_noisy_dirs_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git").join("config"), "x").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules").join("pkg.json"), "x").unwrap();
        std::fs::write(dir.path().join("visible.txt"), "x").unwrap();

        let (matches, _, _) = walk_bounded(dir.path(), DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILES_SCANNED, DEFAULT_MAX_RESULTS, Some("*"));
        assert!(matches.iter().any(|p| p.ends_with("visible.txt")));
        assert!(!matches.iter().any(|p| p.to_string_lossy().contains(".git")));
        assert!(!matches.iter().any(|p| p.to_string_lossy().contains("node_modules")));
    }
}
