//! `run_command` tool (§4.B). Runs a subshell with a 30 s wall-time cap;
//! the child is started in its own process group so a timeout or
//! cancellation can kill the whole tree rather than just the shell.
//! Grounded in `stencila-stencila/rust/agents/src/execution/local.rs`'s
//! `exec_command` (spawn in a fresh process group, SIGTERM then SIGKILL
//! after a grace period, reader tasks that outlive a timed-out wait).

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use crate::agent::prompt::ParamSpec;
use crate::agent::types::{ToolCall, ToolResult};

use super::pid_registry::{NoOpPidRegistry, PidRegistry};
use super::traits::{cap_output, Tool};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const KILL_GRACE_PERIOD: Duration = Duration::from_secs(2);
const MAX_OUTPUT_BYTES: usize = 20_000;

pub struct RunCommandTool {
    pid_registry: Arc<dyn PidRegistry>,
}

impl RunCommandTool {
    pub fn new(pid_registry: Arc<dyn PidRegistry>) -> Self {
        RunCommandTool { pid_registry }
    }
}

impl Default for RunCommandTool {
    fn default() -> Self {
        RunCommandTool { pid_registry: Arc::new(NoOpPidRegistry) }
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in the working directory, with a 30 second timeout."
    }

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "command".to_string(),
            type_name: "string".to_string(),
            required: true,
            description: "The shell command to run.".to_string(),
        }]
    }

    async fn execute(&self, ctx: CancellationToken, call: &ToolCall, cwd: &mut PathBuf) -> ToolResult {
        let Some(command) = call.params.get("command") else {
            return ToolResult::failure(self.name(), "missing required parameter: command");
        };

        #[cfg(unix)]
        let mut cmd = {
            let mut c = tokio::process::Command::new("/bin/sh");
            c.arg("-c").arg(command);
            c
        };
        #[cfg(not(unix))]
        let mut cmd = {
            let mut c = tokio::process::Command::new("cmd");
            c.arg("/C").arg(command);
            c
        };
        cmd.current_dir(&cwd);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        #[cfg(unix)]
        cmd.process_group(0);
        cmd.kill_on_drop(true);

        let label = command.clone();
        let start = Instant::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return ToolResult::failure(self.name(), format!("failed to spawn command: {e}")),
        };

        let pid = child.id();
        if let Some(pid) = pid {
            self.pid_registry.track_process(pid, &label);
        }

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(out) = stdout_pipe.as_mut() {
                let _ = out.read_to_string(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(err) = stderr_pipe.as_mut() {
                let _ = err.read_to_string(&mut buf).await;
            }
            buf
        });

        let outcome = tokio::select! {
            _ = ctx.cancelled() => RunOutcome::Cancelled,
            result = tokio::time::timeout(COMMAND_TIMEOUT, child.wait()) => match result {
                Ok(Ok(status)) => RunOutcome::Exited(status.success()),
                Ok(Err(e)) => RunOutcome::SpawnError(e.to_string()),
                Err(_) => RunOutcome::TimedOut,
            },
        };

        if matches!(outcome, RunOutcome::TimedOut | RunOutcome::Cancelled) {
            #[cfg(unix)]
            if let Some(pid) = pid {
                kill_process_group(pid, libc::SIGTERM);
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
            }
            tokio::time::sleep(KILL_GRACE_PERIOD).await;
            #[cfg(unix)]
            if let Some(pid) = pid {
                kill_process_group(pid, libc::SIGKILL);
            }
            #[cfg(not(unix))]
            {
                let _ = child.start_kill();
            }
            let _ = child.wait().await;
        }

        if let Some(pid) = pid {
            self.pid_registry.untrack_process(pid);
        }

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        let elapsed = start.elapsed();

        match outcome {
            RunOutcome::Cancelled => ToolResult::failure(self.name(), "command cancelled"),
            RunOutcome::TimedOut => ToolResult::failure(
                self.name(),
                format!(
                    "command timed out after {}s. Partial output:\n{}",
                    COMMAND_TIMEOUT.as_secs(),
                    cap_output(stdout, MAX_OUTPUT_BYTES)
                ),
            ),
            RunOutcome::SpawnError(e) => ToolResult::failure(self.name(), format!("error waiting for command: {e}")),
            RunOutcome::Exited(true) => {
                maybe_update_cwd(command, &stdout, cwd);
                ToolResult::success(self.name(), cap_output(stdout, MAX_OUTPUT_BYTES))
            }
            RunOutcome::Exited(false) => ToolResult::failure(
                self.name(),
                cap_output(format!("command failed after {:?}:\n{}", elapsed, stderr), MAX_OUTPUT_BYTES),
            ),
        }
    }
}

enum RunOutcome {
    Exited(bool),
    TimedOut,
    Cancelled,
    SpawnError(String),
}

#[cfg(unix)]
fn kill_process_group(pid: u32, signal: i32) {
    // SAFETY: `pid` was just obtained from a child spawned with its own
    // process group (`process_group(0)`), so `-pid` addresses that group.
    unsafe {
        libc::kill(-(pid as i32), signal);
    }
}

/// If `command` is exactly `cd <dir> && pwd`, the trailing `pwd` output
/// replaces the working directory for subsequent calls in this run.
fn maybe_update_cwd(command: &str, stdout: &str, cwd: &mut PathBuf) {
    let trimmed = command.trim();
    if let Some(rest) = trimmed.strip_prefix("cd ") {
        if let Some((_, after_and)) = rest.split_once("&&") {
            if after_and.trim() == "pwd" {
                if let Some(new_dir) = stdout.lines().next_back() {
                    let new_dir = new_dir.trim();
                    if !new_dir.is_empty() {
                        *cwd = PathBuf::from(new_dir);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn successful_command_returns_stdout() {
        let tool = RunCommandTool::default();
        let mut cwd = PathBuf::from(".");
        let mut params = HashMap::new();
        params.insert("command".to_string(), "echo hello".to_string());
        let call = ToolCall::new("run_command", params);

        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;
        assert!(result.success);
        assert!(result.output.contains("hello"));
    }

    #[tokio::test]
    async fn failing_command_reports_failure() {
        let tool = RunCommandTool::default();
        let mut cwd = PathBuf::from(".");
        let mut params = HashMap::new();
        params.insert("command".to_string(), "exit 7".to_string());
        let call = ToolCall::new("run_command", params);

        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn cd_and_pwd_updates_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        tokio::fs::create_dir(&sub).await.unwrap();

        let tool = RunCommandTool::default();
        let mut cwd = dir.path().to_path_buf();
        let mut params = HashMap::new();
        params.insert("command".to_string(), "cd sub && pwd".to_string());
        let call = ToolCall::new("run_command", params);

        let result = tool.execute(CancellationToken::new(), &call, &mut cwd).await;
        assert!(result.success);
        assert_eq!(cwd, sub.canonicalize().unwrap_or(sub));
    }

    #[test]
    fn maybe_update_cwd_ignores_unrelated_commands() {
        let mut cwd = PathBuf::from("/tmp");
        maybe_update_cwd("ls -la", "file1\nfile2", &mut cwd);
        assert_eq!(cwd, PathBuf::from("/tmp"));
    }
}
