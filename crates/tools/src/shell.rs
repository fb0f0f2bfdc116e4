//! Shell command execution behind the gate.
//!
//! [`SystemExecutor`] is the real process-execution collaborator:
//! `sh -c` via tokio, output captured, killed at the execution deadline.
//! [`ShellTool`] is the seam an agent loop calls; every command it
//! receives goes through the [`ExecutionGate`], never straight to a
//! process.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use squall_core::{Error, Result, RiskCategory};
use squall_guard::{ExecutionGate, ExecutionOutcome, ProcessExecutor};

use crate::tool::{Tool, ToolResult};

/// Runs commands through `sh -c` on the tokio runtime.
#[derive(Debug, Default)]
pub struct SystemExecutor;

#[async_trait]
impl ProcessExecutor for SystemExecutor {
    async fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> Result<ExecutionOutcome> {
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Execution(format!("failed to spawn '{}': {}", command, e)))?;

        let waited = tokio::time::timeout(timeout, async {
            // Drain both pipes concurrently so neither can fill and stall
            // the child before wait() returns.
            let (stdout, stderr) = tokio::join!(
                read_stream(child.stdout.take()),
                read_stream(child.stderr.take()),
            );
            let status = child.wait().await;
            (status, stdout, stderr)
        })
        .await;

        match waited {
            Ok((status, stdout, stderr)) => {
                let status =
                    status.map_err(|e| Error::Execution(format!("wait failed: {}", e)))?;
                Ok(ExecutionOutcome::Completed {
                    exit_code: status.code().unwrap_or(-1),
                    stdout,
                    stderr,
                })
            }
            Err(_) => {
                // Deadline elapsed: kill the child and surface a distinct
                // timeout outcome rather than an error.
                let _ = child.kill().await;
                debug!(command, timeout_ms = timeout.as_millis() as u64, "execution timed out");
                Ok(ExecutionOutcome::TimedOut { elapsed_ms: timeout.as_millis() as u64 })
            }
        }
    }

    fn name(&self) -> &str {
        "system"
    }
}

async fn read_stream(stream: Option<impl tokio::io::AsyncRead + Unpin>) -> String {
    use tokio::io::AsyncReadExt;

    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buffer).await;
    }
    String::from_utf8_lossy(&buffer).to_string()
}

/// A tool that executes shell commands, gated by the confirmation engine.
pub struct ShellTool {
    gate: Arc<ExecutionGate>,
    working_directory: PathBuf,
}

impl std::fmt::Debug for ShellTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellTool")
            .field("working_directory", &self.working_directory)
            .finish_non_exhaustive()
    }
}

impl ShellTool {
    pub fn new(gate: Arc<ExecutionGate>, working_directory: impl Into<PathBuf>) -> Self {
        Self { gate, working_directory: working_directory.into() }
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute shell commands locally. Every command is classified and subject to confirmation policy."
    }

    fn risk_category(&self) -> RiskCategory {
        RiskCategory::High
    }

    async fn execute(&self, tool_call_id: String, arguments: &Value) -> Result<ToolResult> {
        let command = arguments
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Execution("missing or invalid 'command' parameter".to_string()))?;

        let verdict = self.gate.request_execution(command, &self.working_directory).await?;

        match verdict.outcome {
            Some(ExecutionOutcome::Completed { exit_code, stdout, stderr }) => {
                let content = if !stderr.is_empty() && exit_code != 0 {
                    format!(
                        "Command failed with exit code {}\n\nSTDERR:\n{}\n\nSTDOUT:\n{}",
                        exit_code, stderr, stdout
                    )
                } else if !stderr.is_empty() {
                    format!(
                        "Command completed with warnings\n\nSTDERR:\n{}\n\nSTDOUT:\n{}",
                        stderr, stdout
                    )
                } else {
                    stdout
                };
                Ok(ToolResult::success(tool_call_id, content))
            }
            Some(ExecutionOutcome::TimedOut { elapsed_ms }) => Ok(ToolResult::error(
                tool_call_id,
                format!("command '{}' timed out after {}ms", command, elapsed_ms),
            )),
            None => {
                let refusal = verdict
                    .refusal
                    .unwrap_or_else(|| format!("command '{}' was refused", command));
                Ok(ToolResult::error(tool_call_id, refusal))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squall_core::SecurityConfig;
    use squall_guard::{
        AutoApprove, AutoDeny, ConfirmationCoordinator, PromptRenderer, RiskClassifier,
        SessionPolicyStore,
    };

    fn shell_tool(renderer: Arc<dyn PromptRenderer>) -> ShellTool {
        let config = SecurityConfig::default();
        let coordinator = ConfirmationCoordinator::new(
            RiskClassifier::with_defaults(),
            Arc::new(SessionPolicyStore::new()),
            renderer,
            &config,
        )
        .unwrap();
        let gate =
            ExecutionGate::new(Arc::new(coordinator), Arc::new(SystemExecutor), &config);
        ShellTool::new(Arc::new(gate), std::env::temp_dir())
    }

    #[tokio::test]
    async fn test_system_executor_captures_stdout() {
        let outcome = SystemExecutor
            .run("echo 'Hello, shell!'", &std::env::temp_dir(), Duration::from_secs(5))
            .await
            .unwrap();

        match outcome {
            ExecutionOutcome::Completed { exit_code, stdout, .. } => {
                assert_eq!(exit_code, 0);
                assert_eq!(stdout, "Hello, shell!\n");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_system_executor_reports_exit_code() {
        let outcome = SystemExecutor
            .run("exit 42", &std::env::temp_dir(), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(matches!(outcome, ExecutionOutcome::Completed { exit_code: 42, .. }));
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_system_executor_kills_at_deadline() {
        let outcome = SystemExecutor
            .run("sleep 30", &std::env::temp_dir(), Duration::from_millis(100))
            .await
            .unwrap();

        assert!(outcome.timed_out());
    }

    #[tokio::test]
    async fn test_system_executor_runs_in_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let outcome = SystemExecutor
            .run("pwd", temp.path(), Duration::from_secs(5))
            .await
            .unwrap();

        match outcome {
            ExecutionOutcome::Completed { stdout, .. } => {
                assert!(stdout.trim_end().ends_with(
                    temp.path().file_name().unwrap().to_str().unwrap()
                ));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_shell_tool_properties() {
        let tool = shell_tool(Arc::new(AutoApprove));
        assert_eq!(tool.name(), "shell");
        assert_eq!(tool.risk_category(), RiskCategory::High);
    }

    #[tokio::test]
    async fn test_shell_tool_executes_safe_command() {
        let tool = shell_tool(Arc::new(AutoDeny));
        let args = serde_json::json!({"command": "echo gated"});

        let result = tool.execute("call_1".to_string(), &args).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.content, "gated\n");
    }

    #[tokio::test]
    async fn test_shell_tool_missing_command_is_error() {
        let tool = shell_tool(Arc::new(AutoApprove));
        let args = serde_json::json!({});

        let result = tool.execute("call_2".to_string(), &args).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("'command'"));
    }

    #[tokio::test]
    async fn test_shell_tool_refuses_blocked_command() {
        let tool = shell_tool(Arc::new(AutoApprove));
        let args = serde_json::json!({"command": "rm -rf /"});

        let result = tool.execute("call_3".to_string(), &args).await.unwrap();
        assert!(result.is_error());
        let error = result.error.unwrap();
        assert!(error.contains("blocked"));
        assert!(error.contains("critical"));
    }

    #[tokio::test]
    async fn test_shell_tool_refuses_denied_command() {
        let tool = shell_tool(Arc::new(AutoDeny));
        let args = serde_json::json!({"command": "npm install lodash"});

        let result = tool.execute("call_4".to_string(), &args).await.unwrap();
        assert!(result.is_error());
        assert!(result.error.unwrap().contains("package installation"));
    }
}
