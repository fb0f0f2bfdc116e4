//! Execution gate: the single mandatory checkpoint between a classified,
//! confirmed command and actual process execution.
//!
//! The gate only reads verdicts; it never mutates session policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use squall_core::{CommandRiskAssessment, Error, Result, SecurityConfig};

use crate::coordinator::{ConfirmationCoordinator, ConfirmationDecision, ConfirmationResponse};

/// Result of actually running a command. A killed-at-deadline process is
/// a distinct outcome, not a general error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "status")]
pub enum ExecutionOutcome {
    /// Process ran to completion, with whatever exit code it produced
    Completed { exit_code: i32, stdout: String, stderr: String },
    /// Killed when the execution deadline elapsed
    TimedOut { elapsed_ms: u64 },
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Completed { exit_code: 0, .. })
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// Process-execution collaborator. Implementations own the spawn, the
/// output capture, and the kill-on-timeout behavior.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn run(&self, command: &str, cwd: &Path, timeout: Duration) -> Result<ExecutionOutcome>;

    fn name(&self) -> &str;
}

/// What the gate returns for one execution request: the verdict, the
/// assessment behind it, and either the process outcome or a refusal
/// message that names why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionVerdict {
    pub decision: ConfirmationDecision,
    pub assessment: CommandRiskAssessment,
    pub response: ConfirmationResponse,
    /// Present only when the command actually ran
    pub outcome: Option<ExecutionOutcome>,
    /// Present only when the command was refused
    pub refusal: Option<String>,
}

impl ExecutionVerdict {
    pub fn executed(&self) -> bool {
        self.outcome.is_some()
    }
}

/// The choke point a tool pipeline passes through before any command
/// reaches the operating system.
pub struct ExecutionGate {
    coordinator: Arc<ConfirmationCoordinator>,
    executor: Arc<dyn ProcessExecutor>,
    max_execution_time: Duration,
}

impl ExecutionGate {
    pub fn new(
        coordinator: Arc<ConfirmationCoordinator>, executor: Arc<dyn ProcessExecutor>,
        config: &SecurityConfig,
    ) -> Self {
        Self { coordinator, executor, max_execution_time: config.max_execution_time() }
    }

    pub fn coordinator(&self) -> &Arc<ConfirmationCoordinator> {
        &self.coordinator
    }

    /// Sole public entry point for running a command.
    ///
    /// Denials are folded into the verdict, not raised: only executor
    /// failures (a process that could not be spawned, an I/O fault)
    /// surface as `Err`.
    pub async fn request_execution(&self, command: &str, cwd: &Path) -> Result<ExecutionVerdict> {
        let command = command.trim();
        if command.is_empty() {
            return Err(Error::Execution("refusing to execute an empty command".to_string()));
        }

        let (assessment, response) = self.coordinator.confirm(command, cwd).await;

        if response.is_approved() {
            debug!(command, executor = self.executor.name(), "forwarding to executor");
            let outcome = self.executor.run(command, cwd, self.max_execution_time).await?;
            return Ok(ExecutionVerdict {
                decision: response.decision,
                assessment,
                response,
                outcome: Some(outcome),
                refusal: None,
            });
        }

        let refusal = format_refusal(command, &assessment, &response);
        info!(command, refusal = %refusal, "refused");
        Ok(ExecutionVerdict {
            decision: response.decision,
            assessment,
            response,
            outcome: None,
            refusal: Some(refusal),
        })
    }
}

/// A refusal always reports why: the matched category and every recorded
/// risk factor, plus mitigations when the registry has them.
fn format_refusal(
    command: &str, assessment: &CommandRiskAssessment, response: &ConfirmationResponse,
) -> String {
    let verb = if response.timed_out {
        "denied (confirmation timed out)"
    } else if assessment.should_block {
        "blocked"
    } else {
        "denied"
    };

    let mut message = format!("command '{}' was {} [{}]", command, verb, assessment.category);

    if !assessment.risk_factors.is_empty() {
        message.push_str(": ");
        message.push_str(&assessment.risk_factors.join("; "));
    }

    if !assessment.context.mitigation_suggestions.is_empty() {
        message.push_str("; consider: ");
        message.push_str(&assessment.context.mitigation_suggestions.join("; "));
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RiskClassifier;
    use crate::coordinator::{AutoApprove, AutoDeny, PromptRenderer};
    use crate::policy::SessionPolicyStore;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Executor that records invocations and replays a scripted outcome.
    #[derive(Debug)]
    struct MockExecutor {
        outcome: ExecutionOutcome,
        invocations: Mutex<Vec<String>>,
    }

    impl MockExecutor {
        fn completing(exit_code: i32) -> Self {
            Self {
                outcome: ExecutionOutcome::Completed {
                    exit_code,
                    stdout: "out".to_string(),
                    stderr: String::new(),
                },
                invocations: Mutex::new(Vec::new()),
            }
        }

        fn timing_out() -> Self {
            Self {
                outcome: ExecutionOutcome::TimedOut { elapsed_ms: 120_000 },
                invocations: Mutex::new(Vec::new()),
            }
        }

        fn invocations(&self) -> Vec<String> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessExecutor for MockExecutor {
        async fn run(
            &self, command: &str, _cwd: &Path, _timeout: Duration,
        ) -> Result<ExecutionOutcome> {
            self.invocations.lock().unwrap().push(command.to_string());
            Ok(self.outcome.clone())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    fn gate_with(
        renderer: Arc<dyn PromptRenderer>, executor: Arc<MockExecutor>,
    ) -> ExecutionGate {
        let config = SecurityConfig::default();
        let coordinator = ConfirmationCoordinator::new(
            RiskClassifier::with_defaults(),
            Arc::new(SessionPolicyStore::new()),
            renderer,
            &config,
        )
        .unwrap();
        ExecutionGate::new(Arc::new(coordinator), executor, &config)
    }

    fn cwd() -> PathBuf {
        PathBuf::from("/home/user")
    }

    #[tokio::test]
    async fn test_safe_command_executes() {
        let executor = Arc::new(MockExecutor::completing(0));
        let gate = gate_with(Arc::new(AutoDeny), Arc::clone(&executor));

        let verdict = gate.request_execution("ls -la", &cwd()).await.unwrap();
        assert!(verdict.executed());
        assert!(verdict.outcome.as_ref().unwrap().succeeded());
        assert_eq!(executor.invocations(), vec!["ls -la".to_string()]);
    }

    #[tokio::test]
    async fn test_blocked_command_never_reaches_executor() {
        let executor = Arc::new(MockExecutor::completing(0));
        let gate = gate_with(Arc::new(AutoApprove), Arc::clone(&executor));

        let verdict = gate.request_execution("rm -rf /", &cwd()).await.unwrap();
        assert!(!verdict.executed());
        assert!(executor.invocations().is_empty());

        let refusal = verdict.refusal.unwrap();
        assert!(refusal.contains("blocked"));
        assert!(refusal.contains("critical"));
        assert!(refusal.contains("deletion"));
    }

    #[tokio::test]
    async fn test_denied_command_refusal_names_reason() {
        let executor = Arc::new(MockExecutor::completing(0));
        let gate = gate_with(Arc::new(AutoDeny), Arc::clone(&executor));

        let verdict = gate.request_execution("npm install lodash", &cwd()).await.unwrap();
        assert!(!verdict.executed());
        assert!(executor.invocations().is_empty());

        let refusal = verdict.refusal.unwrap();
        assert!(refusal.contains("denied"));
        assert!(refusal.contains("medium"));
        assert!(refusal.contains("package installation"));
    }

    #[tokio::test]
    async fn test_empty_command_is_an_error() {
        let executor = Arc::new(MockExecutor::completing(0));
        let gate = gate_with(Arc::new(AutoApprove), Arc::clone(&executor));

        let result = gate.request_execution("   ", &cwd()).await;
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), Error::Execution(_)));
        assert!(executor.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_timeout_outcome_is_distinct_from_failure() {
        let executor = Arc::new(MockExecutor::timing_out());
        let gate = gate_with(Arc::new(AutoApprove), Arc::clone(&executor));

        let verdict = gate.request_execution("npm install lodash", &cwd()).await.unwrap();
        let outcome = verdict.outcome.unwrap();
        assert!(outcome.timed_out());
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn test_nonzero_exit_still_a_completed_outcome() {
        let executor = Arc::new(MockExecutor::completing(2));
        let gate = gate_with(Arc::new(AutoApprove), Arc::clone(&executor));

        let verdict = gate.request_execution("ls missing-dir", &cwd()).await.unwrap();
        let outcome = verdict.outcome.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Completed { exit_code: 2, .. }));
        assert!(!outcome.succeeded());
    }

    #[test]
    fn test_refusal_formatting_includes_mitigations() {
        let assessment = CommandRiskAssessment {
            category: squall_core::RiskCategory::High,
            risk_score: 71,
            risk_factors: vec!["recursive force deletion".to_string()],
            context: squall_core::RiskContext::new("rm")
                .with_mitigation("list the target first; remove the -f flag"),
            requires_confirmation: true,
            should_block: false,
        };

        let message = format_refusal("rm -rf ./build", &assessment, &ConfirmationResponse::deny());
        assert!(message.contains("denied"));
        assert!(message.contains("recursive force deletion"));
        assert!(message.contains("consider"));
    }

    #[test]
    fn test_refusal_formatting_timeout_variant() {
        let assessment = CommandRiskAssessment {
            category: squall_core::RiskCategory::Medium,
            risk_score: 40,
            risk_factors: vec!["package installation".to_string()],
            context: squall_core::RiskContext::new("npm"),
            requires_confirmation: true,
            should_block: false,
        };

        let message = format_refusal(
            "npm install lodash",
            &assessment,
            &ConfirmationResponse::timed_out_deny(),
        );
        assert!(message.contains("confirmation timed out"));
    }
}
