//! Confirmation coordinator: the decision pipeline between classification
//! and execution.
//!
//! Each request moves through `Idle → Classifying → (AutoAllowed |
//! AutoBlocked | AwaitingUser) → Resolved`. Prompts are serialized FIFO so
//! two confirmations never overlap on the terminal, an unanswered prompt
//! always resolves to a denial at the deadline, and remembered decisions
//! reach the session policy store before the caller sees the verdict.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use squall_core::{CommandRiskAssessment, Error, Result, RiskCategory, SecurityConfig};

use crate::classifier::RiskClassifier;
use crate::policy::{PolicyDecision, SessionPolicyStore};

/// User's (or the timeout path's) verdict on one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmationDecision {
    /// Run this one command
    Allow,
    /// Refuse this one command
    Deny,
    /// Run it and trust matching commands for the session
    Trust,
    /// Refuse it and block matching commands for the session
    Block,
}

impl ConfirmationDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Allow | Self::Trust)
    }
}

/// Resolution of one confirmation, however it was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationResponse {
    pub decision: ConfirmationDecision,
    pub remember_decision: bool,
    pub timed_out: bool,
}

impl ConfirmationResponse {
    pub fn allow() -> Self {
        Self { decision: ConfirmationDecision::Allow, remember_decision: false, timed_out: false }
    }

    pub fn deny() -> Self {
        Self { decision: ConfirmationDecision::Deny, remember_decision: false, timed_out: false }
    }

    pub fn trust() -> Self {
        Self { decision: ConfirmationDecision::Trust, remember_decision: true, timed_out: false }
    }

    pub fn block() -> Self {
        Self { decision: ConfirmationDecision::Block, remember_decision: true, timed_out: false }
    }

    /// Synthesized when the deadline elapses or the session tears down.
    /// Silence never escalates privilege, so a timeout always denies.
    pub fn timed_out_deny() -> Self {
        Self { decision: ConfirmationDecision::Deny, remember_decision: false, timed_out: true }
    }

    pub fn is_approved(&self) -> bool {
        self.decision.is_approved()
    }
}

/// A confirmation waiting for the user. Handed to the prompt renderer;
/// destroyed once a response (including timeout) is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub id: u64,
    pub command: String,
    pub assessment: CommandRiskAssessment,
    pub working_directory: PathBuf,
    pub deadline: chrono::DateTime<Utc>,
}

/// How a request was resolved, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionPath {
    /// No confirmation required
    AutoAllowed,
    /// Blocked before any prompt
    AutoBlocked,
    /// Went through the prompt renderer (or its timeout)
    Prompted,
}

/// One resolved confirmation in the session audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub command: String,
    pub working_directory: PathBuf,
    pub category: RiskCategory,
    pub path: ResolutionPath,
    pub response: ConfirmationResponse,
    pub decided_at: String,
}

/// Per-session confirmation statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorStats {
    pub total: usize,
    pub allowed: usize,
    pub denied: usize,
    pub timed_out: usize,
    pub auto_allowed: usize,
    pub auto_blocked: usize,
    pub remembered: usize,
}

/// External prompt surface. Must resolve exactly once per call and be
/// cancel-safe: the coordinator drops the future on timeout or teardown.
#[async_trait]
pub trait PromptRenderer: Send + Sync {
    async fn show(&self, pending: &PendingConfirmation) -> Result<ConfirmationResponse>;

    fn name(&self) -> &str;
}

/// Renderer that approves everything (full-access sessions and tests).
#[derive(Debug, Default)]
pub struct AutoApprove;

#[async_trait]
impl PromptRenderer for AutoApprove {
    async fn show(&self, _pending: &PendingConfirmation) -> Result<ConfirmationResponse> {
        Ok(ConfirmationResponse::allow())
    }

    fn name(&self) -> &str {
        "auto-approve"
    }
}

/// Renderer that denies everything (read-only sessions and tests).
#[derive(Debug, Default)]
pub struct AutoDeny;

#[async_trait]
impl PromptRenderer for AutoDeny {
    async fn show(&self, _pending: &PendingConfirmation) -> Result<ConfirmationResponse> {
        Ok(ConfirmationResponse::deny())
    }

    fn name(&self) -> &str {
        "auto-deny"
    }
}

type ResponseSenders = Arc<std::sync::Mutex<HashMap<u64, oneshot::Sender<ConfirmationResponse>>>>;

/// Channel-backed renderer bridging the coordinator to a UI event loop.
///
/// The coordinator's `show` sends the [`PendingConfirmation`] over an
/// unbounded channel and suspends on a oneshot; the event loop polls the
/// receiver, renders the prompt, and answers through a
/// [`ChannelRendererHandle`].
pub struct ChannelRenderer {
    request_tx: mpsc::UnboundedSender<PendingConfirmation>,
    senders: ResponseSenders,
}

impl ChannelRenderer {
    /// Returns the renderer and the request receiver the UI should poll.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingConfirmation>) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let renderer =
            Self { request_tx, senders: Arc::new(std::sync::Mutex::new(HashMap::new())) };
        (renderer, request_rx)
    }

    /// Cloneable handle for answering prompts from the UI side.
    pub fn handle(&self) -> ChannelRendererHandle {
        ChannelRendererHandle { senders: Arc::clone(&self.senders) }
    }
}

#[async_trait]
impl PromptRenderer for ChannelRenderer {
    async fn show(&self, pending: &PendingConfirmation) -> Result<ConfirmationResponse> {
        let (tx, rx) = oneshot::channel();

        {
            let mut senders = self.senders.lock().expect("renderer lock poisoned");
            senders.insert(pending.id, tx);
        }

        self.request_tx
            .send(pending.clone())
            .map_err(|e| Error::Unknown(format!("prompt channel closed: {}", e)))?;

        match rx.await {
            Ok(response) => Ok(response),
            // UI dropped the sender without answering; treat as a denial.
            Err(_) => Ok(ConfirmationResponse::deny()),
        }
    }

    fn name(&self) -> &str {
        "channel"
    }
}

/// Handle for answering [`ChannelRenderer`] prompts.
#[derive(Clone)]
pub struct ChannelRendererHandle {
    senders: ResponseSenders,
}

impl ChannelRendererHandle {
    /// Answer a pending prompt. Returns false when the prompt already
    /// resolved (timeout or teardown won the race).
    pub fn respond(&self, id: u64, response: ConfirmationResponse) -> bool {
        let mut senders = self.senders.lock().expect("renderer lock poisoned");
        match senders.remove(&id) {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }
}

/// Orchestrates classify → policy → prompt → record for every command.
pub struct ConfirmationCoordinator {
    classifier: RiskClassifier,
    policy: Arc<SessionPolicyStore>,
    renderer: Arc<dyn PromptRenderer>,
    confirmation_timeout: Duration,
    // tokio's Mutex wakes waiters in FIFO order, which is exactly the
    // queued-prompt ordering the terminal needs.
    prompt_lock: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
    history: std::sync::Mutex<Vec<DecisionRecord>>,
    cancel: CancellationToken,
}

impl ConfirmationCoordinator {
    /// Build a coordinator, seeding the policy store from operator config:
    /// `trusted_commands` become literal trust entries and
    /// `auto_approve_patterns` become regex trust entries.
    pub fn new(
        classifier: RiskClassifier, policy: Arc<SessionPolicyStore>,
        renderer: Arc<dyn PromptRenderer>, config: &SecurityConfig,
    ) -> Result<Self> {
        for command in &config.trusted_commands {
            policy.remember(command.clone(), PolicyDecision::Trust);
        }
        for pattern in &config.auto_approve_patterns {
            policy.remember_regex(pattern.clone(), PolicyDecision::Trust)?;
        }

        info!(
            renderer = renderer.name(),
            timeout_ms = config.confirmation_timeout_ms,
            seeded = policy.len(),
            "confirmation coordinator ready"
        );

        Ok(Self {
            classifier,
            policy,
            renderer,
            confirmation_timeout: config.confirmation_timeout(),
            prompt_lock: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(0),
            history: std::sync::Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Run one command through the decision pipeline.
    ///
    /// Never fails: classification and policy problems fold into the
    /// returned assessment and response, so the caller always receives a
    /// verdict.
    pub async fn confirm(
        &self, command: &str, cwd: &Path,
    ) -> (CommandRiskAssessment, ConfirmationResponse) {
        let command = command.trim().to_string();
        let assessment = self.classifier.classify_with_policy(&command, cwd, Some(&self.policy));

        if assessment.should_block {
            let response = ConfirmationResponse::deny();
            info!(command = %command, reason = %assessment.summary(), "auto-blocked");
            self.record(&command, cwd, &assessment, response, ResolutionPath::AutoBlocked);
            return (assessment, response);
        }

        if !assessment.requires_confirmation {
            let response = ConfirmationResponse::allow();
            debug!(command = %command, category = %assessment.category, "auto-allowed");
            self.record(&command, cwd, &assessment, response, ResolutionPath::AutoAllowed);
            return (assessment, response);
        }

        // Queue behind any active prompt; teardown must also release
        // waiters still queued here.
        let _guard = tokio::select! {
            _ = self.cancel.cancelled() => {
                let response = ConfirmationResponse::timed_out_deny();
                self.record(&command, cwd, &assessment, response, ResolutionPath::Prompted);
                return (assessment, response);
            }
            guard = self.prompt_lock.lock() => guard,
        };

        let pending = PendingConfirmation {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            command: command.clone(),
            assessment: assessment.clone(),
            working_directory: cwd.to_path_buf(),
            deadline: Utc::now()
                + chrono::Duration::from_std(self.confirmation_timeout)
                    .unwrap_or_else(|_| chrono::Duration::seconds(30)),
        };

        debug!(command = %command, id = pending.id, "awaiting user");

        let response = tokio::select! {
            _ = self.cancel.cancelled() => ConfirmationResponse::timed_out_deny(),
            outcome = tokio::time::timeout(
                self.confirmation_timeout,
                self.renderer.show(&pending),
            ) => match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => {
                    warn!(command = %command, error = %e, "prompt renderer failed; denying");
                    ConfirmationResponse::deny()
                }
                Err(_) => {
                    info!(command = %command, "confirmation timed out; denying");
                    ConfirmationResponse::timed_out_deny()
                }
            },
        };

        // The policy write lands before the caller observes the verdict,
        // so the next queued command already benefits from it.
        if response.remember_decision && !response.timed_out {
            let decision = match response.decision {
                ConfirmationDecision::Allow | ConfirmationDecision::Trust => PolicyDecision::Trust,
                ConfirmationDecision::Deny | ConfirmationDecision::Block => PolicyDecision::Block,
            };
            self.policy.remember(&command, decision);
        }

        self.record(&command, cwd, &assessment, response, ResolutionPath::Prompted);
        (assessment, response)
    }

    fn record(
        &self, command: &str, cwd: &Path, assessment: &CommandRiskAssessment,
        response: ConfirmationResponse, path: ResolutionPath,
    ) {
        let record = DecisionRecord {
            command: command.to_string(),
            working_directory: cwd.to_path_buf(),
            category: assessment.category,
            path,
            response,
            decided_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };
        self.history.lock().expect("history lock poisoned").push(record);
    }

    /// Tear down: any active prompt and every queued request resolve with
    /// a deny-timeout, so no caller's await is left unresolved. The policy
    /// store is not cleared here; that stays an explicit session-end call.
    pub fn shutdown(&self) {
        info!("confirmation coordinator shutting down");
        self.cancel.cancel();
    }

    /// End the session: tear down pending work and wipe session policy.
    pub fn end_session(&self) {
        self.shutdown();
        self.policy.clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn policy(&self) -> &Arc<SessionPolicyStore> {
        &self.policy
    }

    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Snapshot of the session audit trail.
    pub fn history(&self) -> Vec<DecisionRecord> {
        self.history.lock().expect("history lock poisoned").clone()
    }

    pub fn stats(&self) -> CoordinatorStats {
        let history = self.history.lock().expect("history lock poisoned");
        let mut stats = CoordinatorStats { total: history.len(), ..Default::default() };

        for record in history.iter() {
            if record.response.is_approved() {
                stats.allowed += 1;
            } else {
                stats.denied += 1;
            }
            if record.response.timed_out {
                stats.timed_out += 1;
            }
            if record.response.remember_decision {
                stats.remembered += 1;
            }
            match record.path {
                ResolutionPath::AutoAllowed => stats.auto_allowed += 1,
                ResolutionPath::AutoBlocked => stats.auto_blocked += 1,
                ResolutionPath::Prompted => {}
            }
        }

        stats
    }
}
