//! Command-risk classification and confirmation engine.
//!
//! The pipeline: a [`PatternRegistry`] supplies tiered classification
//! data, the [`RiskClassifier`] turns a command string into a
//! [`squall_core::CommandRiskAssessment`], the [`ConfirmationCoordinator`]
//! decides auto-allow / auto-block / prompt against the
//! [`SessionPolicyStore`], and the [`ExecutionGate`] is the single
//! checkpoint commands pass through before reaching a process executor.

pub mod classifier;
pub mod coordinator;
pub mod gate;
pub mod policy;
pub mod registry;

pub use classifier::{EscalationPolicy, RiskClassifier};
pub use coordinator::{
    AutoApprove, AutoDeny, ChannelRenderer, ChannelRendererHandle, ConfirmationCoordinator,
    ConfirmationDecision, ConfirmationResponse, CoordinatorStats, DecisionRecord,
    PendingConfirmation, PromptRenderer, ResolutionPath,
};
pub use gate::{ExecutionGate, ExecutionOutcome, ExecutionVerdict, ProcessExecutor};
pub use policy::{PolicyDecision, PolicyPatternKind, SessionPolicyEntry, SessionPolicyStore};
pub use registry::{Matcher, PatternEntry, PatternGroup, PatternRegistry};
