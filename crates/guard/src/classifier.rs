//! Command risk classification.
//!
//! `classify` is a pure, synchronous function over the loaded pattern
//! registry: same command, same registry, same assessment. Session policy
//! only adjusts the confirmation/blocking flags, never the displayed
//! category.

use std::path::{Component, Path, PathBuf};

use squall_core::{CommandRiskAssessment, RiskCategory, RiskContext, SecurityConfig};
use tracing::trace;

use crate::policy::{PolicyDecision, SessionPolicyStore};
use crate::registry::{PatternGroup, PatternRegistry};

/// Policy for the "dangerous pattern + sensitive path" escalation rule.
///
/// The exact escalation trigger is configurable rather than hardcoded: a
/// DANGEROUS match whose arguments touch one of `system_paths` escalates
/// one tier, and `escalate_on_traversal` controls whether a detected
/// `../` construct raises the tier or merely records a factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationPolicy {
    pub system_paths: Vec<String>,
    pub escalate_on_traversal: bool,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            system_paths: ["/etc", "/usr", "/bin", "/sbin", "/boot", "/dev", "/var", "/sys", "/proc", "/lib"]
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            escalate_on_traversal: true,
        }
    }
}

impl EscalationPolicy {
    fn is_system_path(&self, path: &Path) -> bool {
        self.system_paths.iter().any(|root| path.starts_with(root))
    }
}

/// Classifies raw command strings into [`CommandRiskAssessment`]s.
#[derive(Debug)]
pub struct RiskClassifier {
    registry: PatternRegistry,
    escalation: EscalationPolicy,
    require_confirmation_for_risky: bool,
    require_confirmation_for_dangerous: bool,
    allow_dangerous: bool,
}

impl RiskClassifier {
    pub fn new(registry: PatternRegistry, config: &SecurityConfig) -> Self {
        Self {
            registry,
            escalation: EscalationPolicy::default(),
            require_confirmation_for_risky: config.require_confirmation_for_risky,
            require_confirmation_for_dangerous: config.require_confirmation_for_dangerous,
            allow_dangerous: config.allow_dangerous,
        }
    }

    /// Classifier with the builtin registry and default settings.
    pub fn with_defaults() -> Self {
        Self::new(PatternRegistry::builtin(), &SecurityConfig::default())
    }

    pub fn with_escalation_policy(mut self, escalation: EscalationPolicy) -> Self {
        self.escalation = escalation;
        self
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Classify a command without session policy. Pure and synchronous;
    /// never fails for string input.
    pub fn classify(&self, command: &str, cwd: &Path) -> CommandRiskAssessment {
        self.classify_with_policy(command, cwd, None)
    }

    /// Classify a command, folding session trust/block decisions into the
    /// confirmation flags. The displayed category is never rewritten by
    /// trust; only `requires_confirmation` and `should_block` move.
    pub fn classify_with_policy(
        &self, command: &str, cwd: &Path, policy: Option<&SessionPolicyStore>,
    ) -> CommandRiskAssessment {
        let normalized = command.trim();

        if normalized.is_empty() {
            return CommandRiskAssessment {
                category: RiskCategory::Low,
                risk_score: RiskCategory::Low.base_score(),
                risk_factors: vec!["empty or unparseable command".to_string()],
                context: RiskContext::new(""),
                requires_confirmation: false,
                should_block: false,
            };
        }

        let command_type = extract_command_type(normalized);
        let mut context = RiskContext::new(command_type);
        let mut factors: Vec<String> = Vec::new();

        let blocked = self.registry.matches(PatternGroup::Blocked, normalized);
        let dangerous = self.registry.matches(PatternGroup::Dangerous, normalized);
        let risky = self.registry.matches(PatternGroup::Risky, normalized);
        let safe = self.registry.matches(PatternGroup::Safe, normalized);

        // Category from the highest-priority tier; factors collected
        // across every matching tier for completeness.
        let mut category = if !blocked.is_empty() {
            RiskCategory::Critical
        } else if !dangerous.is_empty() {
            RiskCategory::High
        } else if !risky.is_empty() {
            RiskCategory::Medium
        } else if !safe.is_empty() {
            RiskCategory::Safe
        } else {
            factors.push(format!("unrecognized command '{}'", context.command_type));
            RiskCategory::Low
        };

        let operator_blocked = blocked.iter().any(|entry| entry.operator);

        for entry in blocked.iter().chain(&dangerous).chain(&risky) {
            factors.push(entry.reason.clone());
            if let Some(impact) = &entry.impact {
                context.potential_impact.push(impact.clone());
            }
            if let Some(mitigation) = &entry.mitigation {
                context.mitigation_suggestions.push(mitigation.clone());
            }
        }

        // Dangerous command aimed at a system directory: one tier up.
        if (!blocked.is_empty() || !dangerous.is_empty())
            && let Some(path) = self.system_path_argument(normalized)
        {
            factors.push(format!("targets system directory {}", path.display()));
            category = category.escalate();
        }

        // Expansion and traversal widen the blast radius of whatever the
        // base command is; each detected construct raises one tier.
        for entry in self.registry.matches(PatternGroup::Expansion, normalized) {
            factors.push(entry.reason.clone());
            if let Some(impact) = &entry.impact {
                context.potential_impact.push(impact.clone());
            }
            if let Some(mitigation) = &entry.mitigation {
                context.mitigation_suggestions.push(mitigation.clone());
            }
            category = category.escalate();
        }

        for entry in self.registry.matches(PatternGroup::Traversal, normalized) {
            factors.push(entry.reason.clone());
            if let Some(mitigation) = &entry.mitigation {
                context.mitigation_suggestions.push(mitigation.clone());
            }
            if self.escalation.escalate_on_traversal {
                category = category.escalate();
            }
            if let Some(target) = self.traversal_into_system_path(normalized, cwd) {
                factors.push(format!("traversal resolves into {}", target.display()));
                category = category.escalate();
            }
        }

        context.potential_impact.dedup();
        context.mitigation_suggestions.dedup();

        let session = policy.and_then(|store| store.lookup(normalized));
        let trusted = session == Some(PolicyDecision::Trust);

        if session == Some(PolicyDecision::Block) {
            let pattern = policy
                .and_then(|store| store.matching_block_pattern(normalized))
                .unwrap_or_else(|| normalized.to_string());
            factors.push(format!("matches session block pattern '{}'", pattern));

            trace!(command = normalized, category = %category, "session block");
            return CommandRiskAssessment {
                category,
                risk_score: score(category, &factors),
                risk_factors: factors,
                context,
                requires_confirmation: false,
                should_block: true,
            };
        }

        let (requires_confirmation, should_block) = match category {
            RiskCategory::Safe | RiskCategory::Low => (false, false),
            RiskCategory::Medium => (self.require_confirmation_for_risky && !trusted, false),
            RiskCategory::High => {
                let confirm = self.require_confirmation_for_dangerous || !self.allow_dangerous;
                (confirm && !trusted, false)
            }
            RiskCategory::Critical => {
                if operator_blocked {
                    // Operator block entries are absolute; trust cannot
                    // downgrade them.
                    (false, true)
                } else if trusted {
                    // Trust downgrades the block to a prompt, never to a
                    // silent allow, and never touches the category.
                    (true, false)
                } else {
                    (false, true)
                }
            }
        };

        trace!(
            command = normalized,
            category = %category,
            requires_confirmation,
            should_block,
            "classified"
        );

        CommandRiskAssessment {
            category,
            risk_score: score(category, &factors),
            risk_factors: factors,
            context,
            requires_confirmation,
            should_block,
        }
    }

    /// First non-flag argument that lands inside a configured system path.
    fn system_path_argument(&self, command: &str) -> Option<PathBuf> {
        command
            .split_whitespace()
            .skip(1)
            .filter(|token| !token.starts_with('-'))
            .map(|token| token.trim_matches(|c| c == '"' || c == '\''))
            .filter(|token| token.starts_with('/'))
            .map(PathBuf::from)
            .find(|path| self.escalation.is_system_path(path))
    }

    /// Lexically resolve `../`-bearing arguments against the working
    /// directory; report the target when it escapes into a system path.
    fn traversal_into_system_path(&self, command: &str, cwd: &Path) -> Option<PathBuf> {
        command
            .split_whitespace()
            .filter(|token| token.contains("../"))
            .map(|token| token.trim_matches(|c| c == '"' || c == '\''))
            .map(|token| normalize_lexically(&cwd.join(token)))
            .find(|path| self.escalation.is_system_path(path))
    }
}

/// Fixed base per tier plus one increment per risk factor beyond the
/// first, so the score orders stably without re-running classification.
fn score(category: RiskCategory, factors: &[String]) -> u32 {
    category.base_score() + factors.len().saturating_sub(1) as u32
}

/// Leading token of the command, skipping environment-variable assignment
/// prefixes like `FOO=bar cmd`.
fn extract_command_type(command: &str) -> &str {
    command
        .split_whitespace()
        .find(|token| !is_env_assignment(token))
        .unwrap_or("")
}

fn is_env_assignment(token: &str) -> bool {
    match token.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}
