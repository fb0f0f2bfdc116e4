use serde::{Deserialize, Serialize};

/// Severity tier assigned to a shell command.
///
/// The derived `Ord` follows declaration order, so
/// `Safe < Low < Medium < High < Critical` holds and the most severe
/// of several matches can be picked with `max`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RiskCategory {
    /// Known read-only or otherwise harmless commands
    Safe,
    /// Unrecognized commands; mildly risky because they could be anything
    #[default]
    Low,
    /// Commands that change workspace state (installs, moves, chmod)
    Medium,
    /// Destructive or privilege-adjacent commands
    High,
    /// Commands that must never run without an explicit trust override
    Critical,
}

impl RiskCategory {
    pub const VALUES: &[RiskCategory] = &[
        RiskCategory::Safe,
        RiskCategory::Low,
        RiskCategory::Medium,
        RiskCategory::High,
        RiskCategory::Critical,
    ];

    /// Fixed base used when deriving a numeric risk score for this tier.
    pub fn base_score(&self) -> u32 {
        match self {
            RiskCategory::Safe => 0,
            RiskCategory::Low => 10,
            RiskCategory::Medium => 40,
            RiskCategory::High => 70,
            RiskCategory::Critical => 90,
        }
    }

    /// The next tier up, saturating at `Critical`.
    pub fn escalate(&self) -> RiskCategory {
        match self {
            RiskCategory::Safe => RiskCategory::Low,
            RiskCategory::Low => RiskCategory::Medium,
            RiskCategory::Medium => RiskCategory::High,
            RiskCategory::High | RiskCategory::Critical => RiskCategory::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Safe => "safe",
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
            RiskCategory::Critical => "critical",
        }
    }

    pub fn is_safe(&self) -> bool {
        matches!(self, Self::Safe)
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RiskCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(RiskCategory::Safe),
            "low" => Ok(RiskCategory::Low),
            "medium" => Ok(RiskCategory::Medium),
            "high" => Ok(RiskCategory::High),
            "critical" => Ok(RiskCategory::Critical),
            _ => Err(format!("invalid risk category: {}", s)),
        }
    }
}

/// Supporting detail for an assessment: what kind of command it is, what
/// could go wrong, and how the blast radius could be reduced.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RiskContext {
    /// Leading token of the command (after env-var assignment prefixes)
    pub command_type: String,
    /// What the command could affect if it misbehaves
    pub potential_impact: Vec<String>,
    /// Suggestions for running the command with less risk
    pub mitigation_suggestions: Vec<String>,
}

impl RiskContext {
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            potential_impact: Vec::new(),
            mitigation_suggestions: Vec::new(),
        }
    }

    pub fn with_impact(mut self, impact: impl Into<String>) -> Self {
        self.potential_impact.push(impact.into());
        self
    }

    pub fn with_mitigation(mut self, mitigation: impl Into<String>) -> Self {
        self.mitigation_suggestions.push(mitigation.into());
        self
    }
}

/// Immutable result of classifying one command.
///
/// Invariants upheld by the classifier:
/// - `should_block` implies `requires_confirmation` is false; blocked
///   commands fail immediately and never reach a prompt.
/// - `category == Critical` implies `should_block`, unless the exact
///   command matched a session-trusted pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRiskAssessment {
    pub category: RiskCategory,
    /// Monotonic with severity; tie-breaking and display only
    pub risk_score: u32,
    /// Human-readable reasons, in detection order
    pub risk_factors: Vec<String>,
    pub context: RiskContext,
    pub requires_confirmation: bool,
    pub should_block: bool,
}

impl CommandRiskAssessment {
    /// One-line summary used in refusal messages and logs.
    pub fn summary(&self) -> String {
        match self.risk_factors.first() {
            Some(factor) => format!("{}: {}", self.category, factor),
            None => self.category.to_string(),
        }
    }

    pub fn is_auto_allowed(&self) -> bool {
        !self.requires_confirmation && !self.should_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_total_order() {
        assert!(RiskCategory::Safe < RiskCategory::Low);
        assert!(RiskCategory::Low < RiskCategory::Medium);
        assert!(RiskCategory::Medium < RiskCategory::High);
        assert!(RiskCategory::High < RiskCategory::Critical);

        let most_severe = RiskCategory::VALUES.iter().copied().max().unwrap();
        assert_eq!(most_severe, RiskCategory::Critical);
    }

    #[test]
    fn test_category_default_is_low() {
        assert_eq!(RiskCategory::default(), RiskCategory::Low);
    }

    #[test]
    fn test_base_scores_monotonic() {
        let scores: Vec<u32> = RiskCategory::VALUES.iter().map(|c| c.base_score()).collect();
        for pair in scores.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_escalate_saturates_at_critical() {
        assert_eq!(RiskCategory::Safe.escalate(), RiskCategory::Low);
        assert_eq!(RiskCategory::Medium.escalate(), RiskCategory::High);
        assert_eq!(RiskCategory::High.escalate(), RiskCategory::Critical);
        assert_eq!(RiskCategory::Critical.escalate(), RiskCategory::Critical);
    }

    #[test]
    fn test_category_from_str() {
        use std::str::FromStr;

        assert_eq!(RiskCategory::from_str("safe").unwrap(), RiskCategory::Safe);
        assert_eq!(RiskCategory::from_str("CRITICAL").unwrap(), RiskCategory::Critical);
        assert!(RiskCategory::from_str("extreme").is_err());
    }

    #[test]
    fn test_risk_context_builder() {
        let ctx = RiskContext::new("rm")
            .with_impact("permanent file deletion")
            .with_mitigation("use a trash utility instead");

        assert_eq!(ctx.command_type, "rm");
        assert_eq!(ctx.potential_impact.len(), 1);
        assert_eq!(ctx.mitigation_suggestions.len(), 1);
    }

    #[test]
    fn test_assessment_summary() {
        let assessment = CommandRiskAssessment {
            category: RiskCategory::High,
            risk_score: 71,
            risk_factors: vec!["recursive file deletion".to_string()],
            context: RiskContext::new("rm"),
            requires_confirmation: true,
            should_block: false,
        };

        assert_eq!(assessment.summary(), "high: recursive file deletion");
        assert!(!assessment.is_auto_allowed());
    }

    #[test]
    fn test_assessment_serialization() {
        let assessment = CommandRiskAssessment {
            category: RiskCategory::Medium,
            risk_score: 40,
            risk_factors: vec!["package installation".to_string()],
            context: RiskContext::new("npm").with_impact("modifies node_modules"),
            requires_confirmation: true,
            should_block: false,
        };

        let json = serde_json::to_string(&assessment).unwrap();
        assert!(json.contains("\"medium\""));
        assert!(json.contains("package installation"));

        let deserialized: CommandRiskAssessment = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, assessment);
    }
}
