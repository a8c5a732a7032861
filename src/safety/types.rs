// Data types for Safety module

use serde::{Deserialize, Serialize};

/// Risk tier, ordered by the scrutiny a command needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    /// Always allowed
    Safe,
    /// Allowed with monitoring
    Caution,
    /// Unknown or malformed, needs a human
    Warning,
    /// Modifies the system, needs a human
    Danger,
    /// Never allowed
    Forbidden,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "SAFE",
            RiskLevel::Caution => "CAUTION",
            RiskLevel::Warning => "WARNING",
            RiskLevel::Danger => "DANGER",
            RiskLevel::Forbidden => "FORBIDDEN",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of pre-execution vetting. Computed fresh per command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub risk_level: RiskLevel,
    /// Execution may proceed without further gating
    pub allowed: bool,
    pub reason: String,
    /// A human must confirm before execution
    pub requires_approval: bool,
    #[serde(default)]
    pub suggested_alternative: Option<String>,
}

impl SafetyVerdict {
    pub fn safe(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Safe,
            allowed: true,
            reason: reason.into(),
            requires_approval: false,
            suggested_alternative: None,
        }
    }

    pub fn caution(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Caution,
            allowed: true,
            reason: reason.into(),
            requires_approval: false,
            suggested_alternative: None,
        }
    }

    pub fn warning(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Warning,
            allowed: false,
            reason: reason.into(),
            requires_approval: true,
            suggested_alternative: None,
        }
    }

    pub fn danger(reason: impl Into<String>) -> Self {
        Self {
            risk_level: RiskLevel::Danger,
            allowed: false,
            reason: reason.into(),
            requires_approval: true,
            suggested_alternative: None,
        }
    }

    pub fn forbidden(reason: impl Into<String>, alternative: Option<String>) -> Self {
        Self {
            risk_level: RiskLevel::Forbidden,
            allowed: false,
            reason: reason.into(),
            requires_approval: false,
            suggested_alternative: alternative,
        }
    }

    /// Blocked outright: neither allowed nor eligible for approval
    pub fn is_blocked(&self) -> bool {
        !self.allowed && !self.requires_approval
    }
}
