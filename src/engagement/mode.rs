//! Engagement tiers and termination reasons.

use serde::{Deserialize, Serialize};

/// Engagement intensity tier.
///
/// Ordered: `None < Cautious < Aggressive`. A session's stored mode only
/// ever moves up this order.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EngagementMode {
    /// Not (yet) judged a scam: observe only, never engage.
    #[default]
    None,
    Cautious,
    Aggressive,
}

impl EngagementMode {
    /// The higher of two tiers.
    pub fn escalate(self, computed: EngagementMode) -> EngagementMode {
        self.max(computed)
    }

    pub fn is_engaging(&self) -> bool {
        !matches!(self, Self::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cautious => "cautious",
            Self::Aggressive => "aggressive",
        }
    }
}

impl std::fmt::Display for EngagementMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a session stopped engaging. Variants are listed in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    MaxTurns,
    MaxDuration,
    IntelComplete,
    Suspicious,
    Stale,
}

impl TerminationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxTurns => "max_turns",
            Self::MaxDuration => "max_duration",
            Self::IntelComplete => "intel_complete",
            Self::Suspicious => "suspicious",
            Self::Stale => "stale",
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
