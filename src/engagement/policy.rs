//! Engagement policy: tier selection and the continue/stop decision.
//!
//! Stop conditions are checked in a fixed precedence order; the first one
//! that holds becomes the session's termination reason:
//! 1. turn budget for the current mode
//! 2. wall-clock duration
//! 3. intelligence completeness
//! 4. sender disengaged / suspicious
//! 5. no new intelligence for too long

use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use super::mode::{EngagementMode, TerminationReason};
use crate::config::EngineConfig;
use crate::error::ConfigError;
use crate::intel::{EntityType, Intelligence};

/// When accumulated intelligence counts as complete.
///
/// A list of alternatives: complete when every type of *any* one group is
/// present. An empty rule never fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletenessRule {
    alternatives: Vec<Vec<EntityType>>,
}

impl CompletenessRule {
    pub fn new(alternatives: Vec<Vec<EntityType>>) -> Self {
        Self {
            alternatives: alternatives.into_iter().filter(|g| !g.is_empty()).collect(),
        }
    }

    /// A rule that never reports completion.
    pub fn never() -> Self {
        Self {
            alternatives: Vec::new(),
        }
    }

    pub fn is_satisfied(&self, intelligence: &Intelligence) -> bool {
        self.alternatives
            .iter()
            .any(|group| group.iter().all(|t| intelligence.has_type(*t)))
    }

    /// Types that would still be needed by the closest group.
    pub fn missing(&self, intelligence: &Intelligence) -> Vec<EntityType> {
        self.alternatives
            .iter()
            .map(|group| {
                group
                    .iter()
                    .copied()
                    .filter(|t| !intelligence.has_type(*t))
                    .collect::<Vec<_>>()
            })
            .min_by_key(Vec::len)
            .unwrap_or_default()
    }
}

impl Default for CompletenessRule {
    fn default() -> Self {
        Self::new(vec![
            vec![EntityType::PaymentHandle, EntityType::Phone],
            vec![EntityType::BankAccount, EntityType::Phone],
        ])
    }
}

impl FromStr for CompletenessRule {
    type Err = ConfigError;

    /// Parses `payment_handle+phone|bank_account+phone`. `never` or an empty
    /// string disables the rule.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("never") {
            return Ok(Self::never());
        }
        let mut alternatives = Vec::new();
        for group in s.split('|') {
            let types = group
                .split('+')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| {
                    t.parse::<EntityType>()
                        .map_err(|message| ConfigError::InvalidValue {
                            key: "HONEYPOT_COMPLETE_WHEN".into(),
                            message,
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            alternatives.push(types);
        }
        Ok(Self::new(alternatives))
    }
}

/// State the policy looks at for one turn.
#[derive(Debug, Clone)]
pub struct PolicyInput<'a> {
    /// Stored mode already escalated with this turn's tier.
    pub mode: EngagementMode,
    /// Turns processed before this one.
    pub turn_count: u32,
    pub duration: Duration,
    pub intelligence: &'a Intelligence,
    pub sender_suspicious: bool,
    pub turns_since_new_intelligence: u32,
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Mode NONE: report the verdict, do not engage.
    Observe,
    Engage,
    Stop(TerminationReason),
}

impl PolicyDecision {
    pub fn should_engage(&self) -> bool {
        matches!(self, Self::Engage)
    }
}

/// Tier selection and continuation decisions.
#[derive(Debug, Clone)]
pub struct EngagementPolicy {
    cautious_threshold: f64,
    aggressive_threshold: f64,
    max_turns_cautious: u32,
    max_turns_aggressive: u32,
    max_duration: Duration,
    stale_threshold: u32,
    completeness: CompletenessRule,
}

impl EngagementPolicy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            cautious_threshold: config.cautious_threshold,
            aggressive_threshold: config.aggressive_threshold,
            max_turns_cautious: config.max_turns_cautious,
            max_turns_aggressive: config.max_turns_aggressive,
            max_duration: config.max_duration,
            stale_threshold: config.stale_threshold,
            completeness: config.completeness.clone(),
        }
    }

    /// Stateless tier for a confidence value.
    pub fn tier(&self, confidence: f64) -> EngagementMode {
        if confidence >= self.aggressive_threshold {
            EngagementMode::Aggressive
        } else if confidence >= self.cautious_threshold {
            EngagementMode::Cautious
        } else {
            EngagementMode::None
        }
    }

    pub fn max_turns(&self, mode: EngagementMode) -> u32 {
        match mode {
            EngagementMode::None => 0,
            EngagementMode::Cautious => self.max_turns_cautious,
            EngagementMode::Aggressive => self.max_turns_aggressive,
        }
    }

    pub fn completeness(&self) -> &CompletenessRule {
        &self.completeness
    }

    /// Decide whether to keep engaging this turn.
    pub fn decide(&self, input: &PolicyInput<'_>) -> PolicyDecision {
        if !input.mode.is_engaging() {
            return PolicyDecision::Observe;
        }

        let reason = if input.turn_count >= self.max_turns(input.mode) {
            Some(TerminationReason::MaxTurns)
        } else if input.duration >= self.max_duration {
            Some(TerminationReason::MaxDuration)
        } else if self.completeness.is_satisfied(input.intelligence) {
            Some(TerminationReason::IntelComplete)
        } else if input.sender_suspicious {
            Some(TerminationReason::Suspicious)
        } else if input.turns_since_new_intelligence >= self.stale_threshold {
            Some(TerminationReason::Stale)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!(
                    mode = %input.mode,
                    turn_count = input.turn_count,
                    reason = %reason,
                    "Policy stop condition met"
                );
                PolicyDecision::Stop(reason)
            }
            None => PolicyDecision::Engage,
        }
    }
}
