//! Structured emotional state handed to the engagement oracle.
//!
//! The core never writes persona text itself; it only tells the oracle which
//! stance to take this turn.

use serde::{Deserialize, Serialize};

use super::mode::EngagementMode;

/// Turns without new intelligence after which the persona switches stance.
const STANCE_SWITCH_AFTER: u32 = 2;

/// Persona stance for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    /// Asks questions, not yet convinced.
    Curious,
    /// Believes the threat, anxious to resolve it.
    Worried,
    /// Willing to comply, asks how to pay or where to send.
    Cooperative,
    /// Stalls and asks for alternate contact or verification details.
    Hesitant,
}

impl EmotionalState {
    /// Stance for the next reply given the session's progress.
    pub fn for_turn(mode: EngagementMode, turn_count: u32, turns_since_new_intel: u32) -> Self {
        let stuck = turns_since_new_intel >= STANCE_SWITCH_AFTER;
        match mode {
            EngagementMode::None => Self::Curious,
            EngagementMode::Cautious if turn_count == 0 => Self::Curious,
            EngagementMode::Cautious if stuck => Self::Cooperative,
            EngagementMode::Cautious => Self::Hesitant,
            EngagementMode::Aggressive if turn_count == 0 => Self::Worried,
            EngagementMode::Aggressive if stuck => Self::Hesitant,
            EngagementMode::Aggressive => Self::Cooperative,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Curious => "curious",
            Self::Worried => "worried",
            Self::Cooperative => "cooperative",
            Self::Hesitant => "hesitant",
        }
    }
}

impl std::fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
