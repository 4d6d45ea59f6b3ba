//! Engagement policy: tier selection, stop conditions and persona stance.

pub mod emotion;
pub mod fallback;
pub mod mode;
pub mod policy;

pub use emotion::EmotionalState;
pub use fallback::fallback_reply;
pub use mode::{EngagementMode, TerminationReason};
pub use policy::{CompletenessRule, EngagementPolicy, PolicyDecision, PolicyInput};
