//! External classification and engagement oracles.
//!
//! Both are opaque, fallible, and possibly slow. Callers wrap every call in
//! an [`OracleGuard`] and treat any failure as "oracle unavailable".

mod classifier;
mod engager;
pub mod guard;
pub mod json;

pub use classifier::LlmClassifier;
pub use engager::LlmEngager;
pub use guard::OracleGuard;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::detection::Verdict;
use crate::engagement::{EmotionalState, EngagementMode};
use crate::error::OracleError;
use crate::intel::{EntityType, ExtractedEntity};
use crate::pipeline::types::HistoryMessage;

/// Input to one classification call.
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub message: String,
    /// Bounded recent history.
    pub history: Vec<HistoryMessage>,
    pub prior_verdict: Verdict,
}

/// The classification oracle's judgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub is_scam: bool,
    /// Scam likelihood in [0, 1].
    pub confidence: f64,
    pub scam_type: Option<String>,
    pub reasoning: String,
}

#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification, OracleError>;
}

/// Session facts handed to the engagement oracle.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    pub mode: EngagementMode,
    pub turn_count: u32,
    pub confidence: f64,
    pub scam_type: Option<String>,
    pub known_types: Vec<EntityType>,
    /// Types that would complete the current completeness group.
    pub missing_types: Vec<EntityType>,
}

#[derive(Debug, Clone)]
pub struct EngagementRequest {
    pub message: String,
    pub history: Vec<HistoryMessage>,
    pub emotional_state: EmotionalState,
    pub context: SessionContext,
}

/// Engagement oracle output.
///
/// `reply` is optional so a response with a usable entity list but no reply
/// can still contribute intelligence; the caller substitutes a fallback.
#[derive(Debug, Clone, Default)]
pub struct EngagementOutput {
    pub reply: Option<String>,
    pub entities: Vec<ExtractedEntity>,
    pub notes: Option<String>,
    pub sender_suspicious: bool,
}

#[async_trait]
pub trait EngagementOracle: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &EngagementRequest) -> Result<EngagementOutput, OracleError>;
}
