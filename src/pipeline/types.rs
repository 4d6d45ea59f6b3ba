//! Request/response types for turn processing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engagement::{EngagementMode, TerminationReason};
use crate::intel::EntityType;
use crate::session::Session;

/// Who sent a history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Scammer,
    User,
}

/// One prior message in the conversation, as supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub sender: Speaker,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl HistoryMessage {
    pub fn scammer(text: impl Into<String>) -> Self {
        Self {
            sender: Speaker::Scammer,
            text: text.into(),
            timestamp: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: Speaker::User,
            text: text.into(),
            timestamp: None,
        }
    }
}

/// Inbound turn over the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
}

/// What the caller gets back for every turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnDecision {
    pub session_id: String,
    pub should_engage: bool,
    /// Reply to send back. Present only when `should_engage`.
    pub reply: Option<String>,
    pub is_scam: bool,
    pub confidence: f64,
    pub mode: EngagementMode,
    pub scam_type: Option<String>,
    pub turns_used: u32,
    pub terminated: bool,
    pub termination_reason: Option<TerminationReason>,
    pub intelligence: BTreeMap<EntityType, Vec<String>>,
    pub suspicious_keywords: Vec<String>,
}

impl TurnDecision {
    /// Build from the persisted session state.
    pub fn from_session(session: &Session, scam_threshold: f64, reply: Option<String>) -> Self {
        Self {
            session_id: session.id.clone(),
            should_engage: reply.is_some(),
            reply,
            is_scam: session.is_scam(scam_threshold),
            confidence: session.confidence,
            mode: session.engagement_mode,
            scam_type: session.scam_type.clone(),
            turns_used: session.turn_count,
            terminated: session.terminated,
            termination_reason: session.termination_reason,
            intelligence: session.intelligence.to_map(),
            suspicious_keywords: session.keywords.iter().cloned().collect(),
        }
    }
}
