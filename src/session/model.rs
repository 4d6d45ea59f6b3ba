//! Per-conversation session state.
//!
//! Monotonic fields (`confidence`, `engagement_mode`, `intelligence`,
//! `terminated`, `scam_type`) are only ever changed through the methods
//! here, and [`enforce_monotonic`] re-checks them against the stored copy
//! before every write.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::detection::{Indicator, SignalSource};
use crate::engagement::{EngagementMode, TerminationReason};
use crate::intel::Intelligence;

/// Distinct suspicious keywords kept per session.
const MAX_KEYWORDS: usize = 50;
/// Agent notes kept per session.
const MAX_NOTES: usize = 20;

/// One turn's matched indicators, for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub turn: u32,
    pub source: SignalSource,
    pub confidence: f64,
    pub indicators: Vec<Indicator>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Write counter; 0 means never persisted.
    #[serde(default)]
    pub version: u64,
    pub turn_count: u32,
    pub confidence: f64,
    pub engagement_mode: EngagementMode,
    pub scam_type: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_turn_time: DateTime<Utc>,
    pub intelligence: Intelligence,
    pub turns_since_new_intelligence: u32,
    pub terminated: bool,
    pub termination_reason: Option<TerminationReason>,
    #[serde(default)]
    pub sender_suspicious: bool,
    /// Scammer side of the caller-supplied history has been mined.
    #[serde(default)]
    pub history_scanned: bool,
    #[serde(default)]
    pub keywords: BTreeSet<String>,
    #[serde(default)]
    pub audit: Vec<AuditEntry>,
    #[serde(default)]
    pub notes: Vec<String>,
    /// Final report delivered to the callback.
    #[serde(default)]
    pub report_sent: bool,
}

/// A write that would have broken a monotonic field.
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    ConfidenceRegressed { stored: f64, computed: f64 },
    ModeRegressed { stored: EngagementMode, computed: EngagementMode },
    IntelligenceShrank { missing: usize },
    TerminationReverted,
    ScamTypeChanged { stored: String, computed: Option<String> },
    TurnCountRegressed { stored: u32, computed: u32 },
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfidenceRegressed { stored, computed } => {
                write!(f, "confidence would drop from {stored} to {computed}")
            }
            Self::ModeRegressed { stored, computed } => {
                write!(f, "mode would drop from {stored} to {computed}")
            }
            Self::IntelligenceShrank { missing } => {
                write!(f, "intelligence would lose {missing} entries")
            }
            Self::TerminationReverted => f.write_str("terminated session would resume"),
            Self::ScamTypeChanged { stored, computed } => {
                write!(f, "scam type would change from {stored} to {computed:?}")
            }
            Self::TurnCountRegressed { stored, computed } => {
                write!(f, "turn count would drop from {stored} to {computed}")
            }
        }
    }
}

impl Session {
    /// Fresh, never-persisted session.
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            version: 0,
            turn_count: 0,
            confidence: 0.0,
            engagement_mode: EngagementMode::None,
            scam_type: None,
            start_time: now,
            last_turn_time: now,
            intelligence: Intelligence::new(),
            turns_since_new_intelligence: 0,
            terminated: false,
            termination_reason: None,
            sender_suspicious: false,
            history_scanned: false,
            keywords: BTreeSet::new(),
            audit: Vec::new(),
            notes: Vec::new(),
            report_sent: false,
        }
    }

    pub fn is_scam(&self, scam_threshold: f64) -> bool {
        self.confidence >= scam_threshold
    }

    /// Elapsed time since the first turn.
    pub fn duration(&self, now: DateTime<Utc>) -> std::time::Duration {
        (now - self.start_time).to_std().unwrap_or_default()
    }

    /// Adopt a newly computed confidence, refusing any decrease.
    pub fn raise_confidence(&mut self, computed: f64) -> Option<Anomaly> {
        let computed = computed.clamp(0.0, 1.0);
        if computed < self.confidence {
            return Some(Anomaly::ConfidenceRegressed {
                stored: self.confidence,
                computed,
            });
        }
        self.confidence = computed;
        None
    }

    pub fn escalate_mode(&mut self, tier: EngagementMode) {
        self.engagement_mode = self.engagement_mode.escalate(tier);
    }

    /// Set the scam label if none is recorded yet.
    pub fn set_scam_type_once(&mut self, scam_type: Option<String>) {
        if self.scam_type.is_none() {
            self.scam_type = scam_type;
        }
    }

    /// Update the staleness counter after an accumulation step.
    pub fn record_intelligence_turn(&mut self, grew: bool) {
        if grew {
            self.turns_since_new_intelligence = 0;
        } else {
            self.turns_since_new_intelligence += 1;
        }
    }

    /// Terminate once; later calls keep the first reason.
    pub fn terminate(&mut self, reason: TerminationReason) {
        if !self.terminated {
            self.terminated = true;
            self.termination_reason = Some(reason);
        }
    }

    pub fn record_audit(&mut self, entry: AuditEntry, cap: usize) {
        for indicator in &entry.indicators {
            if self.keywords.len() >= MAX_KEYWORDS {
                break;
            }
            self.keywords.insert(indicator.matched_text.clone());
        }
        if cap == 0 {
            return;
        }
        self.audit.push(entry);
        if self.audit.len() > cap {
            let excess = self.audit.len() - cap;
            self.audit.drain(..excess);
        }
    }

    pub fn record_note(&mut self, note: String) {
        if self.notes.len() < MAX_NOTES && !self.notes.contains(&note) {
            self.notes.push(note);
        }
    }
}

/// Repair `candidate` so no monotonic field regresses relative to `stored`.
///
/// Returns every anomaly found; each one is logged at error level. The
/// stored value wins.
pub fn enforce_monotonic(stored: &Session, candidate: &mut Session) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    if candidate.confidence < stored.confidence {
        anomalies.push(Anomaly::ConfidenceRegressed {
            stored: stored.confidence,
            computed: candidate.confidence,
        });
        candidate.confidence = stored.confidence;
    }
    if candidate.engagement_mode < stored.engagement_mode {
        anomalies.push(Anomaly::ModeRegressed {
            stored: stored.engagement_mode,
            computed: candidate.engagement_mode,
        });
        candidate.engagement_mode = stored.engagement_mode;
    }
    if !candidate.intelligence.is_superset_of(&stored.intelligence) {
        let missing = candidate.intelligence.union_with(&stored.intelligence);
        anomalies.push(Anomaly::IntelligenceShrank { missing });
    }
    if stored.terminated && !candidate.terminated {
        anomalies.push(Anomaly::TerminationReverted);
        candidate.terminated = true;
        candidate.termination_reason = stored.termination_reason;
    }
    if let Some(ref stored_type) = stored.scam_type
        && candidate.scam_type.as_ref() != Some(stored_type)
    {
        anomalies.push(Anomaly::ScamTypeChanged {
            stored: stored_type.clone(),
            computed: candidate.scam_type.clone(),
        });
        candidate.scam_type = Some(stored_type.clone());
    }
    if candidate.turn_count < stored.turn_count {
        anomalies.push(Anomaly::TurnCountRegressed {
            stored: stored.turn_count,
            computed: candidate.turn_count,
        });
        candidate.turn_count = stored.turn_count;
    }
    candidate.sender_suspicious |= stored.sender_suspicious;
    candidate.history_scanned |= stored.history_scanned;

    for anomaly in &anomalies {
        error!(session_id = %stored.id, anomaly = %anomaly, "Monotonic invariant violated, keeping stored value");
    }
    anomalies
}
