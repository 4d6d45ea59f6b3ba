//! Shared types for the detection pipeline.

use serde::{Deserialize, Serialize};

use crate::intel::ExtractedEntity;

/// Three-valued judgement about a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Scam,
    Safe,
    Uncertain,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scam => "scam",
            Self::Safe => "safe",
            Self::Uncertain => "uncertain",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which route produced a turn's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    DeterministicScam,
    DeterministicSafe,
    DeterministicUncertain,
    Oracle,
}

/// Weighted indicator families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorCategory {
    Urgency,
    Threat,
    CredentialRequest,
    PaymentRequest,
    Impersonation,
    AccountVerification,
    Reward,
    SuspiciousLink,
    RemoteAccess,
    Secrecy,
}

/// One matched indicator: `(category, weight, description)` plus the text
/// that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub category: IndicatorCategory,
    pub weight: f64,
    pub description: String,
    /// Lowercased matched fragment.
    pub matched_text: String,
}

/// Output of one Pattern Matcher scan.
#[derive(Debug, Clone)]
pub struct ScanResult {
    pub shortcut: Verdict,
    /// Name of the instant rule that decided the shortcut, if any.
    pub rule: Option<String>,
    /// Scam label attached to the matching instant-scam rule.
    pub scam_type: Option<String>,
    /// Full weighted indicator list, computed whatever the shortcut.
    pub indicators: Vec<Indicator>,
    pub entities: Vec<ExtractedEntity>,
    /// The sender appears to have noticed or given up.
    pub disengaged: bool,
}

impl ScanResult {
    /// Empty scan, used for blank input.
    pub fn empty() -> Self {
        Self {
            shortcut: Verdict::Uncertain,
            rule: None,
            scam_type: None,
            indicators: Vec::new(),
            entities: Vec::new(),
            disengaged: false,
        }
    }

    /// Sum of indicator weights, capped.
    pub fn bounded_boost(&self, cap: f64) -> f64 {
        self.indicators
            .iter()
            .map(|i| i.weight)
            .sum::<f64>()
            .min(cap)
            .max(0.0)
    }
}

/// The detection pipeline's working unit for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub source: SignalSource,
    pub verdict: Verdict,
    /// Meaningful alongside `verdict == Scam`.
    pub confidence: f64,
    pub matched_indicators: Vec<Indicator>,
}
