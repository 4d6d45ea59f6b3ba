//! Detection engine: pattern fast path, oracle slow path, monotonic merge.
//!
//! Flow:
//! 1. Pattern matcher (fast, no oracle) → may short-circuit
//! 2. Classification oracle, bounded by timeout/retries
//! 3. Indicator boost (capped) on top of the oracle estimate
//! 4. `max(prior, computed)`: a session's confidence never drops

use std::sync::Arc;

use tracing::{debug, warn};

use super::patterns::PatternMatcher;
use super::types::{ScanResult, Signal, SignalSource, Verdict};
use crate::config::EngineConfig;
use crate::oracle::{ClassificationOracle, ClassifyRequest, OracleGuard};
use crate::pipeline::types::HistoryMessage;

/// Result of assessing one message.
#[derive(Debug, Clone)]
pub struct Detection {
    pub scan: ScanResult,
    pub signal: Signal,
    /// Merged with the prior; never below it.
    pub confidence: f64,
    pub is_scam: bool,
    pub scam_type: Option<String>,
    /// The oracle was needed but failed; the boost-only fallback was used.
    pub oracle_failed: bool,
}

pub struct DetectionEngine {
    matcher: PatternMatcher,
    classifier: Arc<dyn ClassificationOracle>,
    guard: OracleGuard,
    scam_threshold: f64,
    instant_scam_confidence: f64,
    low_safe_confidence: f64,
    max_indicator_boost: f64,
    history_window: usize,
}

impl DetectionEngine {
    pub fn new(
        config: &EngineConfig,
        matcher: PatternMatcher,
        classifier: Arc<dyn ClassificationOracle>,
    ) -> Self {
        Self {
            matcher,
            classifier,
            guard: OracleGuard::new(config.oracle_timeout, config.oracle_max_attempts),
            scam_threshold: config.scam_threshold,
            instant_scam_confidence: config.instant_scam_confidence,
            low_safe_confidence: config.low_safe_confidence,
            max_indicator_boost: config.max_indicator_boost,
            history_window: config.history_window,
        }
    }

    pub fn matcher(&self) -> &PatternMatcher {
        &self.matcher
    }

    /// Assess `message` against the session's prior confidence.
    ///
    /// Infallible: oracle failures degrade to the boost-only estimate.
    pub async fn assess(
        &self,
        message: &str,
        history: &[HistoryMessage],
        prior_confidence: f64,
    ) -> Detection {
        let prior = prior_confidence.clamp(0.0, 1.0);
        let scan = self.matcher.scan(message);
        let boost = scan.bounded_boost(self.max_indicator_boost);

        let (source, computed, scam_type, oracle_failed) = match scan.shortcut {
            Verdict::Scam => {
                debug!(rule = ?scan.rule, "Instant-scam rule matched, skipping classification oracle");
                (
                    SignalSource::DeterministicScam,
                    self.instant_scam_confidence,
                    scan.scam_type.clone(),
                    false,
                )
            }
            Verdict::Safe => {
                debug!(rule = ?scan.rule, "Instant-safe rule matched, skipping classification oracle");
                (SignalSource::DeterministicSafe, self.low_safe_confidence, None, false)
            }
            Verdict::Uncertain => {
                let request = ClassifyRequest {
                    message: message.to_string(),
                    history: recent(history, self.history_window),
                    prior_verdict: self.prior_verdict(prior),
                };
                let classifier = &self.classifier;
                let request = &request;
                match self
                    .guard
                    .call(classifier.name(), move || classifier.classify(request))
                    .await
                {
                    Ok(classification) => {
                        let computed = (classification.confidence + boost).min(1.0);
                        debug!(
                            oracle_confidence = classification.confidence,
                            boost,
                            computed,
                            "Classification oracle verdict"
                        );
                        let scam_type = classification.scam_type.filter(|_| classification.is_scam);
                        (SignalSource::Oracle, computed, scam_type, false)
                    }
                    Err(e) => {
                        warn!(error = %e, boost, "Classification oracle failed, using indicator fallback");
                        (SignalSource::DeterministicUncertain, boost, None, true)
                    }
                }
            }
        };

        let confidence = prior.max(computed.clamp(0.0, 1.0));
        let is_scam = confidence >= self.scam_threshold;
        let verdict = match source {
            SignalSource::DeterministicScam => Verdict::Scam,
            // safe evidence cannot clear a session the prior already convicts
            SignalSource::DeterministicSafe if is_scam => Verdict::Scam,
            SignalSource::DeterministicSafe => Verdict::Safe,
            SignalSource::Oracle if is_scam => Verdict::Scam,
            SignalSource::Oracle => Verdict::Safe,
            SignalSource::DeterministicUncertain if is_scam => Verdict::Scam,
            SignalSource::DeterministicUncertain => Verdict::Uncertain,
        };

        Detection {
            signal: Signal {
                source,
                verdict,
                confidence,
                matched_indicators: scan.indicators.clone(),
            },
            scan,
            confidence,
            is_scam,
            scam_type,
            oracle_failed,
        }
    }

    fn prior_verdict(&self, prior: f64) -> Verdict {
        if prior >= self.scam_threshold {
            Verdict::Scam
        } else if prior > 0.0 {
            Verdict::Safe
        } else {
            Verdict::Uncertain
        }
    }
}

fn recent(history: &[HistoryMessage], window: usize) -> Vec<HistoryMessage> {
    let start = history.len().saturating_sub(window);
    history[start..].to_vec()
}
