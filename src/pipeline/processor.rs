//! Turn processor: runs one scammer message through the full pipeline.
//!
//! Flow:
//! 1. Per-session lock, then read; a terminated session answers with its
//!    final decision and is not mutated
//! 2. Detection engine → confidence (never lower than before) → tier
//! 3. Engagement policy → observe, engage, or stop
//! 4. Engaged turns: engagement oracle reply + intelligence accumulation
//! 5. Compare-and-swap write, recomputed from a fresh read on conflict
//! 6. Once terminated, the session's report is delivered exactly once

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::detection::{DetectionEngine, PatternMatcher};
use crate::engagement::{
    EmotionalState, EngagementPolicy, PolicyDecision, PolicyInput, fallback_reply,
};
use crate::error::EngineError;
use crate::intel::{ExtractedEntity, IntelligenceAccumulator, extract_entities};
use crate::oracle::{
    ClassificationOracle, EngagementOracle, EngagementOutput, EngagementRequest, OracleGuard,
    SessionContext,
};
use crate::pipeline::report::{IntelligenceReporter, SessionReport};
use crate::pipeline::types::{HistoryMessage, Speaker, TurnDecision};
use crate::session::{
    AuditEntry, CasOutcome, Session, SessionLocks, SessionStore, enforce_monotonic,
};

/// The turn-processing core.
///
/// Shared by every request; per-session ordering comes from the internal
/// lock registry, cross-process safety from the store's compare-and-swap.
pub struct TurnProcessor {
    config: EngineConfig,
    detector: DetectionEngine,
    policy: EngagementPolicy,
    accumulator: IntelligenceAccumulator,
    engager: Arc<dyn EngagementOracle>,
    engage_guard: OracleGuard,
    store: Arc<dyn SessionStore>,
    reporter: Arc<dyn IntelligenceReporter>,
    locks: SessionLocks,
}

/// Session state after one computed (not yet persisted) turn.
struct TurnOutcome {
    session: Session,
    reply: Option<String>,
    decision: PolicyDecision,
}

impl TurnProcessor {
    pub fn new(
        config: EngineConfig,
        matcher: PatternMatcher,
        classifier: Arc<dyn ClassificationOracle>,
        engager: Arc<dyn EngagementOracle>,
        store: Arc<dyn SessionStore>,
        reporter: Arc<dyn IntelligenceReporter>,
    ) -> Self {
        Self {
            detector: DetectionEngine::new(&config, matcher, classifier),
            policy: EngagementPolicy::new(&config),
            accumulator: IntelligenceAccumulator::new(config.max_other_labeled),
            engage_guard: OracleGuard::new(config.oracle_timeout, config.oracle_max_attempts),
            engager,
            store,
            reporter,
            locks: SessionLocks::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Process one inbound message for `session_id`.
    ///
    /// Only store failures and exhausted write retries surface as errors;
    /// oracle trouble degrades to deterministic fallbacks.
    pub async fn process_turn(
        &self,
        session_id: &str,
        message: &str,
        history: &[HistoryMessage],
    ) -> Result<TurnDecision, EngineError> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return Err(EngineError::InvalidRequest(
                "session_id must not be empty".into(),
            ));
        }

        let _guard = self.locks.acquire(session_id).await;
        let threshold = self.config.scam_threshold;

        for attempt in 1..=self.config.store_max_attempts {
            let stored = self.store.get(session_id).await?;

            if let Some(existing) = stored.as_ref().filter(|s| s.terminated) {
                debug!(
                    session_id,
                    reason = ?existing.termination_reason,
                    "Session already terminated, returning final decision"
                );
                let existing = self.deliver_report(existing.clone()).await;
                return Ok(TurnDecision::from_session(&existing, threshold, None));
            }

            let now = Utc::now();
            let base = stored
                .clone()
                .unwrap_or_else(|| Session::new(session_id, now));
            let expected_version = base.version;

            let TurnOutcome {
                mut session,
                reply,
                decision,
            } = self.run_turn(base, message, history, now).await;

            if let Some(ref stored) = stored {
                enforce_monotonic(stored, &mut session);
            }

            match self
                .store
                .compare_and_swap(session_id, expected_version, &session)
                .await?
            {
                CasOutcome::Swapped => {
                    session.version = expected_version + 1;
                    info!(
                        session_id,
                        turn = session.turn_count,
                        confidence = session.confidence,
                        mode = %session.engagement_mode,
                        decision = ?decision,
                        "Turn processed"
                    );
                    let session = if session.terminated {
                        self.deliver_report(session).await
                    } else {
                        session
                    };
                    return Ok(TurnDecision::from_session(&session, threshold, reply));
                }
                CasOutcome::Conflict => {
                    warn!(
                        session_id,
                        attempt,
                        max_attempts = self.config.store_max_attempts,
                        "Session changed during turn, recomputing from fresh read"
                    );
                }
            }
        }

        Err(EngineError::StoreConflict {
            session_id: session_id.to_string(),
            attempts: self.config.store_max_attempts,
        })
    }

    /// Compute the next session state for one message.
    async fn run_turn(
        &self,
        mut session: Session,
        message: &str,
        history: &[HistoryMessage],
        now: DateTime<Utc>,
    ) -> TurnOutcome {
        let scan_history = !session.history_scanned;

        let detection = self
            .detector
            .assess(message, history, session.confidence)
            .await;

        if let Some(anomaly) = session.raise_confidence(detection.confidence) {
            error!(session_id = %session.id, anomaly = %anomaly, "Detection produced a lower confidence");
        }
        session.set_scam_type_once(detection.scam_type.clone());
        session.record_audit(
            AuditEntry {
                turn: session.turn_count,
                source: detection.signal.source,
                confidence: detection.confidence,
                indicators: detection.signal.matched_indicators.clone(),
                at: now,
            },
            self.config.audit_cap,
        );
        session.escalate_mode(self.policy.tier(session.confidence));
        if detection.scan.disengaged {
            session.sender_suspicious = true;
        }

        let decision = self.policy.decide(&PolicyInput {
            mode: session.engagement_mode,
            turn_count: session.turn_count,
            duration: session.duration(now),
            intelligence: &session.intelligence,
            sender_suspicious: session.sender_suspicious,
            turns_since_new_intelligence: session.turns_since_new_intelligence,
        });

        let mut reply = None;
        match decision {
            PolicyDecision::Observe => {
                debug!(session_id = %session.id, confidence = session.confidence, "Below engagement threshold, observing");
            }
            PolicyDecision::Stop(reason) => {
                let candidates = deterministic_candidates(&detection.scan.entities, history, scan_history);
                self.accumulate(&mut session, candidates);
                session.history_scanned = true;
                session.terminate(reason);
                info!(
                    session_id = %session.id,
                    reason = %reason,
                    turns = session.turn_count + 1,
                    entities = session.intelligence.total(),
                    "Engagement terminated"
                );
            }
            PolicyDecision::Engage => {
                let output = self.engage(&session, message, history).await;
                let EngagementOutput {
                    reply: oracle_reply,
                    entities: oracle_entities,
                    notes,
                    sender_suspicious,
                } = output.unwrap_or_default();

                if let Some(note) = notes {
                    session.record_note(note);
                }
                if sender_suspicious {
                    session.sender_suspicious = true;
                }

                let mut candidates =
                    deterministic_candidates(&detection.scan.entities, history, scan_history);
                candidates.extend(oracle_entities);
                self.accumulate(&mut session, candidates);
                session.history_scanned = true;

                reply = Some(oracle_reply.unwrap_or_else(|| {
                    fallback_reply(session.engagement_mode, session.turn_count).to_string()
                }));
            }
        }

        session.turn_count += 1;
        session.last_turn_time = now;

        TurnOutcome {
            session,
            reply,
            decision,
        }
    }

    /// Ask the engagement oracle for a reply; `None` on any failure.
    async fn engage(
        &self,
        session: &Session,
        message: &str,
        history: &[HistoryMessage],
    ) -> Option<EngagementOutput> {
        let window = self.config.history_window;
        let request = EngagementRequest {
            message: message.to_string(),
            history: history[history.len().saturating_sub(window)..].to_vec(),
            emotional_state: EmotionalState::for_turn(
                session.engagement_mode,
                session.turn_count,
                session.turns_since_new_intelligence,
            ),
            context: SessionContext {
                session_id: session.id.clone(),
                mode: session.engagement_mode,
                turn_count: session.turn_count,
                confidence: session.confidence,
                scam_type: session.scam_type.clone(),
                known_types: session.intelligence.present_types(),
                missing_types: self.policy.completeness().missing(&session.intelligence),
            },
        };

        let engager = &self.engager;
        let request = &request;
        match self
            .engage_guard
            .call(engager.name(), move || engager.generate(request))
            .await
        {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Engagement oracle failed, using fallback reply");
                None
            }
        }
    }

    fn accumulate(&self, session: &mut Session, candidates: Vec<ExtractedEntity>) {
        let outcome = self.accumulator.merge(&mut session.intelligence, candidates);
        session.record_intelligence_turn(outcome.grew());
        if outcome.grew() {
            info!(
                session_id = %session.id,
                added = outcome.added.len(),
                total = session.intelligence.total(),
                "New intelligence collected"
            );
        }
    }

    /// Send the final report if it has not gone out yet.
    ///
    /// Failures are logged and retried on the session's next turn.
    async fn deliver_report(&self, mut session: Session) -> Session {
        if session.report_sent {
            return session;
        }

        let report = SessionReport::from_session(&session, self.config.scam_threshold);
        if let Err(e) = self.reporter.report(&report).await {
            warn!(session_id = %session.id, error = %e, "Intelligence report failed, will retry");
            return session;
        }

        let expected_version = session.version;
        session.report_sent = true;
        match self
            .store
            .compare_and_swap(&session.id, expected_version, &session)
            .await
        {
            Ok(CasOutcome::Swapped) => session.version = expected_version + 1,
            Ok(CasOutcome::Conflict) => {
                warn!(session_id = %session.id, "Session changed before report flag was saved");
            }
            Err(e) => {
                warn!(session_id = %session.id, error = %e, "Failed to record report delivery");
            }
        }
        session
    }
}

/// Entities from the current message, plus the scammer side of the
/// supplied history until a session first accumulates.
fn deterministic_candidates(
    current: &[ExtractedEntity],
    history: &[HistoryMessage],
    scan_history: bool,
) -> Vec<ExtractedEntity> {
    let mut candidates = current.to_vec();
    if scan_history {
        for msg in history.iter().filter(|m| m.sender == Speaker::Scammer) {
            candidates.extend(extract_entities(&msg.text));
        }
    }
    candidates
}
