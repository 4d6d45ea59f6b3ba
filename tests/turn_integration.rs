//! End-to-end turn processing against in-memory stores and scripted oracles.
//!
//! No network: both oracles are stubs that count their calls, so each test
//! can assert exactly when the pipeline consulted them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use scam_honeypot::config::EngineConfig;
use scam_honeypot::detection::PatternMatcher;
use scam_honeypot::engagement::{EngagementMode, TerminationReason, fallback_reply};
use scam_honeypot::error::{EngineError, OracleError, ReportError, StoreError};
use scam_honeypot::intel::{EntityOrigin, EntityType, ExtractedEntity};
use scam_honeypot::oracle::{
    Classification, ClassificationOracle, ClassifyRequest, EngagementOracle, EngagementOutput,
    EngagementRequest,
};
use scam_honeypot::pipeline::{HistoryMessage, IntelligenceReporter, SessionReport, TurnProcessor};
use scam_honeypot::session::{CasOutcome, MemorySessionStore, Session, SessionStore};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const OTP_SCAM: &str = "send your otp now or account will be blocked";
const BANK_OTP: &str = "your otp for login is 482931";

// ── Stubs ───────────────────────────────────────────────────────────────

/// Classifier answering a fixed confidence, or failing when `None`.
struct StubClassifier {
    confidence: Option<f64>,
    calls: AtomicU32,
}

impl StubClassifier {
    fn new(confidence: Option<f64>) -> Arc<Self> {
        Arc::new(Self {
            confidence,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClassificationOracle for StubClassifier {
    fn name(&self) -> &str {
        "stub_classifier"
    }

    async fn classify(&self, _request: &ClassifyRequest) -> Result<Classification, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.confidence {
            Some(confidence) => Ok(Classification {
                is_scam: confidence >= 0.5,
                confidence,
                scam_type: None,
                reasoning: "stub".into(),
            }),
            None => Err(OracleError::Unavailable {
                oracle: "stub_classifier".into(),
                reason: "offline".into(),
            }),
        }
    }
}

/// Engager replaying queued outputs, then a plain reply; or always failing.
struct StubEngager {
    queue: Mutex<VecDeque<EngagementOutput>>,
    fail: bool,
    calls: AtomicU32,
}

impl StubEngager {
    fn scripted(outputs: Vec<EngagementOutput>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(outputs.into()),
            fail: false,
            calls: AtomicU32::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            fail: true,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EngagementOracle for StubEngager {
    fn name(&self) -> &str {
        "stub_engager"
    }

    async fn generate(&self, _request: &EngagementRequest) -> Result<EngagementOutput, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OracleError::Malformed {
                oracle: "stub_engager".into(),
                reason: "not json".into(),
            });
        }
        let next = self.queue.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| reply("Oh no, what should I do?")))
    }
}

/// Reporter that records delivered reports and can fail the first N calls.
#[derive(Default)]
struct RecordingReporter {
    reports: Mutex<Vec<SessionReport>>,
    fail_remaining: AtomicU32,
}

impl RecordingReporter {
    fn delivered(&self) -> Vec<SessionReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl IntelligenceReporter for RecordingReporter {
    async fn report(&self, report: &SessionReport) -> Result<(), ReportError> {
        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ReportError::Rejected {
                url: "stub".into(),
                status: 502,
            });
        }
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Store wrapper that reports a conflict for the first N writes.
struct ConflictingStore {
    inner: MemorySessionStore,
    conflicts_remaining: AtomicU32,
}

#[async_trait]
impl SessionStore for ConflictingStore {
    async fn get(&self, id: &str) -> Result<Option<Session>, StoreError> {
        self.inner.get(id).await
    }

    async fn compare_and_swap(
        &self,
        id: &str,
        expected_version: u64,
        session: &Session,
    ) -> Result<CasOutcome, StoreError> {
        if self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Ok(CasOutcome::Conflict);
        }
        self.inner
            .compare_and_swap(id, expected_version, session)
            .await
    }
}

fn reply(text: &str) -> EngagementOutput {
    EngagementOutput {
        reply: Some(text.into()),
        ..Default::default()
    }
}

fn oracle_entity(entity_type: EntityType, value: &str) -> ExtractedEntity {
    ExtractedEntity::candidate(entity_type, value, EntityOrigin::Oracle)
}

fn test_config() -> EngineConfig {
    EngineConfig {
        oracle_timeout: Duration::from_secs(2),
        ..EngineConfig::default()
    }
}

struct Harness {
    processor: Arc<TurnProcessor>,
    store: Arc<MemorySessionStore>,
    classifier: Arc<StubClassifier>,
    engager: Arc<StubEngager>,
    reporter: Arc<RecordingReporter>,
}

fn harness(classifier: Arc<StubClassifier>, engager: Arc<StubEngager>) -> Harness {
    let store = Arc::new(MemorySessionStore::new());
    let reporter = Arc::new(RecordingReporter::default());
    let processor = Arc::new(TurnProcessor::new(
        test_config(),
        PatternMatcher::default_rules(),
        classifier.clone(),
        engager.clone(),
        store.clone(),
        reporter.clone(),
    ));
    Harness {
        processor,
        store,
        classifier,
        engager,
        reporter,
    }
}

/// Persist a session as if earlier turns had already run.
async fn seed(store: &MemorySessionStore, session: Session) {
    let outcome = store.compare_and_swap(&session.id.clone(), 0, &session).await.unwrap();
    assert_eq!(outcome, CasOutcome::Swapped);
}

fn engaged_session(id: &str, confidence: f64, mode: EngagementMode, turn_count: u32) -> Session {
    let mut session = Session::new(id, Utc::now());
    session.confidence = confidence;
    session.engagement_mode = mode;
    session.turn_count = turn_count;
    session
}

// ── Detection ───────────────────────────────────────────────────────────

#[tokio::test]
async fn otp_scam_takes_fast_path() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.1)), StubEngager::scripted(vec![reply("Which OTP sir?")]));

        let decision = h.processor.process_turn("s1", OTP_SCAM, &[]).await.unwrap();

        assert_eq!(h.classifier.calls(), 0);
        assert!(decision.is_scam);
        assert!(decision.confidence >= 0.95);
        assert_eq!(decision.mode, EngagementMode::Aggressive);
        assert!(decision.should_engage);
        assert_eq!(decision.reply.as_deref(), Some("Which OTP sir?"));
        assert_eq!(decision.scam_type.as_deref(), Some("credential_phishing"));
        assert_eq!(decision.turns_used, 1);
        assert!(decision.suspicious_keywords.contains(&"otp".to_string()));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn bank_otp_is_safe_and_not_engaged() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.9)), StubEngager::scripted(vec![]));

        let decision = h.processor.process_turn("s2", BANK_OTP, &[]).await.unwrap();

        assert_eq!(h.classifier.calls(), 0);
        assert_eq!(h.engager.calls(), 0);
        assert!(!decision.is_scam);
        assert!(decision.confidence <= 0.05);
        assert_eq!(decision.mode, EngagementMode::None);
        assert!(!decision.should_engage);
        assert!(decision.reply.is_none());
        assert!(decision.intelligence.is_empty());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn low_oracle_score_cannot_lower_prior() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.2)), StubEngager::scripted(vec![]));
        seed(&h.store, engaged_session("s3", 0.7, EngagementMode::Cautious, 1)).await;

        let decision = h
            .processor
            .process_turn("s3", "ok, what should I do next?", &[])
            .await
            .unwrap();

        assert_eq!(h.classifier.calls(), 1);
        assert!((decision.confidence - 0.7).abs() < 1e-9);
        assert_eq!(decision.mode, EngagementMode::Cautious);
        assert!(decision.is_scam);
        assert!(decision.should_engage);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn safe_message_does_not_downgrade_engaged_session() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.1)), StubEngager::scripted(vec![]));
        seed(&h.store, engaged_session("s4", 0.9, EngagementMode::Aggressive, 2)).await;

        let decision = h.processor.process_turn("s4", BANK_OTP, &[]).await.unwrap();

        assert!((decision.confidence - 0.9).abs() < 1e-9);
        assert_eq!(decision.mode, EngagementMode::Aggressive);
        assert!(decision.should_engage);
    })
    .await
    .expect("test timed out");
}

// ── Termination ─────────────────────────────────────────────────────────

#[tokio::test]
async fn max_turns_terminates_and_freezes_session() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.2)), StubEngager::scripted(vec![]));
        seed(&h.store, engaged_session("s5", 0.7, EngagementMode::Cautious, 10)).await;

        let decision = h.processor.process_turn("s5", "hello?", &[]).await.unwrap();
        assert!(decision.terminated);
        assert_eq!(decision.termination_reason, Some(TerminationReason::MaxTurns));
        assert!(!decision.should_engage);
        assert!(decision.reply.is_none());
        assert_eq!(h.engager.calls(), 0);

        let frozen = h.store.get("s5").await.unwrap().unwrap();
        let classifier_calls = h.classifier.calls();

        let again = h.processor.process_turn("s5", "are you there??", &[]).await.unwrap();
        assert_eq!(again, decision);
        assert_eq!(h.classifier.calls(), classifier_calls);
        assert_eq!(h.store.get("s5").await.unwrap().unwrap(), frozen);
        assert_eq!(h.reporter.delivered().len(), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn complete_intelligence_terminates_next_turn() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(
            StubClassifier::new(Some(0.8)),
            StubEngager::scripted(vec![EngagementOutput {
                reply: Some("Which number do I call?".into()),
                entities: vec![
                    oracle_entity(EntityType::PaymentHandle, "refund.desk@ybl"),
                    oracle_entity(EntityType::Phone, "+91 98765 43210"),
                ],
                notes: Some("Claims to be from the bank".into()),
                sender_suspicious: false,
            }]),
        );

        let first = h.processor.process_turn("s6", OTP_SCAM, &[]).await.unwrap();
        assert!(first.should_engage);
        assert!(!first.terminated);
        assert_eq!(first.intelligence[&EntityType::PaymentHandle], vec!["refund.desk@ybl"]);
        assert_eq!(first.intelligence[&EntityType::Phone], vec!["9876543210"]);

        let second = h.processor.process_turn("s6", "ok do it fast", &[]).await.unwrap();
        assert!(second.terminated);
        assert_eq!(second.termination_reason, Some(TerminationReason::IntelComplete));
        assert!(!second.should_engage);
        assert_eq!(second.intelligence, first.intelligence);

        h.processor.process_turn("s6", "hello??", &[]).await.unwrap();
        let reports = h.reporter.delivered();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].session_id, "s6");
        assert_eq!(reports[0].total_turns, 2);
        assert_eq!(reports[0].agent_notes, "Claims to be from the bank");
        assert!(h.store.get("s6").await.unwrap().unwrap().report_sent);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn no_new_intelligence_goes_stale() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.9)), StubEngager::scripted(vec![]));
        let stale_after = test_config().stale_threshold;

        for _ in 0..stale_after {
            let decision = h.processor.process_turn("s7", OTP_SCAM, &[]).await.unwrap();
            assert!(decision.should_engage);
        }
        let decision = h.processor.process_turn("s7", OTP_SCAM, &[]).await.unwrap();
        assert_eq!(decision.termination_reason, Some(TerminationReason::Stale));
        assert_eq!(h.engager.calls(), stale_after);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn disengaging_scammer_terminates_as_suspicious() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.9)), StubEngager::scripted(vec![]));

        h.processor.process_turn("s8", OTP_SCAM, &[]).await.unwrap();
        let decision = h
            .processor
            .process_turn("s8", "are you a bot? stop wasting my time", &[])
            .await
            .unwrap();

        assert_eq!(decision.termination_reason, Some(TerminationReason::Suspicious));
        assert!(!decision.should_engage);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn oracle_suspicion_flag_terminates_next_turn() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(
            StubClassifier::new(Some(0.9)),
            StubEngager::scripted(vec![EngagementOutput {
                reply: Some("Sorry, who is this?".into()),
                sender_suspicious: true,
                ..Default::default()
            }]),
        );

        let first = h.processor.process_turn("s9", OTP_SCAM, &[]).await.unwrap();
        assert!(first.should_engage);

        let second = h.processor.process_turn("s9", "just send it", &[]).await.unwrap();
        assert_eq!(second.termination_reason, Some(TerminationReason::Suspicious));
    })
    .await
    .expect("test timed out");
}

// ── Oracle failure ──────────────────────────────────────────────────────

#[tokio::test]
async fn engager_failure_uses_fallback_reply() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(None), StubEngager::failing());

        let decision = h.processor.process_turn("s10", OTP_SCAM, &[]).await.unwrap();

        assert!(decision.should_engage);
        assert_eq!(
            decision.reply.as_deref(),
            Some(fallback_reply(EngagementMode::Aggressive, 0))
        );
        assert_eq!(h.engager.calls(), test_config().oracle_max_attempts);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn classifier_failure_falls_back_to_indicators() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(None), StubEngager::scripted(vec![]));

        let decision = h
            .processor
            .process_turn(
                "s11",
                "Dear customer, complete KYC urgently via www.sbi-update.top",
                &[],
            )
            .await
            .unwrap();

        assert!((decision.confidence - 0.15).abs() < 1e-9);
        assert!(!decision.is_scam);
        assert_eq!(decision.mode, EngagementMode::None);
        assert!(!decision.should_engage);
        // observe-only turns accumulate nothing
        assert!(decision.intelligence.is_empty());
    })
    .await
    .expect("test timed out");
}

// ── Intelligence ────────────────────────────────────────────────────────

#[tokio::test]
async fn first_turn_harvests_scammer_history() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.9)), StubEngager::scripted(vec![]));
        let history = vec![
            HistoryMessage::scammer("pay the processing fee to claims.desk@paytm"),
            HistoryMessage::user("my own number is 9123456780, why?"),
        ];

        let decision = h.processor.process_turn("s12", OTP_SCAM, &history).await.unwrap();

        assert_eq!(
            decision.intelligence[&EntityType::PaymentHandle],
            vec!["claims.desk@paytm"]
        );
        assert!(!decision.intelligence.contains_key(&EntityType::Phone));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn history_harvested_once_engagement_starts() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.1)), StubEngager::scripted(vec![]));
        let history = vec![HistoryMessage::scammer("pay the processing fee to claims.desk@paytm")];

        let observed = h.processor.process_turn("s16", "hello there", &history).await.unwrap();
        assert_eq!(observed.mode, EngagementMode::None);
        assert!(observed.intelligence.is_empty());
        assert!(!h.store.get("s16").await.unwrap().unwrap().history_scanned);

        let engaged = h.processor.process_turn("s16", OTP_SCAM, &history).await.unwrap();
        assert!(engaged.should_engage);
        assert_eq!(
            engaged.intelligence[&EntityType::PaymentHandle],
            vec!["claims.desk@paytm"]
        );
        assert!(h.store.get("s16").await.unwrap().unwrap().history_scanned);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn report_failure_is_retried_on_next_turn() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.2)), StubEngager::scripted(vec![]));
        h.reporter.fail_remaining.store(1, Ordering::SeqCst);
        seed(&h.store, engaged_session("s13", 0.7, EngagementMode::Cautious, 10)).await;

        h.processor.process_turn("s13", "hello?", &[]).await.unwrap();
        assert!(h.reporter.delivered().is_empty());
        assert!(!h.store.get("s13").await.unwrap().unwrap().report_sent);

        h.processor.process_turn("s13", "hello??", &[]).await.unwrap();
        assert_eq!(h.reporter.delivered().len(), 1);
        assert!(h.store.get("s13").await.unwrap().unwrap().report_sent);
    })
    .await
    .expect("test timed out");
}

// ── Concurrency ─────────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_turns_on_one_session_are_serialized() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let h = harness(StubClassifier::new(Some(0.1)), StubEngager::scripted(vec![]));

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let processor = Arc::clone(&h.processor);
                tokio::spawn(async move {
                    processor
                        .process_turn("shared", &format!("hello there {i}"), &[])
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let session = h.store.get("shared").await.unwrap().unwrap();
        assert_eq!(session.turn_count, 10);
        assert_eq!(session.version, 10);
        assert_eq!(h.classifier.calls(), 10);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn write_conflict_is_recomputed() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let store = Arc::new(ConflictingStore {
            inner: MemorySessionStore::new(),
            conflicts_remaining: AtomicU32::new(1),
        });
        let engager = StubEngager::scripted(vec![]);
        let processor = TurnProcessor::new(
            test_config(),
            PatternMatcher::default_rules(),
            StubClassifier::new(Some(0.1)),
            engager.clone(),
            store.clone(),
            Arc::new(RecordingReporter::default()),
        );

        let decision = processor.process_turn("s14", OTP_SCAM, &[]).await.unwrap();

        assert_eq!(decision.turns_used, 1);
        assert_eq!(engager.calls(), 2);
        assert_eq!(store.get("s14").await.unwrap().unwrap().version, 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn persistent_conflict_surfaces_transient_error() {
    tokio::time::timeout(TEST_TIMEOUT, async {
        let store = Arc::new(ConflictingStore {
            inner: MemorySessionStore::new(),
            conflicts_remaining: AtomicU32::new(u32::MAX),
        });
        let processor = TurnProcessor::new(
            test_config(),
            PatternMatcher::default_rules(),
            StubClassifier::new(Some(0.1)),
            StubEngager::scripted(vec![]),
            store.clone(),
            Arc::new(RecordingReporter::default()),
        );

        let err = processor.process_turn("s15", OTP_SCAM, &[]).await.unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(err, EngineError::StoreConflict { attempts: 3, .. }));
        assert!(store.get("s15").await.unwrap().is_none());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn blank_session_id_is_rejected() {
    let h = harness(StubClassifier::new(Some(0.1)), StubEngager::scripted(vec![]));
    let err = h.processor.process_turn("  ", "hi", &[]).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidRequest(_)));
    assert!(h.store.is_empty().await);
}
