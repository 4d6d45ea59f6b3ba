//! Final intelligence report for a terminated session.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engagement::{EngagementMode, TerminationReason};
use crate::error::ReportError;
use crate::intel::EntityType;
use crate::session::Session;

const REPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// What gets delivered once per terminated session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: String,
    pub scam_detected: bool,
    pub scam_type: Option<String>,
    pub confidence: f64,
    pub total_turns: u32,
    pub engagement_mode: EngagementMode,
    pub termination_reason: Option<TerminationReason>,
    pub intelligence: BTreeMap<EntityType, Vec<String>>,
    pub suspicious_keywords: Vec<String>,
    pub agent_notes: String,
}

impl SessionReport {
    pub fn from_session(session: &Session, scam_threshold: f64) -> Self {
        Self {
            session_id: session.id.clone(),
            scam_detected: session.is_scam(scam_threshold),
            scam_type: session.scam_type.clone(),
            confidence: session.confidence,
            total_turns: session.turn_count,
            engagement_mode: session.engagement_mode,
            termination_reason: session.termination_reason,
            intelligence: session.intelligence.to_map(),
            suspicious_keywords: session.keywords.iter().cloned().collect(),
            agent_notes: session.notes.join(" "),
        }
    }
}

#[async_trait]
pub trait IntelligenceReporter: Send + Sync {
    async fn report(&self, report: &SessionReport) -> Result<(), ReportError>;
}

/// Drops reports; used when no callback is configured.
pub struct NoopReporter;

#[async_trait]
impl IntelligenceReporter for NoopReporter {
    async fn report(&self, _report: &SessionReport) -> Result<(), ReportError> {
        Ok(())
    }
}

/// POSTs each report as JSON to a fixed URL.
pub struct HttpReporter {
    client: reqwest::Client,
    url: String,
}

impl HttpReporter {
    pub fn new(url: impl Into<String>) -> Result<Self, ReportError> {
        let url = url.into();
        let client = reqwest::Client::builder()
            .timeout(REPORT_TIMEOUT)
            .build()
            .map_err(|e| ReportError::RequestFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl IntelligenceReporter for HttpReporter {
    async fn report(&self, report: &SessionReport) -> Result<(), ReportError> {
        let response = self
            .client
            .post(&self.url)
            .json(report)
            .send()
            .await
            .map_err(|e| ReportError::RequestFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReportError::Rejected {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        info!(
            session_id = %report.session_id,
            url = %self.url,
            "Intelligence report delivered"
        );
        Ok(())
    }
}
