//! LLM-backed classification oracle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::json::extract_json_object;
use super::{Classification, ClassificationOracle, ClassifyRequest};
use crate::error::OracleError;
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::Speaker;

const ORACLE_NAME: &str = "llm_classifier";

/// Kept tight; runs on every uncertain message.
const CLASSIFY_MAX_TOKENS: u32 = 300;
const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// Message/history characters included in the prompt.
const MESSAGE_PREVIEW_CHARS: usize = 1500;
const HISTORY_PREVIEW_CHARS: usize = 300;

pub struct LlmClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl ClassificationOracle for LlmClassifier {
    fn name(&self) -> &str {
        ORACLE_NAME
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<Classification, OracleError> {
        let completion = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(request)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self
            .llm
            .complete(completion)
            .await
            .map_err(|e| OracleError::Unavailable {
                oracle: ORACLE_NAME.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            model = %self.llm.model_name(),
            output_tokens = response.output_tokens,
            "Classification response received"
        );

        parse_classification(&response.content).map_err(|reason| OracleError::Malformed {
            oracle: ORACLE_NAME.to_string(),
            reason,
        })
    }
}

fn build_system_prompt() -> String {
    "You are a fraud analyst screening chat and SMS messages for scams \
     (bank/KYC impersonation, OTP theft, fake prizes, fake arrests, job and \
     investment fraud, remote-access tricks).\n\n\
     Respond with ONLY a JSON object:\n\
     {\"is_scam\": true, \"confidence\": 0.0, \"scam_type\": \"...\", \"reasoning\": \"...\"}\n\n\
     Rules:\n\
     - confidence is the probability (0.0-1.0) that the message is a scam\n\
     - scam_type is a short snake_case label, or null when not a scam\n\
     - reasoning is one sentence\n\
     - Genuine bank alerts and OTP deliveries that do not ask for anything are not scams"
        .to_string()
}

fn build_user_prompt(request: &ClassifyRequest) -> String {
    let mut prompt = String::with_capacity(1024);
    prompt.push_str(&format!("Prior assessment: {}\n", request.prior_verdict));

    if !request.history.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        for msg in &request.history {
            let who = match msg.sender {
                Speaker::Scammer => "sender",
                Speaker::User => "recipient",
            };
            let preview: String = msg.text.chars().take(HISTORY_PREVIEW_CHARS).collect();
            prompt.push_str(&format!("  {who}: {preview}\n"));
        }
    }

    let preview: String = request.message.chars().take(MESSAGE_PREVIEW_CHARS).collect();
    prompt.push_str(&format!("\nNew message:\n{preview}"));
    prompt
}

#[derive(Debug, serde::Deserialize)]
struct ClassifierResponse {
    #[serde(default)]
    is_scam: Option<bool>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    scam_type: Option<String>,
    #[serde(default)]
    reasoning: String,
}

/// Parse the model output.
///
/// Either of `is_scam` / `confidence` may be missing; the other one fills
/// the gap. Both missing is malformed.
fn parse_classification(raw: &str) -> Result<Classification, String> {
    let response: ClassifierResponse = serde_json::from_str(extract_json_object(raw))
        .map_err(|e| format!("JSON parse error: {e}"))?;

    let (is_scam, confidence) = match (response.is_scam, response.confidence) {
        (None, None) => return Err("response has neither is_scam nor confidence".into()),
        (Some(is_scam), None) => (is_scam, if is_scam { 0.9 } else { 0.1 }),
        (None, Some(c)) => (c >= 0.5, c),
        (Some(is_scam), Some(c)) => (is_scam, c),
    };
    if !confidence.is_finite() {
        return Err(format!("confidence is not a number: {confidence}"));
    }

    let scam_type = response
        .scam_type
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty() && s != "none" && s != "null");

    Ok(Classification {
        is_scam,
        confidence: confidence.clamp(0.0, 1.0),
        scam_type,
        reasoning: response.reasoning,
    })
}
