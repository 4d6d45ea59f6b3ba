//! LLM-backed engagement oracle: persona replies plus entity extraction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::json::extract_json_object;
use super::{EngagementOracle, EngagementOutput, EngagementRequest};
use crate::error::OracleError;
use crate::intel::{EntityOrigin, EntityType, ExtractedEntity};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::pipeline::types::Speaker;

const ORACLE_NAME: &str = "llm_engager";

const ENGAGE_MAX_TOKENS: u32 = 600;
const ENGAGE_TEMPERATURE: f32 = 0.7;

const MESSAGE_PREVIEW_CHARS: usize = 1500;
const HISTORY_PREVIEW_CHARS: usize = 300;
/// Entities beyond this are ignored.
const MAX_ENTITIES: usize = 20;

pub struct LlmEngager {
    llm: Arc<dyn LlmProvider>,
}

impl LlmEngager {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl EngagementOracle for LlmEngager {
    fn name(&self) -> &str {
        ORACLE_NAME
    }

    async fn generate(&self, request: &EngagementRequest) -> Result<EngagementOutput, OracleError> {
        let completion = CompletionRequest::new(vec![
            ChatMessage::system(build_system_prompt()),
            ChatMessage::user(build_user_prompt(request)),
        ])
        .with_temperature(ENGAGE_TEMPERATURE)
        .with_max_tokens(ENGAGE_MAX_TOKENS);

        let response = self
            .llm
            .complete(completion)
            .await
            .map_err(|e| OracleError::Unavailable {
                oracle: ORACLE_NAME.to_string(),
                reason: e.to_string(),
            })?;

        let output = parse_engagement(&response.content).map_err(|reason| OracleError::Malformed {
            oracle: ORACLE_NAME.to_string(),
            reason,
        })?;

        debug!(
            session_id = %request.context.session_id,
            has_reply = output.reply.is_some(),
            entities = output.entities.len(),
            "Engagement response received"
        );
        Ok(output)
    }
}

fn build_system_prompt() -> String {
    "You play an ordinary, slightly naive person chatting with a suspected scammer. \
     Your goal is to keep them talking and get them to reveal payment details, \
     phone numbers, bank accounts, links, and names.\n\n\
     Never reveal that you suspect a scam. Never share real credentials, OTPs \
     or card numbers; stall or give excuses instead. Keep replies short (1-3 \
     sentences) and natural.\n\n\
     Respond with ONLY a JSON object:\n\
     {\"reply\": \"...\", \"entities\": [{\"type\": \"phone|bank_account|payment_handle|url|email|other_labeled\", \"value\": \"...\", \"label\": \"...\"}], \"notes\": \"...\", \"sender_suspicious\": false}\n\n\
     Rules:\n\
     - entities lists only details the sender actually revealed\n\
     - label is required for other_labeled entries (e.g. \"claimed employee id\")\n\
     - notes is one sentence about the scammer's tactics\n\
     - sender_suspicious is true if the sender seems to realise they are being played"
        .to_string()
}

fn build_user_prompt(request: &EngagementRequest) -> String {
    let ctx = &request.context;
    let mut prompt = String::with_capacity(1024);

    prompt.push_str(&format!("Stance: {}\n", request.emotional_state));
    prompt.push_str(&format!("Engagement mode: {}\n", ctx.mode));
    prompt.push_str(&format!("Turn: {}\n", ctx.turn_count + 1));
    if let Some(ref scam_type) = ctx.scam_type {
        prompt.push_str(&format!("Suspected scam: {scam_type}\n"));
    }
    if !ctx.known_types.is_empty() {
        let known: Vec<&str> = ctx.known_types.iter().map(|t| t.as_str()).collect();
        prompt.push_str(&format!("Already collected: {}\n", known.join(", ")));
    }
    if !ctx.missing_types.is_empty() {
        let missing: Vec<&str> = ctx.missing_types.iter().map(|t| t.as_str()).collect();
        prompt.push_str(&format!("Try to obtain: {}\n", missing.join(", ")));
    }

    if !request.history.is_empty() {
        prompt.push_str("\nRecent conversation:\n");
        for msg in &request.history {
            let who = match msg.sender {
                Speaker::Scammer => "them",
                Speaker::User => "you",
            };
            let preview: String = msg.text.chars().take(HISTORY_PREVIEW_CHARS).collect();
            prompt.push_str(&format!("  {who}: {preview}\n"));
        }
    }

    let preview: String = request.message.chars().take(MESSAGE_PREVIEW_CHARS).collect();
    prompt.push_str(&format!("\nTheir new message:\n{preview}"));
    prompt
}

/// Parse the model output field by field.
///
/// A missing or empty reply is tolerated when the rest of the object is
/// usable; an unparseable object, or one with nothing usable, is malformed.
fn parse_engagement(raw: &str) -> Result<EngagementOutput, String> {
    let value: Value = serde_json::from_str(extract_json_object(raw))
        .map_err(|e| format!("JSON parse error: {e}"))?;
    let Value::Object(obj) = value else {
        return Err("response is not a JSON object".into());
    };

    let reply = obj
        .get("reply")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let entities: Vec<ExtractedEntity> = obj
        .get("entities")
        .and_then(Value::as_array)
        .map(|items| items.iter().take(MAX_ENTITIES).filter_map(parse_entity).collect())
        .unwrap_or_default();

    let notes = obj
        .get("notes")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    let sender_suspicious = obj
        .get("sender_suspicious")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if reply.is_none() && entities.is_empty() {
        return Err("response has neither a reply nor entities".into());
    }

    Ok(EngagementOutput {
        reply,
        entities,
        notes,
        sender_suspicious,
    })
}

/// One entity item; unknown types become labeled entries named after the type.
fn parse_entity(item: &Value) -> Option<ExtractedEntity> {
    let kind = item.get("type").and_then(Value::as_str)?;
    let value = item.get("value").and_then(Value::as_str)?.trim();
    if value.is_empty() {
        return None;
    }
    let label = item
        .get("label")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match kind.parse::<EntityType>() {
        Ok(EntityType::OtherLabeled) => {
            label.map(|l| ExtractedEntity::labeled(l, value, EntityOrigin::Oracle))
        }
        Ok(entity_type) => Some(ExtractedEntity::candidate(entity_type, value, EntityOrigin::Oracle)),
        Err(_) => Some(ExtractedEntity::labeled(
            label.unwrap_or(kind),
            value,
            EntityOrigin::Oracle,
        )),
    }
}
