//! Anthropic Messages API client.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, LlmProvider, Role,
};
use crate::error::LlmError;

const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: SecretString, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point at a different host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct MessagesBody<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesReply {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

/// Split system prompts out of the turn list; Anthropic takes them separately.
fn build_body<'a>(model: &'a str, request: &'a CompletionRequest) -> MessagesBody<'a> {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();

    let messages = request
        .messages
        .iter()
        .filter_map(|m: &ChatMessage| {
            let role = match m.role {
                Role::System => return None,
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            Some(WireMessage {
                role,
                content: &m.content,
            })
        })
        .collect();

    MessagesBody {
        model,
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: (!system.is_empty()).then(|| system.join("\n\n")),
        messages,
        temperature: request.temperature,
    }
}

fn finish_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        _ => FinishReason::Other,
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = build_body(&self.model, &request);
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::AuthFailed {
                provider: PROVIDER.to_string(),
            });
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("HTTP {status}: {}", text.chars().take(300).collect::<String>()),
            });
        }

        let reply: MessagesReply = response.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        let content = reply
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        debug!(
            model = %self.model,
            input_tokens = reply.usage.input_tokens,
            output_tokens = reply.usage.output_tokens,
            "Completion received"
        );

        Ok(CompletionResponse {
            content,
            input_tokens: reply.usage.input_tokens,
            output_tokens: reply.usage.output_tokens,
            finish_reason: finish_reason(reply.stop_reason.as_deref()),
            response_id: reply.id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    /// Serve a canned `/v1/messages` reply on a random port, return its base URL.
    async fn stub_server(status: StatusCode, headers: Vec<(&'static str, &'static str)>, body: &'static str) -> String {
        let app = Router::new().route(
            "/v1/messages",
            post(move |request_headers: HeaderMap| {
                let headers = headers.clone();
                async move {
                    let authed = request_headers.get("x-api-key").and_then(|v| v.to_str().ok())
                        == Some("test-key")
                        && request_headers.get("anthropic-version").and_then(|v| v.to_str().ok())
                            == Some(API_VERSION);
                    if !authed {
                        return (StatusCode::BAD_REQUEST, HeaderMap::new(), "missing headers".to_string());
                    }
                    let mut map = HeaderMap::new();
                    for (name, value) in headers {
                        map.insert(name, value.parse().unwrap());
                    }
                    (status, map, body.to_string())
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{port}/")
    }

    fn provider(base_url: String) -> AnthropicProvider {
        AnthropicProvider::new(SecretString::from("test-key"), "claude-test")
            .unwrap()
            .with_base_url(base_url)
    }

    fn request() -> CompletionRequest {
        CompletionRequest::new(vec![ChatMessage::user("hello")])
    }

    #[tokio::test]
    async fn text_blocks_are_joined() {
        let base = stub_server(
            StatusCode::OK,
            vec![("content-type", "application/json")],
            r#"{"id":"msg_9","content":[{"type":"text","text":"{\"is_scam\":"},{"type":"tool_use","id":"t"},{"type":"text","text":"true}"}],"stop_reason":"max_tokens","usage":{"input_tokens":12,"output_tokens":3}}"#,
        )
        .await;

        let response = provider(base).complete(request()).await.unwrap();
        assert_eq!(response.content, r#"{"is_scam":true}"#);
        assert_eq!(response.finish_reason, FinishReason::Length);
        assert_eq!(response.input_tokens, 12);
        assert_eq!(response.response_id.as_deref(), Some("msg_9"));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let base = stub_server(StatusCode::TOO_MANY_REQUESTS, vec![("retry-after", "7")], "slow down").await;

        let err = provider(base).complete(request()).await.unwrap_err();
        match err {
            LlmError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_statuses_map_to_auth_failed() {
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            let base = stub_server(status, vec![], "denied").await;
            let err = provider(base).complete(request()).await.unwrap_err();
            assert!(matches!(err, LlmError::AuthFailed { .. }), "{status}: {err:?}");
        }
    }

    #[tokio::test]
    async fn server_error_is_request_failed() {
        let base = stub_server(StatusCode::INTERNAL_SERVER_ERROR, vec![], "overloaded").await;

        let err = provider(base).complete(request()).await.unwrap_err();
        match err {
            LlmError::RequestFailed { reason, .. } => {
                assert!(reason.contains("500"));
                assert!(reason.contains("overloaded"));
            }
            other => panic!("expected RequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_body_is_invalid_response() {
        let base = stub_server(StatusCode::OK, vec![("content-type", "application/json")], "not json").await;

        let err = provider(base).complete(request()).await.unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn system_prompts_are_hoisted() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("be brief"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
        ])
        .with_max_tokens(64);
        let body = build_body("claude-test", &request);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["system"], "be brief");
        assert_eq!(json["max_tokens"], 64);
        assert_eq!(json["messages"].as_array().unwrap().len(), 2);
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn stop_reasons_map() {
        assert_eq!(finish_reason(Some("end_turn")), FinishReason::Stop);
        assert_eq!(finish_reason(Some("max_tokens")), FinishReason::Length);
        assert_eq!(finish_reason(None), FinishReason::Other);
    }

    #[test]
    fn reply_text_blocks_parse() {
        let raw = r#"{"id":"msg_1","content":[{"type":"text","text":"{\"a\":1}"}],"stop_reason":"end_turn","usage":{"input_tokens":10,"output_tokens":4}}"#;
        let reply: MessagesReply = serde_json::from_str(raw).unwrap();
        assert_eq!(reply.content[0].text, r#"{"a":1}"#);
        assert_eq!(reply.usage.output_tokens, 4);
    }
}
