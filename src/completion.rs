//! Chat-completion client abstraction.
//!
//! Defines the [`CompletionClient`] trait and [`OpenAiChatClient`], which
//! talks to any OpenAI-compatible `POST {base_url}/chat/completions`
//! endpoint (OpenAI, Ollama, vLLM, llama.cpp server).
//!
//! The client makes exactly one request per call. It never retries: a failed
//! run is picked up again by the next scheduled trigger.
//!
//! | Outcome | Error |
//! |---------|-------|
//! | network failure, HTTP non-2xx | `UpstreamUnavailable` |
//! | no response within the timeout | `UpstreamTimeout` |
//! | 2xx without `choices[0].message.content` | `UpstreamMalformed` |

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::error::{excerpt, PipelineError, Result, Upstream};

/// One message of a chat prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `"system"`, `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Anything that can complete a chat prompt into raw text.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the content of the first choice.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// [`CompletionClient`] for OpenAI-compatible HTTP endpoints.
pub struct OpenAiChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiChatClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build completion HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        debug!(endpoint = %self.endpoint, model = %request.model, "sending completion request");
        let started = std::time::Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PipelineError::from_transport(Upstream::Completion, self.timeout, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::from_transport(Upstream::Completion, self.timeout, e))?;

        if !status.is_success() {
            return Err(PipelineError::UpstreamUnavailable {
                upstream: Upstream::Completion,
                message: format!("HTTP {}: {}", status, excerpt(&body)),
            });
        }

        info!(
            "completion received in {:.1}s ({} bytes)",
            started.elapsed().as_secs_f64(),
            body.len()
        );
        parse_completion_response(&body)
    }
}

/// Extract `choices[0].message.content` from a completion response body.
pub fn parse_completion_response(body: &str) -> Result<String> {
    let malformed = |message: &str| PipelineError::UpstreamMalformed {
        upstream: Upstream::Completion,
        message: message.to_string(),
        payload: body.to_string(),
    };

    let json: serde_json::Value =
        serde_json::from_str(body).map_err(|_| malformed("response is not JSON"))?;

    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| malformed("missing choices[0].message.content"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_choice_content_is_returned() {
        let body = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "first"}, "finish_reason": "stop"},
                {"index": 1, "message": {"role": "assistant", "content": "second"}, "finish_reason": "stop"}
            ]
        }"#;
        assert_eq!(parse_completion_response(body).unwrap(), "first");
    }

    #[test]
    fn test_missing_content_is_malformed() {
        for body in [r#"{"choices": []}"#, r#"{"error": "x"}"#, "not json"] {
            let err = parse_completion_response(body).unwrap_err();
            assert!(
                matches!(err, PipelineError::UpstreamMalformed { upstream: Upstream::Completion, .. }),
                "unexpected error for {}: {:?}",
                body,
                err
            );
        }
    }

    #[test]
    fn test_request_wire_shape() {
        let request = CompletionRequest {
            model: "llama3".into(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
            temperature: 0.3,
            max_tokens: 2000,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 2000);
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/v1/".into(),
            ..LlmConfig::default()
        };
        let client = OpenAiChatClient::new(&config).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/v1/chat/completions");
    }
}
