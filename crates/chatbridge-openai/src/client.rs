// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Chat Completions endpoint.
//!
//! Each request is sent exactly once. Failures are returned to the caller,
//! which treats them as a failed generation.

use std::time::Duration;

use chatbridge_core::BridgeError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::debug;

use crate::types::{ApiErrorResponse, ChatCompletionRequest, ChatCompletionResponse};

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
}

impl OpenAiClient {
    /// Builds a client authenticating with `api_key` against `base_url`.
    pub fn new(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| BridgeError::Config(format!("invalid API key header value: {e}")))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Sends one completion request.
    pub async fn create_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, BridgeError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| BridgeError::Provider {
                message: format!("HTTP request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        debug!(status = %status, model = %request.model, "completion response received");

        let body = response.text().await.map_err(|e| BridgeError::Provider {
            message: format!("failed to read response body: {e}"),
            source: Some(Box::new(e)),
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ApiErrorResponse>(&body) {
                Ok(api_err) => format!(
                    "completion API error ({}): {}",
                    api_err.error.type_.as_deref().unwrap_or("unknown"),
                    api_err.error.message
                ),
                Err(_) => format!("API returned {status}: {body}"),
            };
            return Err(BridgeError::Provider {
                message,
                source: None,
            });
        }

        serde_json::from_str(&body).map_err(|e| BridgeError::Provider {
            message: format!("failed to parse API response: {e}"),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChatMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: "gpt-4".into(),
            messages: vec![ChatMessage {
                role: "system".into(),
                name: None,
                content: "Summarize.".into(),
            }],
            max_tokens: 2000,
        }
    }

    #[tokio::test]
    async fn sends_bearer_auth_and_parses_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "gpt-4", "max_tokens": 2000})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [{"message": {"role": "assistant", "content": "Article"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new(
            "sk-test",
            &format!("{}/v1/", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();
        let response = client.create_completion(&request()).await.unwrap();
        assert_eq!(response.choices[0].message.content.as_deref(), Some("Article"));
        assert_eq!(response.usage.unwrap().completion_tokens, 3);
    }

    #[tokio::test]
    async fn api_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Rate limit reached", "type": "requests"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk", &server.uri(), Duration::from_secs(5)).unwrap();
        let err = client.create_completion(&request()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Rate limit reached"), "got: {msg}");
    }

    #[tokio::test]
    async fn malformed_body_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new("sk", &server.uri(), Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.create_completion(&request()).await,
            Err(BridgeError::Provider { .. })
        ));
    }
}
