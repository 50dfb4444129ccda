// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Minimal Slack Web API client.
//!
//! Slack reports most failures as HTTP 200 with `"ok": false`; both layers
//! are folded into [`SlackError`].

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("HTTP request to {method} failed: {source}")]
    Http {
        method: String,
        source: reqwest::Error,
    },

    #[error("{method} returned HTTP {status}")]
    Status { method: String, status: u16 },

    #[error("{method} failed: {error}")]
    Api { method: String, error: String },

    #[error("unexpected {method} response: {detail}")]
    Decode { method: String, detail: String },

    #[error("invalid Slack configuration: {0}")]
    Config(String),
}

/// Slack Web API client authenticated with a bot token.
#[derive(Debug, Clone)]
pub struct SlackClient {
    http: reqwest::Client,
    base_url: String,
}

impl SlackClient {
    pub fn new(bot_token: &str, base_url: &str) -> Result<Self, SlackError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {bot_token}"))
                .map_err(|e| SlackError::Config(format!("invalid bot token header value: {e}")))?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SlackError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Calls a write method with a JSON body.
    pub async fn post<B, T>(&self, method: &str, body: &B) -> Result<T, SlackError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|source| SlackError::Http {
                method: method.to_string(),
                source,
            })?;
        Self::decode(method, response).await
    }

    /// Calls a read method with query parameters.
    pub async fn get<T>(&self, method: &str, params: &[(&str, &str)]) -> Result<T, SlackError>
    where
        T: DeserializeOwned,
    {
        let url = url::Url::parse_with_params(&format!("{}/{method}", self.base_url), params)
            .map_err(|e| SlackError::Config(format!("invalid API URL: {e}")))?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| SlackError::Http {
                method: method.to_string(),
                source,
            })?;
        Self::decode(method, response).await
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, SlackError> {
        let status = response.status();
        debug!(method, status = %status, "Slack API response");
        if !status.is_success() {
            return Err(SlackError::Status {
                method: method.to_string(),
                status: status.as_u16(),
            });
        }

        let value: Value = response.json().await.map_err(|e| SlackError::Decode {
            method: method.to_string(),
            detail: e.to_string(),
        })?;
        if value.get("ok").and_then(Value::as_bool) != Some(true) {
            let error = value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            return Err(SlackError::Api {
                method: method.to_string(),
                error,
            });
        }
        serde_json::from_value(value).map_err(|e| SlackError::Decode {
            method: method.to_string(),
            detail: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, serde::Deserialize)]
    struct Ts {
        ts: String,
    }

    #[tokio::test]
    async fn ok_false_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let client = SlackClient::new("xoxb-1", &server.uri()).unwrap();
        let err = client
            .post::<_, Ts>("chat.postMessage", &serde_json::json!({"channel": "C1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::Api { ref error, .. } if error == "channel_not_found"));
    }

    #[tokio::test]
    async fn get_sends_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users.info"))
            .and(query_param("user", "U1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true, "ts": "1.2"})),
            )
            .mount(&server)
            .await;

        let client = SlackClient::new("xoxb-1", &server.uri()).unwrap();
        let out: Ts = client.get("users.info", &[("user", "U1")]).await.unwrap();
        assert_eq!(out.ts, "1.2");
    }

    #[tokio::test]
    async fn http_failure_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = SlackClient::new("xoxb-1", &server.uri()).unwrap();
        let err = client
            .post::<_, Ts>("chat.update", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackError::Status { status: 503, .. }));
    }
}
