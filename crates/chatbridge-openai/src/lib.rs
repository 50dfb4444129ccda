// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible completion provider.
//!
//! Implements [`CompletionProvider`] over the Chat Completions API. The
//! provider is constructed explicitly and injected into the summarizer, so
//! tests substitute their own provider without touching globals.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use chatbridge_config::model::OpenAiConfig;
use chatbridge_core::{
    AdapterType, BridgeError, CompletionProvider, CompletionRequest, HealthStatus, PluginAdapter,
};
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatCompletionRequest, ChatMessage};

/// Completion provider backed by [`OpenAiClient`].
///
/// API key resolution order: config, then `OPENAI_API_KEY`, then error.
pub struct OpenAiProvider {
    client: OpenAiClient,
    model: String,
}

impl OpenAiProvider {
    pub fn new(config: &OpenAiConfig) -> Result<Self, BridgeError> {
        let api_key = resolve_api_key(&config.api_key)?;
        let client = OpenAiClient::new(
            &api_key,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;
        info!(model = %config.model, "completion provider initialized");
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }

    fn to_api_request(&self, request: CompletionRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: request
                .entries
                .into_iter()
                .map(|entry| ChatMessage {
                    role: entry.role.to_string(),
                    name: entry.name.as_deref().and_then(participant_name),
                    content: entry.content,
                })
                .collect(),
            max_tokens: request.max_output_tokens,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        // No request is sent; a probe would spend tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        debug!("completion provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, BridgeError> {
        let api_request = self.to_api_request(request);
        let response = self.client.create_completion(&api_request).await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::GenerationFailed("response contained no choices".into()))?;
        if choice.finish_reason.as_deref() == Some("length") {
            debug!(
                max_tokens = api_request.max_tokens,
                "completion truncated at output budget"
            );
        }

        match choice.message.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(BridgeError::GenerationFailed(
                "completion contained no text".into(),
            )),
        }
    }
}

/// Coerces a speaker label into the API's allowed participant name form.
fn participant_name(raw: &str) -> Option<String> {
    let name: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    if name.is_empty() { None } else { Some(name) }
}

fn resolve_api_key(config_key: &Option<String>) -> Result<String, BridgeError> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Ok(key.clone());
    }

    std::env::var("OPENAI_API_KEY").map_err(|_| {
        BridgeError::Config(
            "OpenAI API key not found. Set openai.api_key in config or OPENAI_API_KEY environment variable.".into(),
        )
    })
}
