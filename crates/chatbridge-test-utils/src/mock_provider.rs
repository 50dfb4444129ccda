// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted completion provider for deterministic testing.
//!
//! `ScriptedProvider` implements `CompletionProvider` with a FIFO queue of
//! outcomes and captures every request it receives.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use chatbridge_core::{
    AdapterType, BridgeError, CompletionProvider, CompletionRequest, HealthStatus, PluginAdapter,
};

/// A completion provider that replays scripted outcomes.
///
/// When the queue is empty, a default "mock article" text is returned.
pub struct ScriptedProvider {
    outcomes: Arc<Mutex<VecDeque<Result<String, String>>>>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a provider pre-loaded with successful responses.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub async fn push_response(&self, text: impl Into<String>) {
        self.outcomes.lock().await.push_back(Ok(text.into()));
    }

    /// Queue a provider failure with the given message.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.outcomes.lock().await.push_back(Err(message.into()));
    }

    /// Requests received so far, oldest first.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, BridgeError> {
        self.requests.lock().await.push(request);
        match self.outcomes.lock().await.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(BridgeError::Provider {
                message,
                source: None,
            }),
            None => Ok("mock article".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CompletionRequest {
        CompletionRequest {
            entries: Vec::new(),
            max_output_tokens: 10,
        }
    }

    #[tokio::test]
    async fn replays_outcomes_in_order() {
        let provider = ScriptedProvider::with_responses(vec!["first".into()]);
        provider.push_failure("boom").await;

        assert_eq!(provider.complete(request()).await.unwrap(), "first");
        assert!(provider.complete(request()).await.is_err());
        assert_eq!(provider.complete(request()).await.unwrap(), "mock article");
        assert_eq!(provider.requests().await.len(), 3);
    }
}
