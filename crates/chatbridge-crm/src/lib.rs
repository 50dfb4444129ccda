// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRM handoff over webhooks.
//!
//! Outbound chat replies and knowledge drafts are POSTed as JSON to the
//! configured endpoints. An endpoint left unset disables that handoff.

use std::time::Duration;

use async_trait::async_trait;
use chatbridge_config::model::CrmConfig;
use chatbridge_core::{
    AdapterType, BridgeError, CrmSink, HealthStatus, KnowledgeDraft, OutboundEvent, PluginAdapter,
};
use serde::Serialize;
use tracing::{debug, warn};

/// [`CrmSink`] that POSTs JSON to webhook URLs.
pub struct WebhookCrmSink {
    http: reqwest::Client,
    messages_url: Option<String>,
    articles_url: Option<String>,
    token: Option<String>,
}

impl WebhookCrmSink {
    pub fn new(config: &CrmConfig) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build CRM HTTP client: {e}")))?;
        Ok(Self {
            http,
            messages_url: config.messages_url.clone(),
            articles_url: config.articles_url.clone(),
            token: config.token.clone(),
        })
    }

    async fn send<T: Serialize + Sync>(&self, url: &str, payload: &T) -> Result<(), BridgeError> {
        let mut request = self.http.post(url).json(payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| BridgeError::Delivery {
            message: format!("CRM request to {url} failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Delivery {
                message: format!("CRM endpoint {url} returned {status}: {body}"),
                source: None,
            });
        }
        debug!(url, status = %status, "CRM handoff delivered");
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for WebhookCrmSink {
    fn name(&self) -> &str {
        "crm-webhook"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Crm
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        if self.messages_url.is_none() {
            return Ok(HealthStatus::Degraded(
                "crm.messages_url not set; outbound replies are not delivered".into(),
            ));
        }
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl CrmSink for WebhookCrmSink {
    async fn deliver_message(&self, event: &OutboundEvent) -> Result<(), BridgeError> {
        match &self.messages_url {
            Some(url) => self.send(url, event).await,
            None => {
                warn!(
                    conversation_id = %event.chat_conversation_id,
                    "crm.messages_url not set, outbound message not delivered"
                );
                Ok(())
            }
        }
    }

    async fn create_knowledge_draft(&self, draft: &KnowledgeDraft) -> Result<(), BridgeError> {
        match &self.articles_url {
            Some(url) => self.send(url, draft).await,
            None => {
                debug!(url_slug = %draft.url_slug, "crm.articles_url not set, draft kept in chat only");
                Ok(())
            }
        }
    }
}
