// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRM sink that records handoffs instead of sending them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use chatbridge_core::{
    AdapterType, BridgeError, CrmSink, HealthStatus, KnowledgeDraft, OutboundEvent, PluginAdapter,
};

/// Records delivered messages and knowledge drafts for assertions.
#[derive(Default)]
pub struct RecordingCrmSink {
    messages: Arc<Mutex<Vec<OutboundEvent>>>,
    drafts: Arc<Mutex<Vec<KnowledgeDraft>>>,
    fail_delivery: AtomicBool,
    fail_drafts: AtomicBool,
}

impl RecordingCrmSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_delivery_failure(&self, fail: bool) {
        self.fail_delivery.store(fail, Ordering::SeqCst);
    }

    pub fn set_draft_failure(&self, fail: bool) {
        self.fail_drafts.store(fail, Ordering::SeqCst);
    }

    pub async fn messages(&self) -> Vec<OutboundEvent> {
        self.messages.lock().await.clone()
    }

    pub async fn drafts(&self) -> Vec<KnowledgeDraft> {
        self.drafts.lock().await.clone()
    }
}

#[async_trait]
impl PluginAdapter for RecordingCrmSink {
    fn name(&self) -> &str {
        "recording-crm"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Crm
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl CrmSink for RecordingCrmSink {
    async fn deliver_message(&self, event: &OutboundEvent) -> Result<(), BridgeError> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err(BridgeError::Delivery {
                message: "mock delivery failure".into(),
                source: None,
            });
        }
        self.messages.lock().await.push(event.clone());
        Ok(())
    }

    async fn create_knowledge_draft(&self, draft: &KnowledgeDraft) -> Result<(), BridgeError> {
        if self.fail_drafts.load(Ordering::SeqCst) {
            return Err(BridgeError::Delivery {
                message: "mock draft failure".into(),
                source: None,
            });
        }
        self.drafts.lock().await.push(draft.clone());
        Ok(())
    }
}
