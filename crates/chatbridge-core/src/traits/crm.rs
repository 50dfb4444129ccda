// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CRM collaborator adapter trait.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{KnowledgeDraft, OutboundEvent};

/// Receives data leaving the chat platform for the CRM side.
#[async_trait]
pub trait CrmSink: PluginAdapter {
    /// Delivers a chat reply to the external conversation.
    async fn deliver_message(&self, event: &OutboundEvent) -> Result<(), BridgeError>;

    /// Hands off a generated article for knowledge record creation.
    async fn create_knowledge_draft(&self, draft: &KnowledgeDraft) -> Result<(), BridgeError>;
}
