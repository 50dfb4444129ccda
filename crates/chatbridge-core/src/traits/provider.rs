// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion service adapter trait.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::CompletionRequest;

/// A black-box text completion service.
#[async_trait]
pub trait CompletionProvider: PluginAdapter {
    /// Sends one request and returns the completion text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, BridgeError>;
}
