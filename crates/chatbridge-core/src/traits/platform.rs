// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat platform adapter trait.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelId, ExecutionId, OutgoingMessage, PostedMessage, ThreadContext, ThreadHandle,
    ThreadMessage, UserId, UserProfile,
};

/// Operations the relay needs from the chat platform.
#[async_trait]
pub trait ChatPlatform: PluginAdapter {
    /// Posts a message, top-level or threaded depending on `message.thread`.
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &OutgoingMessage,
    ) -> Result<PostedMessage, BridgeError>;

    /// Replaces the content of an existing message.
    async fn update_message(
        &self,
        channel: &ChannelId,
        ts: &ThreadHandle,
        message: &OutgoingMessage,
    ) -> Result<(), BridgeError>;

    /// Returns every message of a thread, root first, in chronological order.
    ///
    /// Implementations follow pagination until the thread is exhausted.
    async fn fetch_thread(
        &self,
        channel: &ChannelId,
        thread: &ThreadHandle,
    ) -> Result<Vec<ThreadMessage>, BridgeError>;

    /// Looks up display details for a user.
    async fn user_profile(&self, user: &UserId) -> Result<UserProfile, BridgeError>;

    /// Opens the reply form for an interaction.
    async fn open_reply_form(
        &self,
        trigger_id: &str,
        context: &ThreadContext,
    ) -> Result<(), BridgeError>;

    /// Reports successful completion of a host function run.
    async fn complete_success(
        &self,
        execution_id: &ExecutionId,
        outputs: serde_json::Value,
    ) -> Result<(), BridgeError>;

    /// Reports failed completion of a host function run.
    async fn complete_error(
        &self,
        execution_id: &ExecutionId,
        error: &str,
    ) -> Result<(), BridgeError>;
}
