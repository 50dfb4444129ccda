// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits for thread mappings and deferred operations.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelId, ClaimOutcome, ClaimToken, ConversationId, DeferredOperation, DeferredState, ExecutionId,
    ThreadHandle, ThreadMapping,
};

/// Lifecycle of a storage backend.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (connection, migrations).
    async fn initialize(&self) -> Result<(), BridgeError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), BridgeError>;
}

/// Conversation id to thread handle mapping with create-if-absent semantics.
///
/// All writes are conditional: a mapping row is inserted only when absent and
/// its handle is set only while unset.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Looks up the mapping for a conversation.
    async fn get_mapping(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ThreadMapping>, BridgeError>;

    /// Claims the right to create the conversation's thread.
    ///
    /// A handle-less claim older than `stale_after` is taken over.
    async fn claim_mapping(
        &self,
        conversation_id: &ConversationId,
        channel_id: &ChannelId,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, BridgeError>;

    /// Records the thread handle. Returns `false` if a handle was already set.
    async fn record_thread_handle(
        &self,
        conversation_id: &ConversationId,
        handle: &ThreadHandle,
    ) -> Result<bool, BridgeError>;

    /// Drops a handle-less claim after a failed root post, unless another
    /// caller has since taken it over.
    async fn release_claim(
        &self,
        conversation_id: &ConversationId,
        token: &ClaimToken,
    ) -> Result<(), BridgeError>;

    /// Reverse lookup from a thread to its conversation.
    async fn find_by_thread(
        &self,
        channel_id: &ChannelId,
        handle: &ThreadHandle,
    ) -> Result<Option<ThreadMapping>, BridgeError>;
}

/// Persisted state machine for two-phase operations.
#[async_trait]
pub trait DeferredStore: Send + Sync {
    /// Inserts a pending operation. Returns `false` if the id already exists.
    async fn register_pending(&self, operation: &DeferredOperation) -> Result<bool, BridgeError>;

    async fn get_operation(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<DeferredOperation>, BridgeError>;

    /// Records the message that shows the operation's prompt.
    async fn set_prompt(
        &self,
        execution_id: &ExecutionId,
        prompt_ts: &ThreadHandle,
    ) -> Result<(), BridgeError>;

    /// Marks a pending, unclaimed operation as being processed.
    ///
    /// Returns `false` when another invocation claimed it first or it is
    /// already terminal.
    async fn claim_operation(&self, execution_id: &ExecutionId) -> Result<bool, BridgeError>;

    /// Moves a pending operation to a terminal state.
    ///
    /// Returns `false` if the operation was not pending.
    async fn resolve_operation(
        &self,
        execution_id: &ExecutionId,
        state: DeferredState,
        error: Option<&str>,
    ) -> Result<bool, BridgeError>;
}
