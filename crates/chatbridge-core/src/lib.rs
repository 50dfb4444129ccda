// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Chatbridge conversation relay.
//!
//! This crate provides the trait definitions, error type and domain types
//! used throughout the workspace. Chat platform, completion, storage and CRM
//! adapters implement the traits defined here; the relay consumes them as
//! trait objects.

pub mod error;
pub mod traits;
pub mod types;

pub use error::BridgeError;
pub use types::{
    AdapterType, AuthorIdentity, ChannelId, ClaimOutcome, ClaimToken, CompletionEntry, CompletionRequest,
    CompletionRole, ConversationId, DeferredOperation, DeferredState, ExecutionId,
    GeneratedArticle, GroundingMessage, HealthStatus, InteractionAction, KnowledgeDraft, MessageMetadata,
    MessageStyle, OutboundEvent, OutgoingMessage, PostedMessage, ThreadContext, ThreadHandle,
    ThreadMapping, ThreadMessage, UserId, UserProfile, CONTENT_TAG,
};

pub use traits::{
    ChatPlatform, CompletionProvider, CrmSink, DeferredStore, MappingStore, PluginAdapter,
    StorageAdapter,
};
