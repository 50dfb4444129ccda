// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the relay, the stores and the platform adapters.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Metadata event type marking a chat message as conversation content.
pub const CONTENT_TAG: &str = "conversation_content";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// External system's identifier for a logical support conversation.
    ConversationId
);
string_id!(
    /// Chat-platform channel identifier.
    ChannelId
);
string_id!(
    /// Timestamp-style identifier of a chat message. The root message's
    /// handle anchors a thread.
    ThreadHandle
);
string_id!(
    /// Host-issued handle for one run of a deferred function.
    ExecutionId
);
string_id!(
    /// Chat-platform user identifier.
    UserId
);
string_id!(
    /// Proof of holding a thread-creation claim: the claim's timestamp.
    ClaimToken
);

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Chat,
    Provider,
    Storage,
    Crm,
}

// --- Thread mapping ---

/// Persistent link between an external conversation and its chat thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMapping {
    pub conversation_id: ConversationId,
    pub channel_id: ChannelId,
    /// Absent while the creator of the mapping is still posting the root.
    pub thread_handle: Option<ThreadHandle>,
}

/// Result of attempting to claim the right to create a conversation's thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The caller now owns the claim and must post the root message.
    Acquired(ClaimToken),
    /// Another caller already holds or completed the mapping.
    Held(ThreadMapping),
}

/// Channel and message coordinates carried through interaction payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadContext {
    pub channel_id: ChannelId,
    pub message_ts: ThreadHandle,
}

// --- Chat messages ---

/// Message metadata attached on post and returned on fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub event_type: String,
    /// Identity of the original speaker when it is not a platform user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl MessageMetadata {
    /// Returns `true` when the message was tagged with `tag`.
    pub fn is_tagged(&self, tag: &str) -> bool {
        self.event_type == tag
    }
}

/// Sender presentation for a posted message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorIdentity {
    pub username: Option<String>,
    pub icon_url: Option<String>,
    pub icon_emoji: Option<String>,
}

/// How a message is rendered on the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStyle {
    /// Plain text.
    Plain,
    /// External content shown as a quote, optionally with a reply control.
    Quote { reply_control: bool },
    /// Quote of a reply that was forwarded to the external system.
    SentEcho,
    /// Approval prompt for a deferred operation.
    ApprovalPrompt {
        execution_id: ExecutionId,
        context: ThreadContext,
    },
    /// In-progress status of a deferred operation.
    InProgress,
    /// Terminal, non-retryable state of a prompt.
    Terminated,
    /// A generated knowledge article.
    Article { title: String, url_slug: String },
}

/// A message to be posted or used to replace an existing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
    pub style: MessageStyle,
    pub author: AuthorIdentity,
    /// Thread to reply into; `None` posts a top-level message.
    pub thread: Option<ThreadHandle>,
    pub metadata: Option<MessageMetadata>,
}

impl OutgoingMessage {
    pub fn new(text: impl Into<String>, style: MessageStyle) -> Self {
        Self {
            text: text.into(),
            style,
            author: AuthorIdentity::default(),
            thread: None,
            metadata: None,
        }
    }

    pub fn in_thread(mut self, thread: ThreadHandle) -> Self {
        self.thread = Some(thread);
        self
    }

    pub fn with_author(mut self, author: AuthorIdentity) -> Self {
        self.author = author;
        self
    }

    /// Marks the message as conversation content spoken by `author`.
    pub fn tagged(mut self, tag: &str, author: Option<String>) -> Self {
        self.metadata = Some(MessageMetadata {
            event_type: tag.to_string(),
            author,
        });
        self
    }
}

/// Coordinates of a message the platform accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel: ChannelId,
    pub ts: ThreadHandle,
}

/// A message as returned by a thread fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMessage {
    pub ts: ThreadHandle,
    pub thread_ts: Option<ThreadHandle>,
    pub user: Option<UserId>,
    pub text: String,
    pub metadata: Option<MessageMetadata>,
}

/// A platform user's display details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// One message judged to be conversation content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMessage {
    pub speaker_id: String,
    pub text: String,
}

// --- Deferred operations ---

/// Lifecycle state of a deferred operation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeferredState {
    Pending,
    Succeeded,
    Failed,
}

impl DeferredState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, DeferredState::Pending)
    }
}

/// A persisted two-phase operation keyed by its execution id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredOperation {
    pub execution_id: ExecutionId,
    pub context: ThreadContext,
    pub prompt_ts: Option<ThreadHandle>,
    pub state: DeferredState,
    /// Set once phase 2 has begun processing.
    pub claimed: bool,
    pub error: Option<String>,
}

impl DeferredOperation {
    pub fn pending(execution_id: ExecutionId, context: ThreadContext) -> Self {
        Self {
            execution_id,
            context,
            prompt_ts: None,
            state: DeferredState::Pending,
            claimed: false,
            error: None,
        }
    }
}

/// Interactive controls the relay renders and later receives callbacks for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionAction {
    /// Generate the knowledge article for a pending operation.
    ApproveArticle,
    /// Decline generation; the operation fails without output.
    DismissArticle,
    /// Open the reply form for a relayed external message.
    OpenReply,
    /// Reply form submitted.
    SubmitReply,
}

// --- Summarization ---

/// Role of one completion request entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CompletionRole {
    System,
    User,
    Assistant,
}

/// One role-tagged text entry of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEntry {
    pub role: CompletionRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub content: String,
}

/// Ordered entries plus an output budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub entries: Vec<CompletionEntry>,
    pub max_output_tokens: u32,
}

/// Post-processed summarization output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedArticle {
    pub title: String,
    pub url_slug: String,
    pub body: String,
}

/// Structured article handed to the CRM record-creation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeDraft {
    pub title: String,
    pub url_slug: String,
    pub body: String,
    pub thread_ref: String,
}

/// A chat reply forwarded to the external system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundEvent {
    pub chat_conversation_id: ConversationId,
    pub message: String,
    pub sender_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_photo_url: Option<String>,
    pub sent_at: String,
}
