// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message relay between the external system and chat threads.
//!
//! Inbound messages land in the conversation's thread, tagged as content.
//! Replies posted in a tracked thread are forwarded to the CRM side.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use chatbridge_config::model::SlackConfig;
use chatbridge_core::{
    AuthorIdentity, BridgeError, ChannelId, ChatPlatform, ConversationId, CrmSink, MappingStore,
    MessageStyle, OutboundEvent, OutgoingMessage, ThreadHandle, UserId,
};

use crate::thread_mapper::{ClaimTiming, ResolvedThread, ThreadMapper};

/// Speaker recorded for external messages without an author name.
pub const EXTERNAL_SPEAKER: &str = "external";

/// A message from the external system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub chat_conversation_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub author_photo_url: Option<String>,
    #[serde(default)]
    pub icon_emoji: Option<String>,
    /// Post under the author's name and photo, quoted.
    #[serde(default)]
    pub post_as_user: bool,
}

/// Where an inbound message ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResult {
    pub channel: ChannelId,
    pub chat_conversation_id: ConversationId,
    pub message: String,
    pub thread_ts: ThreadHandle,
    /// `true` when this message became the thread root.
    pub created_thread: bool,
}

/// A reply posted in a chat thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReplyEvent {
    pub channel: ChannelId,
    pub message_ts: ThreadHandle,
    /// Root of the thread the reply was posted in.
    #[serde(default)]
    pub thread_ts: Option<ThreadHandle>,
    pub user_id: UserId,
    pub text: String,
    /// Set when a bot posted the message. Such messages are never forwarded.
    #[serde(default)]
    pub bot_id: Option<String>,
}

impl ChatReplyEvent {
    /// The thread root: `thread_ts` if present, else the message itself.
    pub fn root(&self) -> &ThreadHandle {
        self.thread_ts.as_ref().unwrap_or(&self.message_ts)
    }
}

/// How a reply reached the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOrigin {
    /// Posted natively in the thread.
    Thread,
    /// Submitted through the reply form; echoed into the thread after
    /// delivery.
    Form,
}

/// Chat presentation settings for relayed messages.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub default_channel: Option<ChannelId>,
    pub content_tag: String,
    pub icon_emoji: String,
    pub reply_control: bool,
}

impl RelaySettings {
    pub fn from_config(config: &SlackConfig) -> Self {
        Self {
            default_channel: config.default_channel.clone().map(ChannelId::from),
            content_tag: config.content_tag.clone(),
            icon_emoji: config.icon_emoji.clone(),
            reply_control: config.reply_button,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config(&SlackConfig::default())
    }
}

/// Relays messages in both directions.
pub struct MessageRelay {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<dyn MappingStore>,
    crm: Arc<dyn CrmSink>,
    mapper: ThreadMapper,
    settings: RelaySettings,
}

impl MessageRelay {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn MappingStore>,
        crm: Arc<dyn CrmSink>,
        settings: RelaySettings,
        timing: ClaimTiming,
    ) -> Self {
        Self {
            mapper: ThreadMapper::new(Arc::clone(&store), timing),
            platform,
            store,
            crm,
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Posts an external message into its conversation's thread.
    ///
    /// The first message of a conversation becomes the thread root; later
    /// ones are threaded replies. Messages for one conversation are posted
    /// in the order they arrive at this process.
    pub async fn relay_inbound(&self, event: &InboundEvent) -> Result<RelayResult, BridgeError> {
        let conversation_id = required(&event.chat_conversation_id, "chatConversationId")?;
        required(&event.message, "message")?;
        let conversation_id = ConversationId::from(conversation_id);

        let _guard = self.mapper.lock(&conversation_id).await;
        let outgoing = self.format_inbound(event);

        let resolved = match self.mapper.lookup(&conversation_id).await? {
            Some((channel, handle)) => ResolvedThread {
                channel,
                handle,
                created: false,
            },
            None => {
                let channel = self.resolve_channel(event)?;
                let platform = Arc::clone(&self.platform);
                let root = outgoing.clone();
                self.mapper
                    .get_or_create_thread(&conversation_id, &channel, |channel| async move {
                        platform.post_message(&channel, &root).await.map(|p| p.ts)
                    })
                    .await
                    .inspect_err(|e| {
                        error!(
                            conversation_id = %conversation_id,
                            channel = %channel,
                            error = %e,
                            "failed to resolve conversation thread"
                        );
                    })?
            }
        };

        if !resolved.created {
            let reply = outgoing.in_thread(resolved.handle.clone());
            if let Err(e) = self.platform.post_message(&resolved.channel, &reply).await {
                error!(
                    conversation_id = %conversation_id,
                    thread = %resolved.handle,
                    error = %e,
                    "failed to post reply into conversation thread"
                );
                return Err(e);
            }
        }

        info!(
            conversation_id = %conversation_id,
            channel = %resolved.channel,
            thread = %resolved.handle,
            created_thread = resolved.created,
            "relayed inbound message"
        );

        Ok(RelayResult {
            channel: resolved.channel,
            chat_conversation_id: conversation_id,
            message: event.message.clone(),
            thread_ts: resolved.handle,
            created_thread: resolved.created,
        })
    }

    /// Forwards a thread reply to the external conversation.
    ///
    /// Returns `Ok(None)` when the thread is not a tracked conversation or
    /// the reply came from a bot.
    pub async fn relay_outbound(
        &self,
        event: &ChatReplyEvent,
        origin: ReplyOrigin,
    ) -> Result<Option<OutboundEvent>, BridgeError> {
        if let Some(bot_id) = &event.bot_id {
            debug!(bot_id = %bot_id, "ignoring bot message");
            return Ok(None);
        }
        if event.text.trim().is_empty() {
            debug!(channel = %event.channel, ts = %event.message_ts, "ignoring empty reply");
            return Ok(None);
        }

        let root = event.root();
        let Some(mapping) = self.store.find_by_thread(&event.channel, root).await? else {
            info!(
                channel = %event.channel,
                thread = %root,
                "thread is not a tracked conversation, dropping reply"
            );
            return Ok(None);
        };

        let (sender_name, sender_photo_url) =
            match self.platform.user_profile(&event.user_id).await {
                Ok(profile) => (profile.display_name, profile.photo_url),
                Err(e) => {
                    warn!(user = %event.user_id, error = %e, "profile lookup failed, using user id");
                    (event.user_id.to_string(), None)
                }
            };

        let outbound = OutboundEvent {
            chat_conversation_id: mapping.conversation_id.clone(),
            message: event.text.clone(),
            sender_name,
            sender_photo_url,
            sent_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        self.crm.deliver_message(&outbound).await?;

        info!(
            conversation_id = %mapping.conversation_id,
            thread = %root,
            origin = ?origin,
            "relayed outbound reply"
        );

        if origin == ReplyOrigin::Form {
            self.echo_reply(event, root, &outbound).await;
        }

        Ok(Some(outbound))
    }

    /// Shows a form reply in the thread, tagged so it counts as content.
    ///
    /// The reply was already delivered, so a failed echo is only logged.
    async fn echo_reply(&self, event: &ChatReplyEvent, root: &ThreadHandle, sent: &OutboundEvent) {
        let echo = OutgoingMessage::new(event.text.clone(), MessageStyle::SentEcho)
            .in_thread(root.clone())
            .with_author(AuthorIdentity {
                username: Some(sent.sender_name.clone()),
                icon_url: sent.sender_photo_url.clone(),
                icon_emoji: None,
            })
            .tagged(&self.settings.content_tag, Some(event.user_id.to_string()));

        if let Err(e) = self.platform.post_message(&event.channel, &echo).await {
            warn!(
                channel = %event.channel,
                thread = %root,
                error = %e,
                "reply delivered but echo into thread failed"
            );
        }
    }

    fn format_inbound(&self, event: &InboundEvent) -> OutgoingMessage {
        let author_label = event
            .author_username
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| EXTERNAL_SPEAKER.to_string());

        let message = if event.post_as_user {
            OutgoingMessage::new(
                event.message.clone(),
                MessageStyle::Quote {
                    reply_control: self.settings.reply_control,
                },
            )
            .with_author(AuthorIdentity {
                username: event.author_username.clone(),
                icon_url: event.author_photo_url.clone(),
                icon_emoji: None,
            })
        } else {
            let emoji = event
                .icon_emoji
                .clone()
                .unwrap_or_else(|| self.settings.icon_emoji.clone());
            OutgoingMessage::new(event.message.clone(), MessageStyle::Plain).with_author(
                AuthorIdentity {
                    icon_emoji: Some(emoji),
                    ..AuthorIdentity::default()
                },
            )
        };

        message.tagged(&self.settings.content_tag, Some(author_label))
    }

    fn resolve_channel(&self, event: &InboundEvent) -> Result<ChannelId, BridgeError> {
        event
            .channel
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ChannelId::from)
            .or_else(|| self.settings.default_channel.clone())
            .ok_or_else(|| {
                BridgeError::InvalidInput(
                    "channel is required for a new conversation and no default is configured"
                        .into(),
                )
            })
    }
}

fn required<'a>(value: &'a str, field: &str) -> Result<&'a str, BridgeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::InvalidInput(format!("{field} is required")));
    }
    Ok(trimmed)
}
