// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack chat platform adapter.
//!
//! Implements [`ChatPlatform`] over the Slack Web API: posting and updating
//! Block Kit messages with metadata, paginated thread history, user
//! profiles, modal forms and function completion callbacks.

pub mod blocks;
pub mod client;
pub mod types;

use async_trait::async_trait;
use chatbridge_config::model::SlackConfig;
use chatbridge_core::{
    AdapterType, BridgeError, ChannelId, ChatPlatform, ExecutionId, HealthStatus,
    MessageMetadata, OutgoingMessage, PluginAdapter, PostedMessage, ThreadContext, ThreadHandle,
    ThreadMessage, UserId, UserProfile,
};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::client::{SlackClient, SlackError};
use crate::types::{
    ChatMessageBody, PostMessageResponse, RepliesResponse, SlackMetadata, UsersInfoResponse,
};

/// Page size for `conversations.replies`.
const REPLIES_PAGE_LIMIT: &str = "200";

/// Slack implementation of [`ChatPlatform`].
pub struct SlackPlatform {
    client: SlackClient,
    icon_emoji: String,
}

impl SlackPlatform {
    /// Builds the adapter. Token resolution: config, then `SLACK_BOT_TOKEN`.
    pub fn new(config: &SlackConfig) -> Result<Self, BridgeError> {
        let token = match &config.bot_token {
            Some(token) if !token.is_empty() => token.clone(),
            _ => std::env::var("SLACK_BOT_TOKEN").map_err(|_| {
                BridgeError::Config(
                    "Slack bot token not found. Set slack.bot_token in config or SLACK_BOT_TOKEN environment variable.".into(),
                )
            })?,
        };
        let client = SlackClient::new(&token, &config.api_base_url)
            .map_err(|e| BridgeError::Config(e.to_string()))?;
        info!(base_url = %config.api_base_url, "Slack adapter initialized");
        Ok(Self {
            client,
            icon_emoji: config.icon_emoji.clone(),
        })
    }

    fn message_body(&self, channel: &ChannelId, message: &OutgoingMessage) -> ChatMessageBody {
        let author = &message.author;
        // A custom username/icon_url impersonates the external author;
        // otherwise the message carries the bridge's emoji.
        let icon_emoji = if author.username.is_none() && author.icon_url.is_none() {
            Some(
                author
                    .icon_emoji
                    .clone()
                    .unwrap_or_else(|| self.icon_emoji.clone()),
            )
        } else {
            None
        };
        ChatMessageBody {
            channel: channel.0.clone(),
            ts: None,
            thread_ts: message.thread.as_ref().map(|t| t.0.clone()),
            text: message.text.clone(),
            blocks: blocks::render(channel, message),
            username: author.username.clone(),
            icon_url: author.icon_url.clone(),
            icon_emoji,
            metadata: message.metadata.as_ref().map(|m| SlackMetadata {
                event_type: m.event_type.clone(),
                event_payload: json!({ "author": m.author }),
            }),
        }
    }
}

fn post_err(context: String, e: SlackError) -> BridgeError {
    BridgeError::Post {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

fn fetch_err(context: String, e: SlackError) -> BridgeError {
    BridgeError::Fetch {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

fn to_metadata(raw: Option<SlackMetadata>) -> Option<MessageMetadata> {
    raw.map(|m| MessageMetadata {
        author: m
            .event_payload
            .get("author")
            .and_then(Value::as_str)
            .map(str::to_string),
        event_type: m.event_type,
    })
}

#[async_trait]
impl PluginAdapter for SlackPlatform {
    fn name(&self) -> &str {
        "slack"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Chat
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        match self.client.post::<_, Value>("auth.test", &json!({})).await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(e.to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        debug!("Slack adapter shutting down");
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for SlackPlatform {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &OutgoingMessage,
    ) -> Result<PostedMessage, BridgeError> {
        let body = self.message_body(channel, message);
        let response: PostMessageResponse = self
            .client
            .post("chat.postMessage", &body)
            .await
            .map_err(|e| {
                let context = match &message.thread {
                    Some(thread) => format!("error posting threaded reply to message \"{thread}\""),
                    None => "error posting message".to_string(),
                };
                post_err(context, e)
            })?;
        debug!(channel = %response.channel, ts = %response.ts, "message posted");
        Ok(PostedMessage {
            channel: ChannelId(response.channel),
            ts: ThreadHandle(response.ts),
        })
    }

    async fn update_message(
        &self,
        channel: &ChannelId,
        ts: &ThreadHandle,
        message: &OutgoingMessage,
    ) -> Result<(), BridgeError> {
        let mut body = self.message_body(channel, message);
        body.ts = Some(ts.0.clone());
        body.thread_ts = None;
        self.client
            .post::<_, Value>("chat.update", &body)
            .await
            .map_err(|e| post_err(format!("error updating message \"{ts}\""), e))?;
        Ok(())
    }

    async fn fetch_thread(
        &self,
        channel: &ChannelId,
        thread: &ThreadHandle,
    ) -> Result<Vec<ThreadMessage>, BridgeError> {
        let mut messages = Vec::new();
        let mut cursor = String::new();
        loop {
            let mut params = vec![
                ("channel", channel.as_str()),
                ("ts", thread.as_str()),
                ("include_all_metadata", "true"),
                ("limit", REPLIES_PAGE_LIMIT),
            ];
            if !cursor.is_empty() {
                params.push(("cursor", cursor.as_str()));
            }
            let page: RepliesResponse = self
                .client
                .get("conversations.replies", &params)
                .await
                .map_err(|e| fetch_err(format!("error fetching thread \"{thread}\""), e))?;

            messages.extend(page.messages.into_iter().map(|m| ThreadMessage {
                ts: ThreadHandle(m.ts),
                thread_ts: m.thread_ts.map(ThreadHandle),
                user: m.user.map(UserId),
                text: m.text,
                metadata: to_metadata(m.metadata),
            }));

            let next = page
                .response_metadata
                .map(|meta| meta.next_cursor)
                .unwrap_or_default();
            if !page.has_more || next.is_empty() {
                break;
            }
            cursor = next;
        }
        debug!(channel = %channel, thread = %thread, count = messages.len(), "thread fetched");
        Ok(messages)
    }

    async fn user_profile(&self, user: &UserId) -> Result<UserProfile, BridgeError> {
        let response: UsersInfoResponse = self
            .client
            .get("users.info", &[("user", user.as_str())])
            .await
            .map_err(|e| fetch_err(format!("error looking up user {user}"), e))?;
        Ok(UserProfile {
            id: UserId(response.user.id.clone()),
            display_name: response.user.best_name(),
            photo_url: response.user.photo_url(),
        })
    }

    async fn open_reply_form(
        &self,
        trigger_id: &str,
        context: &ThreadContext,
    ) -> Result<(), BridgeError> {
        let body = json!({
            "trigger_id": trigger_id,
            "view": blocks::reply_form_view(context),
        });
        self.client
            .post::<_, Value>("views.open", &body)
            .await
            .map_err(|e| post_err("failed to open reply form".to_string(), e))?;
        Ok(())
    }

    async fn complete_success(
        &self,
        execution_id: &ExecutionId,
        outputs: Value,
    ) -> Result<(), BridgeError> {
        let body = json!({ "function_execution_id": execution_id, "outputs": outputs });
        self.client
            .post::<_, Value>("functions.completeSuccess", &body)
            .await
            .map_err(|e| post_err(format!("error completing function {execution_id}"), e))?;
        Ok(())
    }

    async fn complete_error(
        &self,
        execution_id: &ExecutionId,
        error: &str,
    ) -> Result<(), BridgeError> {
        let body = json!({ "function_execution_id": execution_id, "error": error });
        self.client
            .post::<_, Value>("functions.completeError", &body)
            .await
            .map_err(|e| post_err(format!("error failing function {execution_id}"), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_core::{AuthorIdentity, CONTENT_TAG, MessageStyle};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn platform(base_url: String) -> SlackPlatform {
        SlackPlatform::new(&SlackConfig {
            bot_token: Some("xoxb-test".into()),
            api_base_url: base_url,
            ..SlackConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn post_quoted_identity_with_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({
                "channel": "C1",
                "thread_ts": "100.000",
                "text": "hello",
                "username": "Jane",
                "icon_url": "https://img/jane.png",
                "metadata": {"event_type": "conversation_content", "event_payload": {"author": "Jane"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true, "channel": "C1", "ts": "101.000"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let message = OutgoingMessage::new("hello", MessageStyle::Quote { reply_control: true })
            .in_thread(ThreadHandle::from("100.000"))
            .with_author(AuthorIdentity {
                username: Some("Jane".into()),
                icon_url: Some("https://img/jane.png".into()),
                icon_emoji: None,
            })
            .tagged(CONTENT_TAG, Some("Jane".into()));
        let posted = platform(server.uri())
            .post_message(&ChannelId::from("C1"), &message)
            .await
            .unwrap();
        assert_eq!(posted.ts, ThreadHandle::from("101.000"));
    }

    #[tokio::test]
    async fn plain_post_uses_default_emoji_and_maps_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(body_partial_json(json!({"icon_emoji": ":speech_balloon:"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "not_in_channel"})),
            )
            .mount(&server)
            .await;

        let err = platform(server.uri())
            .post_message(&ChannelId::from("C1"), &OutgoingMessage::new("x", MessageStyle::Plain))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Post { .. }));
        assert!(err.to_string().contains("not_in_channel"));
    }

    #[tokio::test]
    async fn fetch_thread_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/conversations.replies"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [{"ts": "3.0", "thread_ts": "1.0", "user": "U2", "text": "third"}],
                "has_more": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/conversations.replies"))
            .and(query_param("include_all_metadata", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ok": true,
                "messages": [
                    {"ts": "1.0", "thread_ts": "1.0", "bot_id": "B1", "text": "first",
                     "metadata": {"event_type": "conversation_content", "event_payload": {"author": "ext-7"}}},
                    {"ts": "2.0", "thread_ts": "1.0", "user": "U1", "text": "second"}
                ],
                "has_more": true,
                "response_metadata": {"next_cursor": "page2"}
            })))
            .mount(&server)
            .await;

        let messages = platform(server.uri())
            .fetch_thread(&ChannelId::from("C1"), &ThreadHandle::from("1.0"))
            .await
            .unwrap();
        let texts: Vec<_> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
        let meta = messages[0].metadata.as_ref().unwrap();
        assert!(meta.is_tagged(CONTENT_TAG));
        assert_eq!(meta.author.as_deref(), Some("ext-7"));
        assert!(messages[1].metadata.is_none());
    }

    #[tokio::test]
    async fn completion_callbacks_hit_function_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions.completeSuccess"))
            .and(body_partial_json(json!({"function_execution_id": "Fx1", "outputs": {"message_ts": "1.0"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/functions.completeError"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": false, "error": "function_execution_not_found"})))
            .expect(1)
            .mount(&server)
            .await;

        let slack = platform(server.uri());
        slack
            .complete_success(&ExecutionId::from("Fx1"), json!({"message_ts": "1.0"}))
            .await
            .unwrap();
        assert!(slack.complete_error(&ExecutionId::from("Fx1"), "boom").await.is_err());
    }
}
