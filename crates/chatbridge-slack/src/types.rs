// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slack Web API payload types used by the adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `chat.postMessage` / `chat.update` body.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatMessageBody {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Fallback for notifications and screen readers.
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SlackMetadata>,
}

/// Message metadata as sent and as returned with `include_all_metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMetadata {
    pub event_type: String,
    #[serde(default)]
    pub event_payload: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostMessageResponse {
    pub channel: String,
    pub ts: String,
}

/// One message from `conversations.replies`.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackMessage {
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: Option<SlackMetadata>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepliesResponse {
    #[serde(default)]
    pub messages: Vec<SlackMessage>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub next_cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersInfoResponse {
    pub user: SlackUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub profile: SlackProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SlackProfile {
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub image_72: Option<String>,
    #[serde(default)]
    pub image_192: Option<String>,
    #[serde(default)]
    pub image_512: Option<String>,
    #[serde(default)]
    pub image_original: Option<String>,
}

impl SlackUser {
    /// Real name, falling back to display name, handle and id.
    pub fn best_name(&self) -> String {
        [
            self.profile.real_name.as_deref(),
            self.real_name.as_deref(),
            self.profile.display_name.as_deref(),
            self.name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|n| !n.trim().is_empty())
        .unwrap_or(&self.id)
        .to_string()
    }

    /// Smallest avatar available, preferring the 72px rendition.
    pub fn photo_url(&self) -> Option<String> {
        let p = &self.profile;
        p.image_72
            .as_ref()
            .or(p.image_192.as_ref())
            .or(p.image_512.as_ref())
            .or(p.image_original.as_ref())
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_name_and_photo_fallbacks() {
        let user: SlackUser = serde_json::from_value(serde_json::json!({
            "id": "U1",
            "name": "ada",
            "profile": {"display_name": "", "image_192": "https://img/192.png"}
        }))
        .unwrap();
        assert_eq!(user.best_name(), "ada");
        assert_eq!(user.photo_url().as_deref(), Some("https://img/192.png"));
    }

    #[test]
    fn message_body_omits_unset_fields() {
        let body = ChatMessageBody {
            channel: "C1".into(),
            text: "hi".into(),
            ..Default::default()
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"channel": "C1", "text": "hi"}));
    }
}
