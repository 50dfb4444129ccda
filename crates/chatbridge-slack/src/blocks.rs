// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Block Kit templating.
//!
//! Maps an [`OutgoingMessage`] and its [`MessageStyle`] to Slack blocks. Kept
//! free of I/O so rendering is testable without a workspace.

use chatbridge_core::{ChannelId, InteractionAction, MessageStyle, OutgoingMessage, ThreadContext};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// `callback_id` of the reply form view.
pub const REPLY_FORM_CALLBACK: &str = "reply_form";
/// `block_id` and `action_id` of the reply form's text input.
pub const REPLY_INPUT_BLOCK: &str = "reply_message";
pub const REPLY_INPUT_ACTION: &str = "reply_text";

/// Slack rejects section text longer than this.
const SECTION_TEXT_LIMIT: usize = 3000;

/// Context serialized into button values and view metadata, so a callback
/// carries everything phase 2 needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
    pub channel_id: String,
    pub message_ts: String,
}

impl ActionValue {
    fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses a button value or view `private_metadata`.
    pub fn decode(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

/// Blocks for a message posted to `channel`. An empty list means "text only".
pub fn render(channel: &ChannelId, message: &OutgoingMessage) -> Vec<Value> {
    match &message.style {
        MessageStyle::Plain => Vec::new(),
        MessageStyle::Quote { reply_control } => {
            let mut blocks = vec![quote(&message.text)];
            if *reply_control {
                blocks.push(json!({"type": "divider"}));
                blocks.push(json!({
                    "type": "section",
                    "text": {"type": "mrkdwn", "text": "_Send reply to external chat_"},
                    "accessory": reply_button(channel, message),
                }));
            }
            blocks
        }
        MessageStyle::SentEcho => vec![
            quote(&message.text),
            context("_Sent to external chat_"),
        ],
        MessageStyle::ApprovalPrompt {
            execution_id,
            context: thread,
        } => {
            let value = ActionValue {
                execution_id: Some(execution_id.0.clone()),
                channel_id: thread.channel_id.0.clone(),
                message_ts: thread.message_ts.0.clone(),
            }
            .encode();
            vec![
                section(&message.text),
                json!({
                    "type": "actions",
                    "block_id": "knowledge_article_approval",
                    "elements": [
                        {
                            "type": "button",
                            "text": {"type": "plain_text", "text": "Approve"},
                            "style": "primary",
                            "action_id": InteractionAction::ApproveArticle.to_string(),
                            "value": value,
                        },
                        {
                            "type": "button",
                            "text": {"type": "plain_text", "text": "Dismiss"},
                            "action_id": InteractionAction::DismissArticle.to_string(),
                            "value": value,
                        }
                    ]
                }),
            ]
        }
        MessageStyle::InProgress => {
            vec![section(&format!(":hourglass_flowing_sand: {}", message.text))]
        }
        MessageStyle::Terminated => vec![
            section(&message.text),
            context("This request is closed. Trigger it again to retry."),
        ],
        MessageStyle::Article { title, url_slug } => vec![
            json!({
                "type": "header",
                "text": {"type": "plain_text", "text": truncate(title, 150)}
            }),
            section(&message.text),
            context(&format!("Draft URL name: `{url_slug}`")),
        ],
    }
}

/// The Reply button of a relayed message.
///
/// A threaded reply carries its root in the button value. A root message has
/// no ts until it is posted, so its button has no value and the clicked
/// message is the root.
fn reply_button(channel: &ChannelId, message: &OutgoingMessage) -> Value {
    let mut button = json!({
        "type": "button",
        "text": {"type": "plain_text", "text": "Reply", "emoji": true},
        "action_id": InteractionAction::OpenReply.to_string(),
    });
    if let Some(root) = &message.thread {
        button["value"] = Value::String(
            ActionValue {
                execution_id: None,
                channel_id: channel.0.clone(),
                message_ts: root.0.clone(),
            }
            .encode(),
        );
    }
    button
}

/// Modal view for replying to the external conversation.
pub fn reply_form_view(context: &ThreadContext) -> Value {
    let metadata = ActionValue {
        execution_id: None,
        channel_id: context.channel_id.0.clone(),
        message_ts: context.message_ts.0.clone(),
    }
    .encode();
    json!({
        "type": "modal",
        "callback_id": REPLY_FORM_CALLBACK,
        "private_metadata": metadata,
        "title": {"type": "plain_text", "text": "Reply to External Chat"},
        "submit": {"type": "plain_text", "text": "Submit"},
        "close": {"type": "plain_text", "text": "Close"},
        "blocks": [{
            "type": "input",
            "block_id": REPLY_INPUT_BLOCK,
            "label": {"type": "plain_text", "text": "Message", "emoji": true},
            "element": {
                "type": "plain_text_input",
                "multiline": true,
                "action_id": REPLY_INPUT_ACTION,
                "placeholder": {
                    "type": "plain_text",
                    "text": "Write a response to the external chat",
                    "emoji": true
                }
            }
        }]
    })
}

fn quote(text: &str) -> Value {
    json!({
        "type": "rich_text",
        "elements": [{
            "type": "rich_text_quote",
            "elements": [{"type": "text", "text": text}]
        }]
    })
}

fn section(text: &str) -> Value {
    json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": truncate(text, SECTION_TEXT_LIMIT)}
    })
}

fn context(text: &str) -> Value {
    json!({
        "type": "context",
        "elements": [{"type": "mrkdwn", "text": text}]
    })
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_core::{ChannelId, ExecutionId, ThreadHandle};

    fn chan() -> ChannelId {
        ChannelId::from("C1")
    }

    fn ctx() -> ThreadContext {
        ThreadContext {
            channel_id: ChannelId::from("C1"),
            message_ts: ThreadHandle::from("1700000000.000100"),
        }
    }

    #[test]
    fn plain_has_no_blocks() {
        assert!(render(&chan(), &OutgoingMessage::new("hi", MessageStyle::Plain)).is_empty());
    }

    #[test]
    fn quote_with_reply_control() {
        let blocks = render(&chan(), &OutgoingMessage::new(
            "printer on fire",
            MessageStyle::Quote { reply_control: true },
        ));
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0]["elements"][0]["type"], "rich_text_quote");
        assert_eq!(blocks[0]["elements"][0]["elements"][0]["text"], "printer on fire");
        assert_eq!(blocks[1]["type"], "divider");
        assert_eq!(blocks[2]["accessory"]["action_id"], "open_reply");
        assert!(blocks[2]["accessory"].get("value").is_none());
    }

    #[test]
    fn threaded_reply_button_names_the_thread_root() {
        let message = OutgoingMessage::new(
            "second message",
            MessageStyle::Quote { reply_control: true },
        )
        .in_thread(ThreadHandle::from("1700000000.000001"));
        let blocks = render(&chan(), &message);

        let raw = blocks[2]["accessory"]["value"].as_str().unwrap();
        let value = ActionValue::decode(raw).unwrap();
        assert_eq!(value.channel_id, "C1");
        assert_eq!(value.message_ts, "1700000000.000001");
        assert!(value.execution_id.is_none());
    }

    #[test]
    fn quote_without_reply_control() {
        let blocks = render(&chan(), &OutgoingMessage::new(
            "x",
            MessageStyle::Quote { reply_control: false },
        ));
        assert_eq!(blocks.len(), 1);
    }

    #[test]
    fn approval_prompt_carries_context_in_button_value() {
        let blocks = render(&chan(), &OutgoingMessage::new(
            "Generate?",
            MessageStyle::ApprovalPrompt {
                execution_id: ExecutionId::from("Fx9"),
                context: ctx(),
            },
        ));
        let approve = &blocks[1]["elements"][0];
        assert_eq!(approve["action_id"], "approve_article");
        assert_eq!(approve["style"], "primary");
        let value = ActionValue::decode(approve["value"].as_str().unwrap()).unwrap();
        assert_eq!(value.execution_id.as_deref(), Some("Fx9"));
        assert_eq!(value.channel_id, "C1");
        assert_eq!(value.message_ts, "1700000000.000100");
        assert_eq!(blocks[1]["elements"][1]["action_id"], "dismiss_article");
    }

    #[test]
    fn article_header_is_bounded() {
        let blocks = render(&chan(), &OutgoingMessage::new(
            "body",
            MessageStyle::Article {
                title: "t".repeat(200),
                url_slug: "t-1".into(),
            },
        ));
        assert_eq!(blocks[0]["text"]["text"].as_str().unwrap().len(), 150);
    }

    #[test]
    fn reply_form_round_trips_context() {
        let view = reply_form_view(&ctx());
        assert_eq!(view["callback_id"], REPLY_FORM_CALLBACK);
        let meta = ActionValue::decode(view["private_metadata"].as_str().unwrap()).unwrap();
        assert_eq!(meta.channel_id, "C1");
        assert!(meta.execution_id.is_none());
    }
}
