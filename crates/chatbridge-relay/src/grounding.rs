// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Selects conversation content from a chat thread.
//!
//! Only messages carrying the content tag in their metadata qualify.
//! Prompts and status updates are posted untagged, so they never do.

use std::sync::Arc;

use tracing::debug;

use chatbridge_core::{
    BridgeError, ChannelId, ChatPlatform, GroundingMessage, ThreadHandle, ThreadMessage,
};

const UNKNOWN_SPEAKER: &str = "unknown";

/// Keeps tagged messages in their original order.
///
/// The speaker is the author recorded in the tag, falling back to the
/// posting platform user.
pub fn filter_grounding(messages: &[ThreadMessage], tag: &str) -> Vec<GroundingMessage> {
    messages
        .iter()
        .filter_map(|msg| {
            let meta = msg.metadata.as_ref().filter(|m| m.is_tagged(tag))?;
            let speaker_id = meta
                .author
                .clone()
                .or_else(|| msg.user.as_ref().map(|u| u.to_string()))
                .unwrap_or_else(|| UNKNOWN_SPEAKER.to_string());
            Some(GroundingMessage {
                speaker_id,
                text: msg.text.clone(),
            })
        })
        .collect()
}

/// Reads a thread and extracts its grounding messages.
pub struct GroundingExtractor {
    platform: Arc<dyn ChatPlatform>,
    content_tag: String,
}

impl GroundingExtractor {
    pub fn new(platform: Arc<dyn ChatPlatform>, content_tag: impl Into<String>) -> Self {
        Self {
            platform,
            content_tag: content_tag.into(),
        }
    }

    /// Grounding messages for a thread, or the fetch error.
    pub async fn extract(
        &self,
        channel: &ChannelId,
        thread: &ThreadHandle,
    ) -> Result<Vec<GroundingMessage>, BridgeError> {
        let messages = self.platform.fetch_thread(channel, thread).await?;
        let grounding = filter_grounding(&messages, &self.content_tag);
        debug!(
            channel = %channel,
            thread = %thread,
            fetched = messages.len(),
            kept = grounding.len(),
            "extracted grounding"
        );
        Ok(grounding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_core::{MessageMetadata, UserId, CONTENT_TAG};
    use chatbridge_test_utils::MockChatPlatform;

    fn message(n: usize, tagged: bool) -> ThreadMessage {
        ThreadMessage {
            ts: ThreadHandle(format!("100.{n}")),
            thread_ts: Some(ThreadHandle::from("100.1")),
            user: Some(UserId(format!("U{n}"))),
            text: format!("message {n}"),
            metadata: tagged.then(|| MessageMetadata {
                event_type: CONTENT_TAG.to_string(),
                author: None,
            }),
        }
    }

    #[test]
    fn keeps_only_tagged_messages_in_order() {
        let thread: Vec<_> = (1..=5)
            .map(|n| message(n, matches!(n, 1 | 3 | 4)))
            .collect();

        let grounding = filter_grounding(&thread, CONTENT_TAG);
        let texts: Vec<_> = grounding.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["message 1", "message 3", "message 4"]);
        assert_eq!(grounding[0].speaker_id, "U1");
    }

    #[test]
    fn other_metadata_types_do_not_qualify() {
        let mut msg = message(1, true);
        msg.metadata.as_mut().unwrap().event_type = "status_update".into();
        assert!(filter_grounding(&[msg], CONTENT_TAG).is_empty());
    }

    #[test]
    fn tagged_author_wins_over_posting_user() {
        let mut msg = message(1, true);
        msg.metadata.as_mut().unwrap().author = Some("customer-7".into());
        let grounding = filter_grounding(&[msg], CONTENT_TAG);
        assert_eq!(grounding[0].speaker_id, "customer-7");

        let mut anonymous = message(2, true);
        anonymous.user = None;
        let grounding = filter_grounding(&[anonymous], CONTENT_TAG);
        assert_eq!(grounding[0].speaker_id, UNKNOWN_SPEAKER);
    }

    #[tokio::test]
    async fn failed_fetch_is_reported() {
        let platform = Arc::new(MockChatPlatform::new());
        platform.set_fetch_failure(true).await;
        let extractor = GroundingExtractor::new(platform, CONTENT_TAG);
        let channel = ChannelId::from("C1");
        let thread = ThreadHandle::from("100.1");

        assert!(matches!(
            extractor.extract(&channel, &thread).await,
            Err(BridgeError::Fetch { .. })
        ));
    }
}
