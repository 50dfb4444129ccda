// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns grounding messages into knowledge-article text.

use std::sync::Arc;

use tracing::{debug, warn};

use chatbridge_config::model::ArticleConfig;
use chatbridge_core::{
    CompletionEntry, CompletionProvider, CompletionRequest, CompletionRole, GroundingMessage,
};

/// Built-in instruction sent ahead of the conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a customer support representative writing a \
helpful Knowledge Article from a resolved conversation between a support agent and a customer. \
You are given the messages of that conversation in order. The first message is from the \
customer. Use only the content of the conversation, no other background information. Write a \
helpful, instructive and professional article that describes the issue and how it was solved, \
so future customers can solve similar issues. Use plain text with no markdown formatting.";

/// Calls the completion service once per conversation.
pub struct Summarizer {
    provider: Arc<dyn CompletionProvider>,
    system_prompt: String,
    max_output_tokens: u32,
}

impl Summarizer {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        config: &ArticleConfig,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_output_tokens,
        }
    }

    /// The instruction followed by one entry per message, in order.
    pub fn build_request(&self, grounding: &[GroundingMessage]) -> CompletionRequest {
        let instruction = CompletionEntry {
            role: CompletionRole::System,
            name: None,
            content: self.system_prompt.clone(),
        };
        let conversation = grounding.iter().map(|msg| CompletionEntry {
            role: CompletionRole::System,
            name: Some(msg.speaker_id.clone()),
            content: format!("[USER {}]: {}", msg.speaker_id, msg.text),
        });

        CompletionRequest {
            entries: std::iter::once(instruction).chain(conversation).collect(),
            max_output_tokens: self.max_output_tokens,
        }
    }

    /// Article text, or `None` when there is nothing to summarize or the
    /// service failed.
    pub async fn summarize(&self, grounding: &[GroundingMessage]) -> Option<String> {
        if grounding.is_empty() {
            warn!("no grounding messages, skipping summarization");
            return None;
        }

        let request = self.build_request(grounding);
        match self.provider.complete(request).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!(chars = text.chars().count(), "summarization complete");
                Some(text)
            }
            Ok(_) => {
                warn!("completion service returned empty text");
                None
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "summarization failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_test_utils::ScriptedProvider;

    fn grounding() -> Vec<GroundingMessage> {
        vec![
            GroundingMessage {
                speaker_id: "customer".into(),
                text: "My export is stuck".into(),
            },
            GroundingMessage {
                speaker_id: "U42".into(),
                text: "Clear the cache and retry".into(),
            },
        ]
    }

    #[test]
    fn request_keeps_speaker_order() {
        let summarizer = Summarizer::new(
            Arc::new(ScriptedProvider::new()),
            &ArticleConfig::default(),
            2000,
        );
        let request = summarizer.build_request(&grounding());

        assert_eq!(request.max_output_tokens, 2000);
        assert_eq!(request.entries.len(), 3);
        assert_eq!(request.entries[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(request.entries[1].name.as_deref(), Some("customer"));
        assert_eq!(request.entries[1].content, "[USER customer]: My export is stuck");
        assert_eq!(request.entries[2].content, "[USER U42]: Clear the cache and retry");
    }

    #[test]
    fn configured_prompt_replaces_default() {
        let config = ArticleConfig {
            system_prompt: Some("Summarize.".into()),
            ..ArticleConfig::default()
        };
        let summarizer = Summarizer::new(Arc::new(ScriptedProvider::new()), &config, 10);
        assert_eq!(summarizer.build_request(&[]).entries[0].content, "Summarize.");
    }

    #[tokio::test]
    async fn provider_failure_yields_none() {
        let provider = Arc::new(ScriptedProvider::new());
        provider.push_failure("503 from upstream").await;
        let summarizer = Summarizer::new(provider, &ArticleConfig::default(), 2000);

        assert!(summarizer.summarize(&grounding()).await.is_none());
    }

    #[tokio::test]
    async fn empty_grounding_skips_the_service() {
        let provider = Arc::new(ScriptedProvider::new());
        let summarizer = Summarizer::new(provider.clone(), &ArticleConfig::default(), 2000);

        assert!(summarizer.summarize(&[]).await.is_none());
        assert!(provider.requests().await.is_empty());
    }

    #[tokio::test]
    async fn blank_completion_yields_none() {
        let provider = Arc::new(ScriptedProvider::with_responses(vec!["  \n".into()]));
        let summarizer = Summarizer::new(provider, &ArticleConfig::default(), 2000);
        assert!(summarizer.summarize(&grounding()).await.is_none());
    }
}
