// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation relay and deferred knowledge-article pipeline.
//!
//! - [`thread_mapper`] creates at most one chat thread per external
//!   conversation, even across processes sharing one store.
//! - [`relay`] moves messages between the external system and those threads.
//! - [`grounding`], [`summarize`] and [`article`] turn a thread into a
//!   bounded knowledge article.
//! - [`deferred`] runs the two-phase approve-then-generate operation.
//!
//! [`Bridge`] wires all of it from configuration and adapters.

pub mod article;
pub mod deferred;
pub mod grounding;
pub mod relay;
pub mod summarize;
pub mod thread_mapper;

use std::sync::Arc;

use chatbridge_config::model::BridgeConfig;
use chatbridge_core::{ChatPlatform, CompletionProvider, CrmSink, DeferredStore, MappingStore};

pub use article::{ArticleLimits, build_article, derive_slug, derive_title, truncate_body};
pub use deferred::{DeferredController, InteractionEvent, InteractionOutcome, StartOutcome};
pub use grounding::{GroundingExtractor, filter_grounding};
pub use relay::{ChatReplyEvent, InboundEvent, MessageRelay, RelayResult, RelaySettings, ReplyOrigin};
pub use summarize::Summarizer;
pub use thread_mapper::{ClaimTiming, ResolvedThread, ThreadMapper};

/// The relay and the deferred controller, sharing one set of adapters.
pub struct Bridge {
    pub relay: Arc<MessageRelay>,
    pub deferred: Arc<DeferredController>,
}

impl Bridge {
    pub fn new<S>(
        config: &BridgeConfig,
        platform: Arc<dyn ChatPlatform>,
        store: Arc<S>,
        provider: Arc<dyn CompletionProvider>,
        crm: Arc<dyn CrmSink>,
    ) -> Self
    where
        S: MappingStore + DeferredStore + 'static,
    {
        let relay = Arc::new(MessageRelay::new(
            Arc::clone(&platform),
            Arc::clone(&store) as Arc<dyn MappingStore>,
            Arc::clone(&crm),
            RelaySettings::from_config(&config.slack),
            ClaimTiming::from_config(&config.storage),
        ));
        let summarizer = Summarizer::new(provider, &config.article, config.openai.max_output_tokens);
        let deferred = Arc::new(DeferredController::new(
            platform,
            store,
            crm,
            Arc::clone(&relay),
            summarizer,
            ArticleLimits::from_config(&config.article),
        ));
        Self { relay, deferred }
    }
}
