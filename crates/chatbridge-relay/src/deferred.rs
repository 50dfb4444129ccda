// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Two-phase knowledge-article operations.
//!
//! Phase 1 ([`DeferredController::start`]) registers the operation and
//! posts an approval prompt. Phase 2 ([`DeferredController::handle_interaction`])
//! runs when someone clicks the prompt, possibly in another process, and
//! rebuilds everything it needs from the store and the callback payload.
//!
//! Every pending operation reaches exactly one terminal state. Phase 2 first
//! claims the operation in the store; a callback that loses the claim is
//! logged as a conflict and changes nothing.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use chatbridge_core::{
    BridgeError, ChannelId, ChatPlatform, CrmSink, DeferredOperation, DeferredState,
    DeferredStore, ExecutionId, GeneratedArticle, InteractionAction, KnowledgeDraft,
    MessageStyle, OutgoingMessage, ThreadContext, ThreadHandle, UserId,
};

use crate::article::{ArticleLimits, build_article};
use crate::grounding::GroundingExtractor;
use crate::relay::{ChatReplyEvent, MessageRelay, ReplyOrigin};
use crate::summarize::Summarizer;

pub const APPROVAL_PROMPT_TEXT: &str =
    ":sparkles: Do you want to generate a new Knowledge article based on this conversation?";
const IN_PROGRESS_TEXT: &str = ":hourglass_flowing_sand: Generating knowledge article...";
const DONE_TEXT: &str = ":white_check_mark: Knowledge article generated.";
const DRAFT_FAILED_TEXT: &str =
    ":warning: The article was generated but could not be saved as a CRM draft.";

/// Failure reason recorded when an operator declines generation.
pub const DISMISSED_REASON: &str = "dismissed by operator";

/// Phase 1 result returned to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    /// Always `false` for a new operation: completion arrives later.
    pub completed: bool,
    pub prompt_ts: ThreadHandle,
}

/// An interaction callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    /// Present on approval and dismissal callbacks.
    #[serde(default)]
    pub execution_id: Option<ExecutionId>,
    pub action: InteractionAction,
    pub thread_context: ThreadContext,
    /// Thread root of the clicked message when it is itself a threaded reply.
    #[serde(default)]
    pub thread_ts: Option<ThreadHandle>,
    #[serde(default)]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Reply form text.
    #[serde(default)]
    pub submitted_text: Option<String>,
}

impl InteractionEvent {
    /// The context of the conversation thread the callback belongs to.
    pub fn reply_context(&self) -> ThreadContext {
        ThreadContext {
            channel_id: self.thread_context.channel_id.clone(),
            message_ts: self
                .thread_ts
                .clone()
                .unwrap_or_else(|| self.thread_context.message_ts.clone()),
        }
    }
}

/// What a callback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionOutcome {
    Succeeded { article_ts: ThreadHandle },
    Failed { error: String },
    Dismissed,
    /// Another callback claimed the operation first.
    AlreadyHandled { state: DeferredState },
    FormOpened,
    ReplyRelayed { delivered: bool },
}

enum Claim {
    Won(DeferredOperation),
    Lost(DeferredState),
}

/// Drives deferred operations from start to a terminal state.
pub struct DeferredController {
    platform: Arc<dyn ChatPlatform>,
    store: Arc<dyn DeferredStore>,
    crm: Arc<dyn CrmSink>,
    relay: Arc<MessageRelay>,
    extractor: GroundingExtractor,
    summarizer: Summarizer,
    limits: ArticleLimits,
}

impl DeferredController {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        store: Arc<dyn DeferredStore>,
        crm: Arc<dyn CrmSink>,
        relay: Arc<MessageRelay>,
        summarizer: Summarizer,
        limits: ArticleLimits,
    ) -> Self {
        let extractor =
            GroundingExtractor::new(Arc::clone(&platform), relay.settings().content_tag.clone());
        Self {
            platform,
            store,
            crm,
            relay,
            extractor,
            summarizer,
            limits,
        }
    }

    /// Phase 1: register the operation and post the approval prompt into
    /// the thread named by `context`.
    pub async fn start(
        &self,
        execution_id: ExecutionId,
        context: ThreadContext,
    ) -> Result<StartOutcome, BridgeError> {
        let operation = DeferredOperation::pending(execution_id.clone(), context.clone());
        if !self.store.register_pending(&operation).await? {
            return self.restart(&execution_id).await;
        }

        let prompt = OutgoingMessage::new(
            APPROVAL_PROMPT_TEXT,
            MessageStyle::ApprovalPrompt {
                execution_id: execution_id.clone(),
                context: context.clone(),
            },
        )
        .in_thread(context.message_ts.clone());

        let posted = match self.platform.post_message(&context.channel_id, &prompt).await {
            Ok(posted) => posted,
            Err(e) => {
                let reason = format!("could not post approval prompt: {e}");
                self.resolve(&execution_id, DeferredState::Failed, Some(&reason))
                    .await;
                self.report_error(&execution_id, &reason).await;
                return Err(e);
            }
        };

        if let Err(e) = self.store.set_prompt(&execution_id, &posted.ts).await {
            warn!(
                execution_id = %execution_id,
                error = %e,
                "prompt posted but not recorded; status updates will be skipped"
            );
        }

        info!(
            execution_id = %execution_id,
            channel = %context.channel_id,
            prompt_ts = %posted.ts,
            "deferred operation pending"
        );
        Ok(StartOutcome {
            completed: false,
            prompt_ts: posted.ts,
        })
    }

    /// A redelivered phase 1 returns the existing prompt instead of posting
    /// a second one.
    async fn restart(&self, execution_id: &ExecutionId) -> Result<StartOutcome, BridgeError> {
        let existing = self.store.get_operation(execution_id).await?;
        match existing {
            Some(DeferredOperation {
                prompt_ts: Some(prompt_ts),
                state,
                ..
            }) => {
                info!(execution_id = %execution_id, state = %state, "operation already started");
                Ok(StartOutcome {
                    completed: state.is_terminal(),
                    prompt_ts,
                })
            }
            // The prompt was never posted and the operation already failed.
            Some(DeferredOperation { state, .. }) if state.is_terminal() => {
                let conflict = BridgeError::ResolutionConflict {
                    execution_id: execution_id.to_string(),
                    state: state.to_string(),
                };
                warn!(error = %conflict, "redelivered start for a finished operation");
                Err(conflict)
            }
            _ => Err(BridgeError::Internal(format!(
                "operation {execution_id} is already being started"
            ))),
        }
    }

    /// Phase 2 and the reply controls.
    pub async fn handle_interaction(
        &self,
        event: InteractionEvent,
    ) -> Result<InteractionOutcome, BridgeError> {
        match event.action {
            InteractionAction::ApproveArticle => {
                let execution_id = require_execution_id(&event)?;
                match self.claim(execution_id, &event.thread_context).await? {
                    Claim::Won(operation) => Ok(self.approve(operation, &event.thread_context).await),
                    Claim::Lost(state) => Ok(InteractionOutcome::AlreadyHandled { state }),
                }
            }
            InteractionAction::DismissArticle => {
                let execution_id = require_execution_id(&event)?;
                match self.claim(execution_id, &event.thread_context).await? {
                    Claim::Won(operation) => Ok(self.dismiss(operation, &event.thread_context).await),
                    Claim::Lost(state) => Ok(InteractionOutcome::AlreadyHandled { state }),
                }
            }
            InteractionAction::OpenReply => {
                let trigger_id = event
                    .trigger_id
                    .as_deref()
                    .ok_or_else(|| BridgeError::InvalidInput("triggerId is required".into()))?;
                self.platform
                    .open_reply_form(trigger_id, &event.reply_context())
                    .await?;
                Ok(InteractionOutcome::FormOpened)
            }
            InteractionAction::SubmitReply => {
                let user_id = event
                    .user_id
                    .clone()
                    .ok_or_else(|| BridgeError::InvalidInput("userId is required".into()))?;
                let text = event
                    .submitted_text
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| BridgeError::InvalidInput("submittedText is required".into()))?;
                let reply = ChatReplyEvent {
                    channel: event.thread_context.channel_id.clone(),
                    message_ts: event.thread_context.message_ts.clone(),
                    thread_ts: event.thread_ts.clone(),
                    user_id,
                    text,
                    bot_id: None,
                };
                let sent = self.relay.relay_outbound(&reply, ReplyOrigin::Form).await?;
                Ok(InteractionOutcome::ReplyRelayed {
                    delivered: sent.is_some(),
                })
            }
        }
    }

    /// Claims a pending operation for phase 2.
    ///
    /// An unknown id is adopted from the payload so a callback that reaches
    /// a process whose store never saw phase 1 still resolves.
    async fn claim(
        &self,
        execution_id: &ExecutionId,
        context: &ThreadContext,
    ) -> Result<Claim, BridgeError> {
        let operation = match self.store.get_operation(execution_id).await? {
            Some(operation) => operation,
            None => {
                warn!(execution_id = %execution_id, "interaction for unknown operation, adopting payload context");
                let operation = DeferredOperation::pending(execution_id.clone(), context.clone());
                self.store.register_pending(&operation).await?;
                self.store
                    .get_operation(execution_id)
                    .await?
                    .unwrap_or(operation)
            }
        };

        if self.store.claim_operation(execution_id).await? {
            return Ok(Claim::Won(operation));
        }

        let state = self
            .store
            .get_operation(execution_id)
            .await?
            .map_or(operation.state, |op| op.state);
        let conflict = BridgeError::ResolutionConflict {
            execution_id: execution_id.to_string(),
            state: state.to_string(),
        };
        warn!(error = %conflict, "ignoring repeated interaction");
        Ok(Claim::Lost(state))
    }

    async fn approve(
        &self,
        operation: DeferredOperation,
        context: &ThreadContext,
    ) -> InteractionOutcome {
        let execution_id = &operation.execution_id;
        let in_progress = OutgoingMessage::new(IN_PROGRESS_TEXT, MessageStyle::InProgress);
        self.update_prompt(&operation, &context.channel_id, &in_progress)
            .await;

        match self.generate(context).await {
            Ok((article, article_ts)) => {
                self.hand_off_draft(&article, context, &article_ts).await;
                self.resolve(execution_id, DeferredState::Succeeded, None)
                    .await;
                self.update_prompt(
                    &operation,
                    &context.channel_id,
                    &OutgoingMessage::new(DONE_TEXT, MessageStyle::Plain),
                )
                .await;

                let outputs = json!({
                    "message_ts": article_ts,
                    "article_title": article.title,
                    "article_url_name": article.url_slug,
                    "article_body": article.body,
                });
                if let Err(e) = self.platform.complete_success(execution_id, outputs).await {
                    warn!(execution_id = %execution_id, error = %e, "host rejected success completion");
                }

                info!(
                    execution_id = %execution_id,
                    article_ts = %article_ts,
                    slug = %article.url_slug,
                    "knowledge article generated"
                );
                InteractionOutcome::Succeeded { article_ts }
            }
            Err(e) => {
                let reason = e.to_string();
                error!(execution_id = %execution_id, error = %reason, "knowledge article generation failed");
                let terminated = OutgoingMessage::new(
                    format!("Knowledge article generation failed: {reason}"),
                    MessageStyle::Terminated,
                );
                self.update_prompt(&operation, &context.channel_id, &terminated)
                    .await;
                self.resolve(execution_id, DeferredState::Failed, Some(&reason))
                    .await;
                self.report_error(execution_id, &reason).await;
                InteractionOutcome::Failed { error: reason }
            }
        }
    }

    async fn dismiss(
        &self,
        operation: DeferredOperation,
        context: &ThreadContext,
    ) -> InteractionOutcome {
        let execution_id = &operation.execution_id;
        let terminated = OutgoingMessage::new(
            "Knowledge article generation dismissed.",
            MessageStyle::Terminated,
        );
        self.update_prompt(&operation, &context.channel_id, &terminated)
            .await;
        self.resolve(execution_id, DeferredState::Failed, Some(DISMISSED_REASON))
            .await;
        self.report_error(execution_id, DISMISSED_REASON).await;
        info!(execution_id = %execution_id, "deferred operation dismissed");
        InteractionOutcome::Dismissed
    }

    /// Grounding, summarization and the article post.
    async fn generate(
        &self,
        context: &ThreadContext,
    ) -> Result<(GeneratedArticle, ThreadHandle), BridgeError> {
        let grounding = self
            .extractor
            .extract(&context.channel_id, &context.message_ts)
            .await
            .map_err(|e| BridgeError::GenerationFailed(format!("could not read conversation: {e}")))?;
        if grounding.is_empty() {
            return Err(BridgeError::GenerationFailed(
                "no conversation content to summarize".into(),
            ));
        }

        let text = self.summarizer.summarize(&grounding).await.ok_or_else(|| {
            BridgeError::GenerationFailed("completion service returned no article".into())
        })?;
        let article = build_article(&text, &self.limits);

        let message = OutgoingMessage::new(
            article.body.clone(),
            MessageStyle::Article {
                title: article.title.clone(),
                url_slug: article.url_slug.clone(),
            },
        )
        .in_thread(context.message_ts.clone());
        let posted = self
            .platform
            .post_message(&context.channel_id, &message)
            .await?;

        Ok((article, posted.ts))
    }

    /// Draft handoff failures never fail the operation.
    async fn hand_off_draft(
        &self,
        article: &GeneratedArticle,
        context: &ThreadContext,
        article_ts: &ThreadHandle,
    ) {
        let draft = KnowledgeDraft {
            title: article.title.clone(),
            url_slug: article.url_slug.clone(),
            body: article.body.clone(),
            thread_ref: format!("{}/{}", context.channel_id, context.message_ts),
        };
        if let Err(e) = self.crm.create_knowledge_draft(&draft).await {
            warn!(slug = %draft.url_slug, error = %e, "knowledge draft handoff failed");
            let note = OutgoingMessage::new(DRAFT_FAILED_TEXT, MessageStyle::Plain)
                .in_thread(context.message_ts.clone());
            if let Err(e) = self.platform.post_message(&context.channel_id, &note).await {
                warn!(article_ts = %article_ts, error = %e, "could not post draft failure note");
            }
        }
    }

    async fn update_prompt(
        &self,
        operation: &DeferredOperation,
        channel: &ChannelId,
        message: &OutgoingMessage,
    ) {
        let Some(prompt_ts) = &operation.prompt_ts else {
            return;
        };
        if let Err(e) = self.platform.update_message(channel, prompt_ts, message).await {
            warn!(
                execution_id = %operation.execution_id,
                prompt_ts = %prompt_ts,
                error = %e,
                "failed to update prompt"
            );
        }
    }

    async fn resolve(&self, execution_id: &ExecutionId, state: DeferredState, reason: Option<&str>) {
        match self.store.resolve_operation(execution_id, state, reason).await {
            Ok(true) => {}
            Ok(false) => {
                let conflict = BridgeError::ResolutionConflict {
                    execution_id: execution_id.to_string(),
                    state: state.to_string(),
                };
                warn!(error = %conflict, "double resolution rejected");
            }
            Err(e) => {
                error!(execution_id = %execution_id, state = %state, error = %e, "failed to persist resolution");
            }
        }
    }

    async fn report_error(&self, execution_id: &ExecutionId, reason: &str) {
        if let Err(e) = self.platform.complete_error(execution_id, reason).await {
            warn!(execution_id = %execution_id, error = %e, "host rejected error completion");
        }
    }
}

fn require_execution_id(event: &InteractionEvent) -> Result<&ExecutionId, BridgeError> {
    event
        .execution_id
        .as_ref()
        .ok_or_else(|| BridgeError::InvalidInput("executionId is required".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_config::model::ArticleConfig;
    use chatbridge_core::{CompletionProvider, MappingStore};
    use chatbridge_test_utils::{RecordedCompletion, TestHarness};

    use crate::relay::{InboundEvent, RelaySettings};
    use crate::thread_mapper::ClaimTiming;

    struct Fixture {
        harness: TestHarness,
        relay: Arc<MessageRelay>,
        controller: DeferredController,
    }

    async fn fixture(responses: Vec<String>) -> Fixture {
        let harness = TestHarness::builder()
            .with_responses(responses)
            .build()
            .await
            .unwrap();
        let relay = Arc::new(MessageRelay::new(
            harness.platform.clone(),
            harness.store.clone(),
            harness.crm.clone(),
            RelaySettings::from_config(&harness.config.slack),
            ClaimTiming::from_config(&harness.config.storage),
        ));
        let provider: Arc<dyn CompletionProvider> = harness.provider.clone();
        let controller = DeferredController::new(
            harness.platform.clone(),
            harness.store.clone(),
            harness.crm.clone(),
            Arc::clone(&relay),
            Summarizer::new(provider, &ArticleConfig::default(), 2000),
            ArticleLimits::default(),
        );
        Fixture {
            harness,
            relay,
            controller,
        }
    }

    async fn conversation(fx: &Fixture) -> ThreadContext {
        let result = fx
            .relay
            .relay_inbound(&InboundEvent {
                chat_conversation_id: "conv-1".into(),
                message: "My invoices will not download".into(),
                ..InboundEvent::default()
            })
            .await
            .unwrap();
        ThreadContext {
            channel_id: result.channel,
            message_ts: result.thread_ts,
        }
    }

    fn approve(id: &str, context: &ThreadContext) -> InteractionEvent {
        InteractionEvent {
            execution_id: Some(ExecutionId::from(id)),
            action: InteractionAction::ApproveArticle,
            thread_context: context.clone(),
            thread_ts: None,
            trigger_id: None,
            user_id: None,
            submitted_text: None,
        }
    }

    #[tokio::test]
    async fn start_registers_pending_and_posts_prompt() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;

        let outcome = fx
            .controller
            .start(ExecutionId::from("Fx1"), ctx.clone())
            .await
            .unwrap();
        assert!(!outcome.completed);

        let op = fx
            .harness
            .store
            .get_operation(&ExecutionId::from("Fx1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(op.state, DeferredState::Pending);
        assert_eq!(op.prompt_ts.as_ref(), Some(&outcome.prompt_ts));

        let prompt = fx.harness.platform.posts().await.pop().unwrap();
        assert!(matches!(prompt.message.style, MessageStyle::ApprovalPrompt { .. }));
        assert!(prompt.message.metadata.is_none());
        assert_eq!(prompt.message.thread.as_ref(), Some(&ctx.message_ts));
    }

    #[tokio::test]
    async fn repeated_start_reuses_prompt() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;

        let first = fx.controller.start(ExecutionId::from("Fx1"), ctx.clone()).await.unwrap();
        let second = fx.controller.start(ExecutionId::from("Fx1"), ctx).await.unwrap();
        assert_eq!(first.prompt_ts, second.prompt_ts);
        assert_eq!(fx.harness.platform.posts().await.len(), 2);
    }

    #[tokio::test]
    async fn failed_prompt_post_fails_the_operation() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;
        fx.harness.platform.fail_next_posts(1).await;

        let err = fx
            .controller
            .start(ExecutionId::from("Fx1"), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Post { .. }));

        let op = fx
            .harness
            .store
            .get_operation(&ExecutionId::from("Fx1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(op.state, DeferredState::Failed);
        assert!(matches!(
            fx.harness.platform.completions().await.as_slice(),
            [RecordedCompletion::Error { .. }]
        ));
    }

    #[tokio::test]
    async fn start_redelivered_after_failed_prompt_reports_conflict() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;
        fx.harness.platform.fail_next_posts(1).await;
        fx.controller
            .start(ExecutionId::from("Fx1"), ctx.clone())
            .await
            .unwrap_err();

        let err = fx
            .controller
            .start(ExecutionId::from("Fx1"), ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::ResolutionConflict { ref state, .. } if state == "failed"
        ));
        // No second prompt and no second error report.
        assert_eq!(fx.harness.platform.completions().await.len(), 1);
    }

    #[tokio::test]
    async fn approval_posts_article_and_succeeds_once() {
        let article_text = format!("{}\nSteps: clear cache.", "Fixing invoice downloads ".repeat(3));
        let fx = fixture(vec![article_text]).await;
        let ctx = conversation(&fx).await;
        fx.controller.start(ExecutionId::from("Fx1"), ctx.clone()).await.unwrap();

        let outcome = fx
            .controller
            .handle_interaction(approve("Fx1", &ctx))
            .await
            .unwrap();
        let InteractionOutcome::Succeeded { article_ts } = outcome else {
            panic!("expected success, got {outcome:?}");
        };

        let again = fx
            .controller
            .handle_interaction(approve("Fx1", &ctx))
            .await
            .unwrap();
        assert_eq!(
            again,
            InteractionOutcome::AlreadyHandled {
                state: DeferredState::Succeeded
            }
        );

        let op = fx
            .harness
            .store
            .get_operation(&ExecutionId::from("Fx1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(op.state, DeferredState::Succeeded);

        let completions = fx.harness.platform.completions().await;
        assert_eq!(completions.len(), 1);
        let RecordedCompletion::Success { outputs, .. } = &completions[0] else {
            panic!("expected success completion");
        };
        assert_eq!(outputs["message_ts"], article_ts.as_str());
        assert!(outputs["article_url_name"]
            .as_str()
            .unwrap()
            .starts_with("Fixing-invoice-downloads"));

        let drafts = fx.harness.crm.drafts().await;
        assert_eq!(drafts.len(), 1);

        // Grounding held only the tagged inbound message.
        let request = &fx.harness.provider.requests().await[0];
        assert_eq!(request.entries.len(), 2);
        assert!(request.entries[1].content.contains("My invoices will not download"));

        let updates = fx.harness.platform.updates().await;
        assert_eq!(updates[0].message.style, MessageStyle::InProgress);
    }

    #[tokio::test]
    async fn generation_failure_terminates_without_article() {
        let fx = fixture(vec![]).await;
        fx.harness.provider.push_failure("upstream down").await;
        let ctx = conversation(&fx).await;
        fx.controller.start(ExecutionId::from("Fx1"), ctx.clone()).await.unwrap();
        let posts_before = fx.harness.platform.posts().await.len();

        let outcome = fx
            .controller
            .handle_interaction(approve("Fx1", &ctx))
            .await
            .unwrap();
        assert!(matches!(outcome, InteractionOutcome::Failed { .. }));
        assert_eq!(fx.harness.platform.posts().await.len(), posts_before);

        let op = fx
            .harness
            .store
            .get_operation(&ExecutionId::from("Fx1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(op.state, DeferredState::Failed);
        assert!(op.error.unwrap().contains("generation failed"));

        let updates = fx.harness.platform.updates().await;
        assert_eq!(updates.last().unwrap().message.style, MessageStyle::Terminated);
        assert!(fx.harness.crm.drafts().await.is_empty());
    }

    #[tokio::test]
    async fn thread_fetch_failure_is_reported_as_generation_failure() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;
        fx.controller.start(ExecutionId::from("Fx1"), ctx.clone()).await.unwrap();
        fx.harness.platform.set_fetch_failure(true).await;

        let outcome = fx
            .controller
            .handle_interaction(approve("Fx1", &ctx))
            .await
            .unwrap();
        let InteractionOutcome::Failed { error } = outcome else {
            panic!("expected failure");
        };
        assert!(error.contains("could not read conversation"));
        assert!(fx.harness.provider.requests().await.is_empty());
    }

    #[tokio::test]
    async fn draft_failure_does_not_fail_the_operation() {
        let fx = fixture(vec!["An article".into()]).await;
        fx.harness.crm.set_draft_failure(true);
        let ctx = conversation(&fx).await;
        fx.controller.start(ExecutionId::from("Fx1"), ctx.clone()).await.unwrap();

        let outcome = fx
            .controller
            .handle_interaction(approve("Fx1", &ctx))
            .await
            .unwrap();
        assert!(matches!(outcome, InteractionOutcome::Succeeded { .. }));
        let last = fx.harness.platform.posts().await.pop().unwrap();
        assert_eq!(last.message.text, DRAFT_FAILED_TEXT);
    }

    #[tokio::test]
    async fn dismissal_fails_the_operation_and_blocks_approval() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;
        fx.controller.start(ExecutionId::from("Fx1"), ctx.clone()).await.unwrap();

        let dismiss = InteractionEvent {
            action: InteractionAction::DismissArticle,
            ..approve("Fx1", &ctx)
        };
        assert_eq!(
            fx.controller.handle_interaction(dismiss).await.unwrap(),
            InteractionOutcome::Dismissed
        );
        let later = fx
            .controller
            .handle_interaction(approve("Fx1", &ctx))
            .await
            .unwrap();
        assert_eq!(
            later,
            InteractionOutcome::AlreadyHandled {
                state: DeferredState::Failed
            }
        );

        let op = fx
            .harness
            .store
            .get_operation(&ExecutionId::from("Fx1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(op.error.as_deref(), Some(DISMISSED_REASON));
        assert!(fx.harness.provider.requests().await.is_empty());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn lost_claim_logs_resolution_conflict() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;
        fx.controller.start(ExecutionId::from("Fx9"), ctx.clone()).await.unwrap();

        let dismiss = InteractionEvent {
            action: InteractionAction::DismissArticle,
            ..approve("Fx9", &ctx)
        };
        fx.controller.handle_interaction(dismiss.clone()).await.unwrap();
        fx.controller.handle_interaction(dismiss).await.unwrap();

        assert!(logs_contain("operation Fx9 already resolved"));
        assert!(logs_contain("ignoring repeated interaction"));
    }

    #[tokio::test]
    async fn unknown_operation_is_adopted_from_payload() {
        let fx = fixture(vec!["Adopted article".into()]).await;
        let ctx = conversation(&fx).await;

        let outcome = fx
            .controller
            .handle_interaction(approve("Fx-unseen", &ctx))
            .await
            .unwrap();
        assert!(matches!(outcome, InteractionOutcome::Succeeded { .. }));
        // No prompt was recorded, so nothing was updated.
        assert!(fx.harness.platform.updates().await.is_empty());
    }

    #[tokio::test]
    async fn approval_without_execution_id_is_invalid() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;
        let event = InteractionEvent {
            execution_id: None,
            ..approve("unused", &ctx)
        };
        assert!(matches!(
            fx.controller.handle_interaction(event).await,
            Err(BridgeError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn reply_controls_open_form_and_relay_submission() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;

        let open = InteractionEvent {
            execution_id: None,
            action: InteractionAction::OpenReply,
            thread_context: ctx.clone(),
            thread_ts: None,
            trigger_id: Some("trig-1".into()),
            user_id: Some(UserId::from("U7")),
            submitted_text: None,
        };
        assert_eq!(
            fx.controller.handle_interaction(open.clone()).await.unwrap(),
            InteractionOutcome::FormOpened
        );
        assert_eq!(fx.harness.platform.opened_forms().await[0].0, "trig-1");

        let submit = InteractionEvent {
            action: InteractionAction::SubmitReply,
            submitted_text: Some("We are on it".into()),
            ..open
        };
        assert_eq!(
            fx.controller.handle_interaction(submit).await.unwrap(),
            InteractionOutcome::ReplyRelayed { delivered: true }
        );
        assert_eq!(fx.harness.crm.messages().await[0].message, "We are on it");

        // The echo is tagged, so it grounds the next summary.
        let mapping = fx
            .harness
            .store
            .find_by_thread(&ctx.channel_id, &ctx.message_ts)
            .await
            .unwrap();
        assert!(mapping.is_some());
        let echo = fx.harness.platform.posts().await.pop().unwrap();
        assert!(echo.message.metadata.is_some());
    }

    #[tokio::test]
    async fn reply_from_threaded_message_reaches_the_conversation() {
        let fx = fixture(vec![]).await;
        let ctx = conversation(&fx).await;
        fx.relay
            .relay_inbound(&InboundEvent {
                chat_conversation_id: "conv-1".into(),
                message: "Still broken".into(),
                post_as_user: true,
                ..InboundEvent::default()
            })
            .await
            .unwrap();
        let second = fx.harness.platform.posts().await.pop().unwrap();
        assert_eq!(second.message.thread.as_ref(), Some(&ctx.message_ts));

        let clicked = ThreadContext {
            channel_id: ctx.channel_id.clone(),
            message_ts: second.ts.clone(),
        };
        let open = InteractionEvent {
            execution_id: None,
            action: InteractionAction::OpenReply,
            thread_context: clicked,
            thread_ts: Some(ctx.message_ts.clone()),
            trigger_id: Some("trig-2".into()),
            user_id: Some(UserId::from("U7")),
            submitted_text: None,
        };
        fx.controller.handle_interaction(open.clone()).await.unwrap();
        assert_eq!(fx.harness.platform.opened_forms().await[0].1, ctx);

        let submit = InteractionEvent {
            action: InteractionAction::SubmitReply,
            submitted_text: Some("Try again now".into()),
            ..open
        };
        assert_eq!(
            fx.controller.handle_interaction(submit).await.unwrap(),
            InteractionOutcome::ReplyRelayed { delivered: true }
        );
        let messages = fx.harness.crm.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].chat_conversation_id.as_str(), "conv-1");
    }
}
