// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Get-or-create of the chat thread behind an external conversation.
//!
//! Creation is guarded by a claim row in the mapping store. Exactly one
//! caller acquires the claim and posts the root message; every other caller
//! waits for the recorded handle. The store claim is what makes this safe
//! across processes. In-process callers are additionally serialized per
//! conversation so they queue behind a lock instead of polling.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use chatbridge_config::model::StorageConfig;
use chatbridge_core::{
    BridgeError, ChannelId, ClaimOutcome, ClaimToken, ConversationId, MappingStore, ThreadHandle,
};

type LockMap = DashMap<ConversationId, Arc<Mutex<()>>>;

/// The thread a conversation's messages go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedThread {
    pub channel: ChannelId,
    pub handle: ThreadHandle,
    /// `true` when this call posted the root message.
    pub created: bool,
}

/// Claim timing.
#[derive(Debug, Clone, Copy)]
pub struct ClaimTiming {
    /// Longest a caller waits for another caller's root post.
    pub wait: Duration,
    pub poll: Duration,
    /// Age after which an unfinished claim is taken over.
    pub stale_after: Duration,
}

impl ClaimTiming {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            wait: Duration::from_millis(config.claim_wait_ms),
            poll: Duration::from_millis(config.claim_poll_ms.max(1)),
            stale_after: Duration::from_secs(config.claim_ttl_secs),
        }
    }
}

impl Default for ClaimTiming {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

/// Holds a conversation's in-process lock until dropped.
pub struct ConversationGuard {
    conversation_id: ConversationId,
    locks: Arc<LockMap>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for ConversationGuard {
    fn drop(&mut self) {
        // The map entry and our guard are the only holders when nobody waits.
        self.locks
            .remove_if(&self.conversation_id, |_, lock| Arc::strong_count(lock) <= 2);
    }
}

/// Resolves conversations to threads, creating each thread exactly once.
pub struct ThreadMapper {
    store: Arc<dyn MappingStore>,
    timing: ClaimTiming,
    locks: Arc<LockMap>,
}

impl ThreadMapper {
    pub fn new(store: Arc<dyn MappingStore>, timing: ClaimTiming) -> Self {
        Self {
            store,
            timing,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Serializes in-process work on one conversation.
    ///
    /// Held across a whole inbound relay so replies are posted in arrival
    /// order.
    pub async fn lock(&self, conversation_id: &ConversationId) -> ConversationGuard {
        let lock = self
            .locks
            .entry(conversation_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        ConversationGuard {
            conversation_id: conversation_id.clone(),
            locks: Arc::clone(&self.locks),
            _guard: guard,
        }
    }

    /// Looks up an existing, completed mapping.
    pub async fn lookup(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<(ChannelId, ThreadHandle)>, BridgeError> {
        Ok(self
            .store
            .get_mapping(conversation_id)
            .await?
            .and_then(|m| m.thread_handle.map(|h| (m.channel_id, h))))
    }

    /// Returns the conversation's thread, posting its root via `post_root`
    /// if none exists yet.
    ///
    /// `post_root` runs at most once, and only when this caller won the
    /// claim. If it fails, the claim is released and its error returned
    /// unchanged so a later message can retry creation.
    pub async fn get_or_create_thread<F, Fut>(
        &self,
        conversation_id: &ConversationId,
        channel: &ChannelId,
        post_root: F,
    ) -> Result<ResolvedThread, BridgeError>
    where
        F: FnOnce(ChannelId) -> Fut,
        Fut: Future<Output = Result<ThreadHandle, BridgeError>>,
    {
        let deadline = Instant::now() + self.timing.wait;

        loop {
            if let Some((channel, handle)) = self.lookup(conversation_id).await? {
                return Ok(ResolvedThread {
                    channel,
                    handle,
                    created: false,
                });
            }

            match self
                .store
                .claim_mapping(conversation_id, channel, self.timing.stale_after)
                .await?
            {
                ClaimOutcome::Acquired(token) => {
                    return self.create(conversation_id, channel, &token, post_root).await;
                }
                ClaimOutcome::Held(mapping) => {
                    if let Some(handle) = mapping.thread_handle {
                        return Ok(ResolvedThread {
                            channel: mapping.channel_id,
                            handle,
                            created: false,
                        });
                    }
                }
            }

            if Instant::now() >= deadline {
                warn!(
                    conversation_id = %conversation_id,
                    waited_ms = self.timing.wait.as_millis() as u64,
                    "gave up waiting for concurrent thread creation"
                );
                return Err(BridgeError::Timeout {
                    duration: self.timing.wait,
                });
            }
            debug!(conversation_id = %conversation_id, "thread creation in progress elsewhere, waiting");
            tokio::time::sleep(self.timing.poll).await;
        }
    }

    async fn create<F, Fut>(
        &self,
        conversation_id: &ConversationId,
        channel: &ChannelId,
        token: &ClaimToken,
        post_root: F,
    ) -> Result<ResolvedThread, BridgeError>
    where
        F: FnOnce(ChannelId) -> Fut,
        Fut: Future<Output = Result<ThreadHandle, BridgeError>>,
    {
        let handle = match post_root(channel.clone()).await {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(release_err) = self.store.release_claim(conversation_id, token).await {
                    warn!(
                        conversation_id = %conversation_id,
                        error = %release_err,
                        "failed to release thread claim; it expires on its own"
                    );
                }
                return Err(e);
            }
        };

        match self.store.record_thread_handle(conversation_id, &handle).await {
            Ok(true) => {
                info!(
                    conversation_id = %conversation_id,
                    channel = %channel,
                    thread = %handle,
                    "created conversation thread"
                );
                Ok(ResolvedThread {
                    channel: channel.clone(),
                    handle,
                    created: true,
                })
            }
            Ok(false) => {
                // Our claim went stale and another caller finished first.
                // Use theirs; the root we posted stays orphaned.
                warn!(
                    conversation_id = %conversation_id,
                    orphaned = %handle,
                    "thread recorded by another caller after claim takeover"
                );
                match self.lookup(conversation_id).await? {
                    Some((channel, handle)) => Ok(ResolvedThread {
                        channel,
                        handle,
                        created: false,
                    }),
                    None => Err(BridgeError::Internal(format!(
                        "mapping for {conversation_id} vanished after takeover"
                    ))),
                }
            }
            Err(e) => {
                error!(
                    conversation_id = %conversation_id,
                    orphaned = %handle,
                    error = %e,
                    "root posted but mapping could not be recorded"
                );
                Err(e)
            }
        }
    }
}
