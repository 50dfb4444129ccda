// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat platform for deterministic testing.
//!
//! `MockChatPlatform` implements `ChatPlatform` in memory. Posted messages
//! are captured for assertions and appended to per-thread histories, so a
//! later `fetch_thread()` returns what the relay posted. Failures and post
//! latency can be injected.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use chatbridge_core::{
    AdapterType, BridgeError, ChannelId, ChatPlatform, ExecutionId, HealthStatus,
    OutgoingMessage, PluginAdapter, PostedMessage, ThreadContext, ThreadHandle, ThreadMessage,
    UserId, UserProfile,
};

/// A message accepted by [`MockChatPlatform::post_message`].
#[derive(Debug, Clone)]
pub struct RecordedPost {
    pub channel: ChannelId,
    pub ts: ThreadHandle,
    pub message: OutgoingMessage,
}

/// A message replacement accepted by [`MockChatPlatform::update_message`].
#[derive(Debug, Clone)]
pub struct RecordedUpdate {
    pub channel: ChannelId,
    pub ts: ThreadHandle,
    pub message: OutgoingMessage,
}

/// A host function completion report.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCompletion {
    Success {
        execution_id: ExecutionId,
        outputs: serde_json::Value,
    },
    Error {
        execution_id: ExecutionId,
        error: String,
    },
}

impl RecordedCompletion {
    pub fn execution_id(&self) -> &ExecutionId {
        match self {
            RecordedCompletion::Success { execution_id, .. }
            | RecordedCompletion::Error { execution_id, .. } => execution_id,
        }
    }
}

#[derive(Default)]
struct State {
    next_ts: u64,
    posts: Vec<RecordedPost>,
    updates: Vec<RecordedUpdate>,
    completions: Vec<RecordedCompletion>,
    forms: Vec<(String, ThreadContext)>,
    threads: HashMap<(ChannelId, ThreadHandle), Vec<ThreadMessage>>,
    users: HashMap<UserId, UserProfile>,
    failing_posts: usize,
    fail_fetch: bool,
}

impl State {
    fn next_ts(&mut self) -> ThreadHandle {
        self.next_ts += 1;
        ThreadHandle(format!("1700000000.{:06}", self.next_ts))
    }
}

/// An in-memory chat platform for testing.
pub struct MockChatPlatform {
    state: Arc<Mutex<State>>,
    post_delay: Option<Duration>,
}

impl MockChatPlatform {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            post_delay: None,
        }
    }

    /// Delays every post, widening race windows in concurrency tests.
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = Some(delay);
        self
    }

    /// Makes the next `count` posts fail with a post error.
    pub async fn fail_next_posts(&self, count: usize) {
        self.state.lock().await.failing_posts = count;
    }

    /// Makes every thread fetch fail while set.
    pub async fn set_fetch_failure(&self, fail: bool) {
        self.state.lock().await.fail_fetch = fail;
    }

    /// Registers a user returned by `user_profile()`.
    pub async fn add_user(&self, profile: UserProfile) {
        self.state
            .lock()
            .await
            .users
            .insert(profile.id.clone(), profile);
    }

    /// Appends a message to a thread as if a person had posted it.
    ///
    /// Returns the message's generated timestamp.
    pub async fn add_thread_message(
        &self,
        channel: &ChannelId,
        root: &ThreadHandle,
        mut message: ThreadMessage,
    ) -> ThreadHandle {
        let mut state = self.state.lock().await;
        let ts = state.next_ts();
        message.ts = ts.clone();
        message.thread_ts = Some(root.clone());
        state
            .threads
            .entry((channel.clone(), root.clone()))
            .or_default()
            .push(message);
        ts
    }

    pub async fn posts(&self) -> Vec<RecordedPost> {
        self.state.lock().await.posts.clone()
    }

    /// Posts made into `channel`, root messages included.
    pub async fn posts_in(&self, channel: &ChannelId) -> Vec<RecordedPost> {
        self.state
            .lock()
            .await
            .posts
            .iter()
            .filter(|p| &p.channel == channel)
            .cloned()
            .collect()
    }

    /// Top-level posts, i.e. thread roots.
    pub async fn root_posts(&self) -> Vec<RecordedPost> {
        self.state
            .lock()
            .await
            .posts
            .iter()
            .filter(|p| p.message.thread.is_none())
            .cloned()
            .collect()
    }

    pub async fn updates(&self) -> Vec<RecordedUpdate> {
        self.state.lock().await.updates.clone()
    }

    pub async fn completions(&self) -> Vec<RecordedCompletion> {
        self.state.lock().await.completions.clone()
    }

    pub async fn opened_forms(&self) -> Vec<(String, ThreadContext)> {
        self.state.lock().await.forms.clone()
    }
}

impl Default for MockChatPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChatPlatform {
    fn name(&self) -> &str {
        "mock-chat"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Chat
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for MockChatPlatform {
    async fn post_message(
        &self,
        channel: &ChannelId,
        message: &OutgoingMessage,
    ) -> Result<PostedMessage, BridgeError> {
        if let Some(delay) = self.post_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if state.failing_posts > 0 {
            state.failing_posts -= 1;
            return Err(BridgeError::post("mock post failure"));
        }

        let ts = state.next_ts();
        let root = message.thread.clone().unwrap_or_else(|| ts.clone());
        state
            .threads
            .entry((channel.clone(), root))
            .or_default()
            .push(ThreadMessage {
                ts: ts.clone(),
                thread_ts: message.thread.clone(),
                user: None,
                text: message.text.clone(),
                metadata: message.metadata.clone(),
            });
        state.posts.push(RecordedPost {
            channel: channel.clone(),
            ts: ts.clone(),
            message: message.clone(),
        });

        Ok(PostedMessage {
            channel: channel.clone(),
            ts,
        })
    }

    async fn update_message(
        &self,
        channel: &ChannelId,
        ts: &ThreadHandle,
        message: &OutgoingMessage,
    ) -> Result<(), BridgeError> {
        self.state.lock().await.updates.push(RecordedUpdate {
            channel: channel.clone(),
            ts: ts.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn fetch_thread(
        &self,
        channel: &ChannelId,
        thread: &ThreadHandle,
    ) -> Result<Vec<ThreadMessage>, BridgeError> {
        let state = self.state.lock().await;
        if state.fail_fetch {
            return Err(BridgeError::fetch("mock fetch failure"));
        }
        Ok(state
            .threads
            .get(&(channel.clone(), thread.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn user_profile(&self, user: &UserId) -> Result<UserProfile, BridgeError> {
        self.state
            .lock()
            .await
            .users
            .get(user)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("user {user}")))
    }

    async fn open_reply_form(
        &self,
        trigger_id: &str,
        context: &ThreadContext,
    ) -> Result<(), BridgeError> {
        self.state
            .lock()
            .await
            .forms
            .push((trigger_id.to_string(), context.clone()));
        Ok(())
    }

    async fn complete_success(
        &self,
        execution_id: &ExecutionId,
        outputs: serde_json::Value,
    ) -> Result<(), BridgeError> {
        self.state
            .lock()
            .await
            .completions
            .push(RecordedCompletion::Success {
                execution_id: execution_id.clone(),
                outputs,
            });
        Ok(())
    }

    async fn complete_error(
        &self,
        execution_id: &ExecutionId,
        error: &str,
    ) -> Result<(), BridgeError> {
        self.state
            .lock()
            .await
            .completions
            .push(RecordedCompletion::Error {
                execution_id: execution_id.clone(),
                error: error.to_string(),
            });
        Ok(())
    }
}
