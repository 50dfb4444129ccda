// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for relay integration tests.
//!
//! `TestHarness` assembles mock adapters around a SQLite store in a temp
//! directory. Additional stores can be opened on the same file to simulate
//! independent relay processes.

use std::sync::Arc;
use std::time::Duration;

use chatbridge_config::model::{BridgeConfig, StorageConfig};
use chatbridge_core::{BridgeError, StorageAdapter};
use chatbridge_storage::SqliteStore;

use crate::mock_crm::RecordingCrmSink;
use crate::mock_platform::MockChatPlatform;
use crate::mock_provider::ScriptedProvider;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    responses: Vec<String>,
    default_channel: Option<String>,
    post_delay: Option<Duration>,
    claim_wait_ms: u64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            responses: Vec::new(),
            default_channel: Some("C-DEFAULT".to_string()),
            post_delay: None,
            claim_wait_ms: 5000,
        }
    }

    /// Set scripted completion responses.
    pub fn with_responses(mut self, responses: Vec<String>) -> Self {
        self.responses = responses;
        self
    }

    pub fn with_default_channel(mut self, channel: Option<&str>) -> Self {
        self.default_channel = channel.map(str::to_string);
        self
    }

    /// Delay every chat post by `delay`.
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = Some(delay);
        self
    }

    pub fn with_claim_wait(mut self, wait: Duration) -> Self {
        self.claim_wait_ms = wait.as_millis() as u64;
        self
    }

    /// Build the harness, opening the temp database.
    pub async fn build(self) -> Result<TestHarness, BridgeError> {
        let temp_dir = tempfile::TempDir::new().map_err(BridgeError::store)?;
        let db_path = temp_dir.path().join("test.db");

        let mut config = BridgeConfig::default();
        config.slack.default_channel = self.default_channel;
        config.storage = StorageConfig {
            database_path: db_path.to_string_lossy().into_owned(),
            wal_mode: true,
            claim_wait_ms: self.claim_wait_ms,
            claim_poll_ms: 10,
            claim_ttl_secs: 120,
        };

        let store = SqliteStore::new(config.storage.clone());
        store.initialize().await?;

        let platform = match self.post_delay {
            Some(delay) => MockChatPlatform::new().with_post_delay(delay),
            None => MockChatPlatform::new(),
        };

        Ok(TestHarness {
            platform: Arc::new(platform),
            provider: Arc::new(ScriptedProvider::with_responses(self.responses)),
            crm: Arc::new(RecordingCrmSink::new()),
            store: Arc::new(store),
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// Mock adapters plus a real store, ready to be wired into a relay.
pub struct TestHarness {
    pub platform: Arc<MockChatPlatform>,
    pub provider: Arc<ScriptedProvider>,
    pub crm: Arc<RecordingCrmSink>,
    pub store: Arc<SqliteStore>,
    pub config: BridgeConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Open another store on the same database file.
    pub async fn open_second_store(&self) -> Result<Arc<SqliteStore>, BridgeError> {
        let store = SqliteStore::new(self.config.storage.clone());
        store.initialize().await?;
        Ok(Arc::new(store))
    }
}
