// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use chatbridge_config::model::StorageConfig;
use chatbridge_core::{
    AdapterType, BridgeError, ChannelId, ClaimOutcome, ClaimToken, ConversationId, DeferredOperation,
    DeferredState, DeferredStore, ExecutionId, HealthStatus, MappingStore, PluginAdapter,
    StorageAdapter, ThreadHandle, ThreadMapping,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed mapping and operation store.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// method fails with a store error until then.
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store for the configured path without opening it.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, BridgeError> {
        self.db
            .get()
            .ok_or_else(|| BridgeError::store("storage not initialized, call initialize() first"))
    }

    async fn checkpoint(&self) -> Result<(), BridgeError> {
        if let Some(db) = self.db.get() {
            db.connection()
                .call(|conn| conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);"))
                .await
                .map_err(map_tr_err)?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        let Ok(db) = self.db() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        let pending = queries::operations::count_pending(db).await?;
        debug!(pending, "storage health check");
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        self.checkpoint().await
    }
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    async fn initialize(&self) -> Result<(), BridgeError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| BridgeError::store("storage already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), BridgeError> {
        self.db()?;
        self.checkpoint().await
    }
}

#[async_trait]
impl MappingStore for SqliteStore {
    async fn get_mapping(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<ThreadMapping>, BridgeError> {
        queries::mappings::get(self.db()?, conversation_id).await
    }

    async fn claim_mapping(
        &self,
        conversation_id: &ConversationId,
        channel_id: &ChannelId,
        stale_after: Duration,
    ) -> Result<ClaimOutcome, BridgeError> {
        queries::mappings::claim(self.db()?, conversation_id, channel_id, stale_after).await
    }

    async fn record_thread_handle(
        &self,
        conversation_id: &ConversationId,
        handle: &ThreadHandle,
    ) -> Result<bool, BridgeError> {
        queries::mappings::record_handle(self.db()?, conversation_id, handle).await
    }

    async fn release_claim(
        &self,
        conversation_id: &ConversationId,
        token: &ClaimToken,
    ) -> Result<(), BridgeError> {
        queries::mappings::release(self.db()?, conversation_id, token).await
    }

    async fn find_by_thread(
        &self,
        channel_id: &ChannelId,
        handle: &ThreadHandle,
    ) -> Result<Option<ThreadMapping>, BridgeError> {
        queries::mappings::find_by_thread(self.db()?, channel_id, handle).await
    }
}

#[async_trait]
impl DeferredStore for SqliteStore {
    async fn register_pending(&self, operation: &DeferredOperation) -> Result<bool, BridgeError> {
        queries::operations::register(self.db()?, operation).await
    }

    async fn get_operation(
        &self,
        execution_id: &ExecutionId,
    ) -> Result<Option<DeferredOperation>, BridgeError> {
        queries::operations::get(self.db()?, execution_id).await
    }

    async fn set_prompt(
        &self,
        execution_id: &ExecutionId,
        prompt_ts: &ThreadHandle,
    ) -> Result<(), BridgeError> {
        queries::operations::set_prompt(self.db()?, execution_id, prompt_ts).await
    }

    async fn claim_operation(&self, execution_id: &ExecutionId) -> Result<bool, BridgeError> {
        queries::operations::claim(self.db()?, execution_id).await
    }

    async fn resolve_operation(
        &self,
        execution_id: &ExecutionId,
        state: DeferredState,
        error: Option<&str>,
    ) -> Result<bool, BridgeError> {
        queries::operations::resolve(self.db()?, execution_id, state, error).await
    }
}
