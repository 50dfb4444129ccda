// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter trait that all external-facing adapters implement.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::types::{AdapterType, HealthStatus};

/// The base trait for all Chatbridge adapters.
///
/// Every adapter (chat platform, completion provider, storage, CRM sink)
/// provides identity, health and shutdown hooks through this trait.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    /// Returns the kind of adapter.
    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, BridgeError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), BridgeError>;
}
