// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatbridge serve`: wires adapters into the relay and runs the gateway.

use std::sync::Arc;

use tracing::{info, warn};

use chatbridge_config::BridgeConfig;
use chatbridge_core::{
    BridgeError, ChatPlatform, CompletionProvider, CrmSink, HealthStatus, PluginAdapter,
    StorageAdapter,
};
use chatbridge_crm::WebhookCrmSink;
use chatbridge_gateway::{GatewayState, start_server};
use chatbridge_openai::OpenAiProvider;
use chatbridge_relay::Bridge;
use chatbridge_slack::SlackPlatform;
use chatbridge_storage::SqliteStore;

use crate::shutdown;

/// Runs the relay until SIGINT or SIGTERM.
pub async fn run_serve(config: BridgeConfig) -> Result<(), BridgeError> {
    init_tracing(&config.bridge.log_level);
    info!(name = %config.bridge.name, version = env!("CARGO_PKG_VERSION"), "starting chatbridge");

    let store = Arc::new(SqliteStore::new(config.storage.clone()));
    store.initialize().await?;
    info!(path = %config.storage.database_path, "storage initialized");

    let platform: Arc<dyn ChatPlatform> = Arc::new(SlackPlatform::new(&config.slack)?);
    let provider: Arc<dyn CompletionProvider> = Arc::new(OpenAiProvider::new(&config.openai)?);
    let crm: Arc<dyn CrmSink> = Arc::new(WebhookCrmSink::new(&config.crm)?);

    report_health(platform.as_ref()).await;
    report_health(provider.as_ref()).await;
    report_health(crm.as_ref()).await;

    let bridge = Arc::new(Bridge::new(
        &config,
        Arc::clone(&platform),
        Arc::clone(&store),
        Arc::clone(&provider),
        Arc::clone(&crm),
    ));
    let state = GatewayState::new(bridge, store.clone(), &config.gateway);

    let cancel = shutdown::install_signal_handler();
    let result = start_server(&config.gateway, state, cancel).await;

    shutdown_adapter(platform.as_ref()).await;
    shutdown_adapter(provider.as_ref()).await;
    shutdown_adapter(crm.as_ref()).await;
    if let Err(e) = store.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("chatbridge stopped");
    result
}

/// Startup health is informational; a degraded adapter does not stop the
/// relay from serving.
async fn report_health<A: PluginAdapter + ?Sized>(adapter: &A) {
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => info!(adapter = adapter.name(), "adapter healthy"),
        Ok(HealthStatus::Degraded(reason)) => {
            warn!(adapter = adapter.name(), reason = %reason, "adapter degraded")
        }
        Ok(HealthStatus::Unhealthy(reason)) => {
            warn!(adapter = adapter.name(), reason = %reason, "adapter unhealthy")
        }
        Err(e) => warn!(adapter = adapter.name(), error = %e, "adapter health check failed"),
    }
}

async fn shutdown_adapter<A: PluginAdapter + ?Sized>(adapter: &A) {
    if let Err(e) = adapter.shutdown().await {
        warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatbridge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
