// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use chatbridge_config::model::GatewayConfig;
use chatbridge_core::{BridgeError, StorageAdapter};
use chatbridge_relay::Bridge;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    pub storage: Arc<dyn StorageAdapter>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub bridge: Arc<Bridge>,
    pub auth: AuthConfig,
    pub health: HealthState,
    /// Interaction handlers still running. Drained on shutdown.
    pub tasks: TaskTracker,
}

impl GatewayState {
    pub fn new(bridge: Arc<Bridge>, storage: Arc<dyn StorageAdapter>, config: &GatewayConfig) -> Self {
        Self {
            bridge,
            auth: AuthConfig {
                bearer_token: config.bearer_token.clone(),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                storage,
            },
            tasks: TaskTracker::new(),
        }
    }
}

/// Builds the gateway router:
/// - GET /health (no auth)
/// - POST /v1/inbound, /v1/outbound, /v1/functions/knowledge-article and
///   /v1/interactions (bearer auth)
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/inbound", post(handlers::post_inbound))
        .route("/v1/outbound", post(handlers::post_outbound))
        .route(
            "/v1/functions/knowledge-article",
            post(handlers::post_function_start),
        )
        .route("/v1/interactions", post(handlers::post_interaction))
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until `shutdown` is cancelled, then waits for
/// in-flight interaction handlers.
pub async fn start_server(
    config: &GatewayConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), BridgeError> {
    let tasks = state.tasks.clone();
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Config(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| BridgeError::Internal(format!("gateway server error: {e}")))?;

    tasks.close();
    if !tasks.is_empty() {
        tracing::info!(pending = tasks.len(), "waiting for interaction handlers");
    }
    tasks.wait().await;
    Ok(())
}
