// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use chatbridge_core::{
    BridgeError, ChannelId, ExecutionId, HealthStatus, InteractionAction, ThreadContext,
    ThreadHandle,
};
use chatbridge_relay::{ChatReplyEvent, InboundEvent, InteractionEvent, ReplyOrigin};

use crate::server::GatewayState;

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Storage health check result.
    pub storage: String,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Request body for POST /v1/functions/knowledge-article.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionStartRequest {
    pub execution_id: ExecutionId,
    pub channel_id: ChannelId,
    pub message_ts: ThreadHandle,
}

/// Acknowledgement for POST /v1/interactions.
#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub ok: bool,
}

/// A relay error rendered as an HTTP response.
pub struct ApiError(pub BridgeError);

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BridgeError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::ResolutionConflict { .. } => StatusCode::CONFLICT,
            e if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::GenerationFailed(_)
            | BridgeError::Provider { .. }
            | BridgeError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

/// GET /health
///
/// Unauthenticated; reports storage health alongside process uptime.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let (status, storage) = match state.health.storage.health_check().await {
        Ok(HealthStatus::Healthy) => ("ok", "healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => ("degraded", format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => ("unhealthy", format!("unhealthy: {reason}")),
        Err(e) => ("unhealthy", format!("error: {e}")),
    };
    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        storage,
    })
}

/// POST /v1/inbound
///
/// Relays an external message into its conversation thread.
pub async fn post_inbound(
    State(state): State<GatewayState>,
    Json(body): Json<InboundEvent>,
) -> Result<Response, ApiError> {
    let result = state.bridge.relay.relay_inbound(&body).await?;
    Ok((StatusCode::OK, Json(result)).into_response())
}

/// POST /v1/outbound
///
/// Forwards a thread reply to the external system. 204 when the thread is
/// not a tracked conversation.
pub async fn post_outbound(
    State(state): State<GatewayState>,
    Json(body): Json<ChatReplyEvent>,
) -> Result<Response, ApiError> {
    match state
        .bridge
        .relay
        .relay_outbound(&body, ReplyOrigin::Thread)
        .await?
    {
        Some(event) => Ok((StatusCode::OK, Json(event)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /v1/functions/knowledge-article
///
/// Phase 1 of a knowledge-article operation. Completion is reported to the
/// host later, so the response is 202.
pub async fn post_function_start(
    State(state): State<GatewayState>,
    Json(body): Json<FunctionStartRequest>,
) -> Result<Response, ApiError> {
    let context = ThreadContext {
        channel_id: body.channel_id,
        message_ts: body.message_ts,
    };
    let outcome = state.bridge.deferred.start(body.execution_id, context).await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)).into_response())
}

/// POST /v1/interactions
///
/// Acknowledges at once and handles the callback on a tracked task, so the
/// host's acknowledgement deadline is met even while an article generates.
pub async fn post_interaction(
    State(state): State<GatewayState>,
    Json(body): Json<InteractionEvent>,
) -> Result<Json<AckResponse>, ApiError> {
    validate_interaction(&body)?;

    let deferred = state.bridge.deferred.clone();
    state.tasks.spawn(async move {
        let action = body.action;
        match deferred.handle_interaction(body).await {
            Ok(outcome) => tracing::debug!(action = %action, ?outcome, "interaction handled"),
            Err(e) => error!(action = %action, error = %e, "interaction failed"),
        }
    });

    Ok(Json(AckResponse { ok: true }))
}

/// Rejects callbacks that cannot succeed before acknowledging them.
fn validate_interaction(event: &InteractionEvent) -> Result<(), BridgeError> {
    let missing = match event.action {
        InteractionAction::ApproveArticle | InteractionAction::DismissArticle => {
            event.execution_id.is_none().then_some("executionId")
        }
        InteractionAction::OpenReply => event.trigger_id.is_none().then_some("triggerId"),
        InteractionAction::SubmitReply => event.user_id.is_none().then_some("userId"),
    };
    match missing {
        Some(field) => Err(BridgeError::InvalidInput(format!(
            "{field} is required for {}",
            event.action
        ))),
        None => Ok(()),
    }
}
