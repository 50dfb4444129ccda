// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Chatbridge relay.
//!
//! The external system posts inbound messages and receives outbound replies
//! through the CRM sink; the chat host posts thread replies, function starts
//! and interaction callbacks. All `/v1` routes require a bearer token.

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, HealthState, build_router, start_server};
