// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Chatbridge integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockChatPlatform`] - In-memory chat platform with thread histories
//! - [`ScriptedProvider`] - Completion provider replaying queued outcomes
//! - [`RecordingCrmSink`] - CRM sink capturing handoffs
//! - [`TestHarness`] - All of the above plus a temp SQLite store

pub mod harness;
pub mod mock_crm;
pub mod mock_platform;
pub mod mock_provider;

pub use harness::TestHarness;
pub use mock_crm::RecordingCrmSink;
pub use mock_platform::{MockChatPlatform, RecordedCompletion, RecordedPost, RecordedUpdate};
pub use mock_provider::ScriptedProvider;
