// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Chatbridge relay.
//!
//! Stores the conversation-to-thread mapping and the deferred operation
//! state machine. Both tables are only ever written through conditional
//! statements, which is what keeps thread creation at most once per
//! conversation and operation resolution exactly once across processes.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
