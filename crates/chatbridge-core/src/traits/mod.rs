// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions.
//!
//! External-facing adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod crm;
pub mod platform;
pub mod provider;
pub mod store;

pub use adapter::PluginAdapter;
pub use crm::CrmSink;
pub use platform::ChatPlatform;
pub use provider::CompletionProvider;
pub use store::{DeferredStore, MappingStore, StorageAdapter};
