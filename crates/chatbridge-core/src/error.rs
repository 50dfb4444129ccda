// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Chatbridge relay.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all Chatbridge adapter traits and core operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors (invalid TOML, missing credentials, bad limits).
    #[error("configuration error: {0}")]
    Config(String),

    /// Mapping or operation store failure (lookup, conditional write, migration).
    #[error("store error: {source}")]
    Store { source: BoxError },

    /// Chat-platform post or update failure.
    #[error("post error: {message}")]
    Post {
        message: String,
        source: Option<BoxError>,
    },

    /// Thread history retrieval failure.
    #[error("fetch error: {message}")]
    Fetch {
        message: String,
        source: Option<BoxError>,
    },

    /// The completion service returned no usable text.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Attempt to resolve a deferred operation that is no longer pending.
    #[error("operation {execution_id} already resolved ({state})")]
    ResolutionConflict { execution_id: String, state: String },

    /// Completion service transport or API errors.
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<BoxError>,
    },

    /// Handoff to the CRM collaborator failed.
    #[error("delivery error: {message}")]
    Delivery {
        message: String,
        source: Option<BoxError>,
    },

    /// A request was missing required fields or carried malformed values.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Wraps any error as a store failure.
    pub fn store(source: impl Into<BoxError>) -> Self {
        BridgeError::Store {
            source: source.into(),
        }
    }

    /// Builds a post failure without an underlying source.
    pub fn post(message: impl Into<String>) -> Self {
        BridgeError::Post {
            message: message.into(),
            source: None,
        }
    }

    /// Builds a fetch failure without an underlying source.
    pub fn fetch(message: impl Into<String>) -> Self {
        BridgeError::Fetch {
            message: message.into(),
            source: None,
        }
    }

    /// Whether the caller may safely retry the failed operation.
    ///
    /// The relay never retries on its own; this only informs callers such as
    /// the HTTP gateway, which reports retryable failures as 503.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Store { .. }
                | BridgeError::Post { .. }
                | BridgeError::Delivery { .. }
                | BridgeError::Timeout { .. }
        )
    }
}
