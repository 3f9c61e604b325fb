// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley chat relay.

use thiserror::Error;

/// The primary error type used across stores, the relay, and the gateway.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// A required field is missing or empty. Always client-correctable.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The action requires an authenticated agent session and none is present.
    #[error("unauthorized: agent session required")]
    Unauthorized,

    /// The operation references a conversation that does not exist.
    #[error("conversation not found: {conversation_id}")]
    NotFound { conversation_id: String },

    /// Automated reply generation failed or is not configured.
    #[error("responder unavailable: {message}")]
    ResponderUnavailable {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The underlying persistence call failed. No event is published.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration errors (invalid TOML, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for an [`InvalidInput`](ParleyError::InvalidInput) error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Wrap any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Stable machine-readable code used in JSON error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Unauthorized => "unauthorized",
            Self::NotFound { .. } => "not_found",
            Self::ResponderUnavailable { .. } => "responder_unavailable",
            Self::Storage { .. } => "storage_unavailable",
            Self::Config(_) => "config",
            Self::Timeout { .. } => "timeout",
            Self::Internal(_) => "internal",
        }
    }
}
