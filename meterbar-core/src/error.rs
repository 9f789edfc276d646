//! Core error types for `MeterBar`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Core error type for `MeterBar` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Provider not found or not configured.
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data, e.g. a reading that violates `remaining <= total`.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// Error Kind
// ============================================================================

/// The four-way failure taxonomy every provider fetch is classified into.
///
/// This is what ends up in a cycle's error map; the detailed error is logged
/// where it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or expired credentials. Needs re-auth, never auto-retried.
    AuthenticationFailed,
    /// Transient transport failure or timeout.
    Network,
    /// Response or cache shape was not what the adapter expects.
    Decoding,
    /// Anything else.
    Generic,
}

impl ErrorKind {
    /// Returns true if the failure may be retried within the same fetch attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Short label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication failed",
            Self::Network => "network error",
            Self::Decoding => "unexpected response",
            Self::Generic => "error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
