//! Store error types.

use thiserror::Error;

use meterbar_core::CoreError;
use meterbar_fetch::FetchError;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A backfill for this provider is already running.
    #[error("Refresh already in progress for {0}")]
    RefreshInProgress(String),

    /// Fetching history failed.
    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Invalid data handed to the store.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Fetch(e) => e.is_retryable(),
            StoreError::Io(_) => true,
            _ => false,
        }
    }
}
