//! Fetch error types.
//!
//! Every error a provider can raise is classified onto the four-way
//! [`ErrorKind`] by [`FetchError::kind`]. The orchestrator only stores the
//! kind; the detailed error is logged where it happens.

use std::time::Duration;
use thiserror::Error;

use meterbar_core::{CoreError, ErrorKind, ReconcileError, WireError};

// ============================================================================
// Main Fetch Error
// ============================================================================

/// Error type for fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    /// The server answered with a non-success status.
    #[error("HTTP status {status}")]
    Status {
        /// Status code.
        status: u16,
    },

    /// Request timed out.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Rate limited by the provider.
    #[error("Rate limited, retry after {retry_after:?} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after: Option<u64>,
    },

    /// Credentials were rejected or have expired.
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// No credential was found for the strategy.
    #[error("No credentials: {0}")]
    MissingCredentials(String),

    /// Response did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary cache decoding error.
    #[error("Wire decode error: {0}")]
    Wire(#[from] WireError),

    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// Every credential source failed or none was configured.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    /// Process error.
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// The fetch task panicked or was cancelled.
    #[error("Fetch task aborted: {0}")]
    Aborted(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Classifies this error onto the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthenticationFailed(_) | Self::MissingCredentials(_) => ErrorKind::AuthenticationFailed,
            Self::Reconcile(e) => e.kind(),
            Self::Status { status } => status_kind(*status),
            Self::Timeout(_) | Self::RateLimited { .. } => ErrorKind::Network,
            Self::Http(e) => e.kind(),
            Self::InvalidResponse(_) | Self::Json(_) | Self::Wire(_) => ErrorKind::Decoding,
            Self::Core(CoreError::InvalidData(_) | CoreError::Serialization(_)) => {
                ErrorKind::Decoding
            }
            Self::Process(ProcessError::Timeout(_)) => ErrorKind::Network,
            Self::Core(_) | Self::Process(_) | Self::Aborted(_) | Self::Other(_) => {
                ErrorKind::Generic
            }
        }
    }

    /// Returns true if the failure may be retried within the same attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Maps an HTTP status code onto the taxonomy.
pub fn status_kind(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::AuthenticationFailed,
        408 | 429 | 500..=599 => ErrorKind::Network,
        _ => ErrorKind::Generic,
    }
}

// ============================================================================
// HTTP Error
// ============================================================================

/// HTTP-specific error type.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Request error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Domain not allowed.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl HttpError {
    /// Classifies this error onto the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Request(e) if e.is_decode() => ErrorKind::Decoding,
            Self::Request(e) => match e.status() {
                Some(status) => status_kind(status.as_u16()),
                None => ErrorKind::Network,
            },
            Self::DomainNotAllowed(_) | Self::InvalidUrl(_) => ErrorKind::Generic,
        }
    }
}

// ============================================================================
// Process Error
// ============================================================================

/// Error type for process operations.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Command not found.
    #[error("Command not found: {0}")]
    NotFound(String),

    /// Command timed out.
    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    /// Non-zero exit code.
    #[error("Command exited with code {code}: {stderr}")]
    NonZeroExit {
        /// Exit code from the process.
        code: i32,
        /// Standard error output.
        stderr: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
