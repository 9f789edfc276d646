//! Claude-specific error types.

use thiserror::Error;

use meterbar_fetch::FetchError;

/// Errors reading Claude's local OAuth credentials.
#[derive(Debug, Error)]
pub enum ClaudeError {
    /// The credentials file does not exist.
    #[error("OAuth credentials not found")]
    CredentialsNotFound,

    /// The file exists but could not be read.
    #[error("Failed to read credentials: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not in a known format.
    #[error("Invalid credentials format: {0}")]
    InvalidFormat(String),
}

impl From<ClaudeError> for FetchError {
    fn from(err: ClaudeError) -> Self {
        match err {
            ClaudeError::CredentialsNotFound => FetchError::MissingCredentials(err.to_string()),
            ClaudeError::Io(e) => FetchError::Other(e.to_string()),
            ClaudeError::InvalidFormat(msg) => FetchError::InvalidResponse(msg),
        }
    }
}
