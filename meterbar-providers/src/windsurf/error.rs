//! Windsurf-specific errors.

use thiserror::Error;

use meterbar_core::{CoreError, WireError};
use meterbar_fetch::FetchError;

/// Errors reading Windsurf's local state cache.
#[derive(Debug, Error)]
pub enum WindsurfError {
    /// No `state.vscdb` at the expected location.
    #[error("Windsurf state database not found")]
    CacheNotFound,

    /// SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Copying the database failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The auth status key is absent (nobody signed in).
    #[error("No auth status in the state database")]
    MissingKey,

    /// The stored blob is not valid base64.
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The blob is not a well-formed tagged-record message.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// A field the reading needs is absent.
    #[error("Missing field at {path:?}")]
    MissingField {
        /// Field numbers from the root message.
        path: Vec<u32>,
    },

    /// The JSON wrapper around the blob is malformed.
    #[error("Invalid auth status JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The decoded numbers do not form a valid reading.
    #[error(transparent)]
    Usage(#[from] CoreError),
}

impl From<WindsurfError> for FetchError {
    fn from(err: WindsurfError) -> Self {
        match err {
            WindsurfError::CacheNotFound | WindsurfError::MissingKey => {
                FetchError::MissingCredentials(err.to_string())
            }
            WindsurfError::Sqlite(_) | WindsurfError::Io(_) => FetchError::Other(err.to_string()),
            WindsurfError::Wire(e) => FetchError::Wire(e),
            WindsurfError::Json(e) => FetchError::Json(e),
            WindsurfError::Usage(e) => FetchError::Core(e),
            WindsurfError::Base64(_) | WindsurfError::MissingField { .. } => {
                FetchError::InvalidResponse(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterbar_core::ErrorKind;

    #[test]
    fn test_classification() {
        let missing: FetchError = WindsurfError::MissingKey.into();
        assert_eq!(missing.kind(), ErrorKind::AuthenticationFailed);

        let shape: FetchError = WindsurfError::MissingField { path: vec![13, 4] }.into();
        assert_eq!(shape.kind(), ErrorKind::Decoding);
    }
}
