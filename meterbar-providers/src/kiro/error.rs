//! Kiro-specific errors.

use thiserror::Error;

use meterbar_fetch::{FetchError, ProcessError};

/// Kiro-specific errors.
#[derive(Debug, Error)]
pub enum KiroError {
    /// The CLI says nobody is logged in.
    #[error("Not logged in to Kiro")]
    NotLoggedIn,

    /// The CLI could not be run or exited with an error.
    #[error("kiro-cli failed: {0}")]
    Cli(#[from] ProcessError),

    /// Output was not the expected JSON.
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Output parsed but carried no usage figures.
    #[error("No usage data in kiro-cli output")]
    NoData,
}

impl From<KiroError> for FetchError {
    fn from(err: KiroError) -> Self {
        match err {
            KiroError::NotLoggedIn => FetchError::AuthenticationFailed(err.to_string()),
            KiroError::Cli(e) => FetchError::Process(e),
            KiroError::Parse(e) => FetchError::Json(e),
            KiroError::NoData => FetchError::InvalidResponse(err.to_string()),
        }
    }
}
