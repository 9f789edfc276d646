//! Copilot-specific errors.

use thiserror::Error;

use meterbar_fetch::FetchError;

/// Copilot-specific errors.
#[derive(Debug, Error)]
pub enum CopilotError {
    /// The billing page carried no customer id (session not signed in).
    #[error("No customer id on the billing page")]
    CustomerIdNotFound,

    /// A table cell had an unexpected shape.
    #[error("Invalid billing table: {0}")]
    InvalidTable(String),

    /// A date cell matched none of the known formats.
    #[error("Unrecognized date: {0}")]
    InvalidDate(String),
}

impl From<CopilotError> for FetchError {
    fn from(err: CopilotError) -> Self {
        match err {
            CopilotError::CustomerIdNotFound => FetchError::AuthenticationFailed(err.to_string()),
            CopilotError::InvalidTable(_) | CopilotError::InvalidDate(_) => {
                FetchError::InvalidResponse(err.to_string())
            }
        }
    }
}
