//! Claude OAuth credentials file.
//!
//! Claude's CLI stores its login in `~/.claude/.credentials.json`:
//!
//! ```json
//! {
//!   "claudeAiOauth": {
//!     "accessToken": "...",
//!     "refreshToken": "...",
//!     "expiresAt": 1735000000000,
//!     "scopes": ["user:profile", "..."],
//!     "subscriptionType": "max"
//!   }
//! }
//! ```
//!
//! The file is one more credential source next to whatever the host hands
//! in; it never replaces them.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

use meterbar_fetch::Credential;

use super::error::ClaudeError;

/// Scope required for the usage endpoint.
pub const REQUIRED_SCOPE: &str = "user:profile";

/// Source label of the file credential.
pub const FILE_SOURCE_LABEL: &str = "file:~/.claude/.credentials.json";

// ============================================================================
// File Structures
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsFile {
    claude_ai_oauth: Option<OAuthData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OAuthData {
    access_token: String,
    expires_at: Option<i64>,
    #[serde(default)]
    scopes: Vec<String>,
    subscription_type: Option<String>,
}

// ============================================================================
// OAuth Credentials
// ============================================================================

/// Credentials read from the file.
#[derive(Debug, Clone)]
pub struct ClaudeOAuthCredentials {
    /// The credential handed to the strategy.
    pub credential: Credential,
    /// Expiration time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Subscription type (`pro`, `max`, ...).
    pub subscription: Option<String>,
}

impl ClaudeOAuthCredentials {
    /// Returns true if the token has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }

    /// Returns true if the token can read usage.
    pub fn has_required_scope(&self) -> bool {
        self.scopes.is_empty() || self.scopes.iter().any(|s| s == REQUIRED_SCOPE)
    }

    /// Parses the file contents.
    ///
    /// # Errors
    ///
    /// Returns [`ClaudeError::InvalidFormat`] for anything but the known
    /// layout (or its bare inner object).
    pub fn parse(json: &str) -> Result<Self, ClaudeError> {
        let data = match serde_json::from_str::<CredentialsFile>(json) {
            Ok(CredentialsFile {
                claude_ai_oauth: Some(data),
            }) => data,
            _ => serde_json::from_str::<OAuthData>(json)
                .map_err(|e| ClaudeError::InvalidFormat(e.to_string()))?,
        };

        let expires_at = data.expires_at.and_then(|ts| {
            let secs = if ts > 10_000_000_000 { ts / 1000 } else { ts };
            Utc.timestamp_opt(secs, 0).single()
        });

        Ok(Self {
            credential: Credential::new(data.access_token, FILE_SOURCE_LABEL),
            expires_at,
            scopes: data.scopes,
            subscription: data.subscription_type,
        })
    }

    /// Loads credentials from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ClaudeError::CredentialsNotFound`] if the file is missing.
    #[instrument]
    pub fn load_from(path: &Path) -> Result<Self, ClaudeError> {
        if !path.exists() {
            return Err(ClaudeError::CredentialsNotFound);
        }
        debug!("Reading credentials file");
        let content = std::fs::read_to_string(path)?;
        let creds = Self::parse(&content)?;
        if !creds.has_required_scope() {
            warn!("Credentials file lacks the usage scope");
        }
        Ok(creds)
    }

    /// Loads credentials from the default location, if present.
    pub fn load() -> Option<Self> {
        let path = credentials_file_path()?;
        match Self::load_from(&path) {
            Ok(creds) => Some(creds),
            Err(ClaudeError::CredentialsNotFound) => None,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable Claude credentials file");
                None
            }
        }
    }
}

/// Returns the path to the credentials file.
pub fn credentials_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".claude").join(".credentials.json"))
}

// ============================================================================
// Tests
// ============================================================================
