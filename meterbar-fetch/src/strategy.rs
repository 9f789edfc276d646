//! Fetch strategy trait and types.
//!
//! A strategy reads usage through one credential source: one API token,
//! one OAuth token, one CLI login, one local cache. Each strategy yields a
//! single [`Candidate`]; a provider runs all of its strategies and hands the
//! candidates to the reconciler.

use async_trait::async_trait;
use meterbar_core::Candidate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::context::FetchContext;
use crate::error::FetchError;

// ============================================================================
// Fetch Kind
// ============================================================================

/// The kind of credential source a strategy reads through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchKind {
    /// OAuth access token.
    OAuth,
    /// Vendor CLI subprocess.
    CLI,
    /// API key or personal token.
    ApiKey,
    /// Web session cookie.
    WebSession,
    /// Local application cache on disk.
    LocalCache,
}

impl FetchKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OAuth => "OAuth",
            Self::CLI => "CLI",
            Self::ApiKey => "API Key",
            Self::WebSession => "Web Session",
            Self::LocalCache => "Local Cache",
        }
    }

    /// Returns the detail value recorded under `login_method`.
    pub fn login_method(&self) -> &'static str {
        match self {
            Self::OAuth => "oauth",
            Self::CLI => "cli",
            Self::ApiKey => "api_key",
            Self::WebSession => "web_session",
            Self::LocalCache => "local_cache",
        }
    }

    /// Default priority for strategies of this kind (higher wins).
    pub fn default_priority(&self) -> i32 {
        match self {
            Self::OAuth => 80,
            Self::CLI => 70,
            Self::ApiKey => 60,
            Self::WebSession => 40,
            Self::LocalCache => 20,
        }
    }
}

impl fmt::Display for FetchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ============================================================================
// Fetch Strategy Trait
// ============================================================================

/// A way of reading one account's usage through one credential source.
///
/// ## Implementing a Strategy
///
/// ```ignore
/// struct KiroCliStrategy;
///
/// #[async_trait]
/// impl FetchStrategy for KiroCliStrategy {
///     fn id(&self) -> &str {
///         "kiro.cli"
///     }
///
///     fn kind(&self) -> FetchKind {
///         FetchKind::CLI
///     }
///
///     async fn is_available(&self, ctx: &FetchContext) -> bool {
///         ctx.process.command_exists("kiro-cli")
///     }
///
///     async fn fetch(&self, ctx: &FetchContext) -> Result<Candidate, FetchError> {
///         let output = ctx.process.run("kiro-cli", &["usage", "--json"]).await?;
///         parse_usage(output.stdout_if_success()?)
///     }
/// }
/// ```
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Unique identifier, `{provider}.{method}`.
    fn id(&self) -> &str;

    /// The kind of credential source used.
    fn kind(&self) -> FetchKind;

    /// Label recorded on the candidate (e.g. `env:METERBAR_EXA_TOKEN`).
    fn source_label(&self) -> String {
        self.id().to_string()
    }

    /// Quick, offline check that the source exists at all.
    async fn is_available(&self, ctx: &FetchContext) -> bool;

    /// Reads usage through this source.
    async fn fetch(&self, ctx: &FetchContext) -> Result<Candidate, FetchError>;

    /// Priority of the resulting candidate (higher wins on a match).
    fn priority(&self) -> i32 {
        self.kind().default_priority()
    }
}

// ============================================================================
// Strategy Info
// ============================================================================

/// Information about a strategy (for reporting).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyInfo {
    /// Strategy ID.
    pub id: String,
    /// Source label.
    pub source_label: String,
    /// Strategy kind.
    pub kind: FetchKind,
    /// Whether the strategy is available.
    pub available: bool,
    /// Priority.
    pub priority: i32,
}

impl StrategyInfo {
    /// Creates strategy info from a strategy implementation.
    pub async fn from_strategy(strategy: &dyn FetchStrategy, ctx: &FetchContext) -> Self {
        Self {
            id: strategy.id().to_string(),
            source_label: strategy.source_label(),
            kind: strategy.kind(),
            available: strategy.is_available(ctx).await,
            priority: strategy.priority(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_kind_display() {
        assert_eq!(FetchKind::CLI.display_name(), "CLI");
        assert_eq!(FetchKind::LocalCache.to_string(), "Local Cache");
    }

    #[test]
    fn test_default_priority_order() {
        assert!(FetchKind::OAuth.default_priority() > FetchKind::ApiKey.default_priority());
        assert!(FetchKind::ApiKey.default_priority() > FetchKind::LocalCache.default_priority());
    }
}
