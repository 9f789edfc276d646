//! Credential sources.
//!
//! The fetch layer never touches raw credential storage. A host hands it a
//! [`CredentialSource`] that lists, per provider, zero or more tokens along
//! with where each came from.
//!
//! Shipped sources:
//! - [`StaticCredentials`] - in-memory, for tests and embedding hosts
//! - [`EnvCredentials`] - `METERBAR_<PROVIDER>_TOKEN[_<n>]` variables
//! - [`CredentialChain`] - concatenation of other sources

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use meterbar_core::ProviderKind;
use tracing::debug;

/// Environment variable prefix.
const ENV_PREFIX: &str = "METERBAR";

/// Highest numbered `_TOKEN_<n>` variable that is read.
const MAX_NUMBERED_TOKENS: usize = 9;

// ============================================================================
// Secret
// ============================================================================

/// An opaque token whose `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a token.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw token. Never log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true for an empty token.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

// ============================================================================
// Credential
// ============================================================================

/// One credential tuple for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The token itself.
    pub token: Secret,
    /// Where the token came from, e.g. `env:METERBAR_EXA_TOKEN`.
    pub source_label: String,
    /// Account id, if the source knows it.
    pub account_id: Option<String>,
    /// Account email, if the source knows it.
    pub email: Option<String>,
    /// Overrides the strategy's default priority.
    pub priority_hint: Option<i32>,
}

impl Credential {
    /// Creates a credential.
    pub fn new(token: impl Into<String>, source_label: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token),
            source_label: source_label.into(),
            account_id: None,
            email: None,
            priority_hint: None,
        }
    }

    /// Sets the account id.
    #[must_use]
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the priority hint.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority_hint = Some(priority);
        self
    }
}

// ============================================================================
// Credential Source Trait
// ============================================================================

/// Supplies credentials per provider.
pub trait CredentialSource: Send + Sync {
    /// Returns every credential known for `kind`, in discovery order.
    fn credentials_for(&self, kind: ProviderKind) -> Vec<Credential>;
}

// ============================================================================
// Static Credentials
// ============================================================================

/// In-memory credential table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<ProviderKind, Vec<Credential>>,
}

impl StaticCredentials {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a credential.
    #[must_use]
    pub fn with(mut self, kind: ProviderKind, credential: Credential) -> Self {
        self.insert(kind, credential);
        self
    }

    /// Adds a credential.
    pub fn insert(&mut self, kind: ProviderKind, credential: Credential) {
        self.entries.entry(kind).or_default().push(credential);
    }
}

impl CredentialSource for StaticCredentials {
    fn credentials_for(&self, kind: ProviderKind) -> Vec<Credential> {
        self.entries.get(&kind).cloned().unwrap_or_default()
    }
}

// ============================================================================
// Environment Credentials
// ============================================================================

/// Reads tokens from environment variables.
///
/// For provider `exa` the recognized names are `METERBAR_EXA_TOKEN` and
/// `METERBAR_EXA_TOKEN_1` through `_9`, each with optional `_EMAIL` and
/// `_ACCOUNT` companions (`METERBAR_EXA_TOKEN_2_EMAIL`, ...).
#[derive(Clone)]
pub struct EnvCredentials {
    lookup: Arc<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl EnvCredentials {
    /// Reads from the process environment.
    pub fn new() -> Self {
        Self {
            lookup: Arc::new(|name| std::env::var(name).ok()),
        }
    }

    /// Reads from a fixed set of variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            lookup: Arc::new(move |name| map.get(name).cloned()),
        }
    }

    /// Returns the base variable name for a provider.
    pub fn variable_name(kind: ProviderKind) -> String {
        format!("{ENV_PREFIX}_{}_TOKEN", kind.cli_name().to_ascii_uppercase())
    }

    fn read(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn credential_at(&self, name: &str) -> Option<Credential> {
        let token = self.read(name)?;
        let mut credential = Credential::new(token, format!("env:{name}"));
        credential.email = self.read(&format!("{name}_EMAIL"));
        credential.account_id = self.read(&format!("{name}_ACCOUNT"));
        Some(credential)
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvCredentials").finish_non_exhaustive()
    }
}

impl CredentialSource for EnvCredentials {
    fn credentials_for(&self, kind: ProviderKind) -> Vec<Credential> {
        let base = Self::variable_name(kind);
        let found: Vec<Credential> = std::iter::once(base.clone())
            .chain((1..=MAX_NUMBERED_TOKENS).map(|n| format!("{base}_{n}")))
            .filter_map(|name| self.credential_at(&name))
            .collect();
        debug!(provider = %kind, count = found.len(), "Environment credentials");
        found
    }
}

// ============================================================================
// Credential Chain
// ============================================================================

/// Concatenates several sources in order.
#[derive(Clone, Default)]
pub struct CredentialChain {
    sources: Vec<Arc<dyn CredentialSource>>,
}

impl CredentialChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a source.
    #[must_use]
    pub fn with(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.sources.push(source);
        self
    }
}

impl fmt::Debug for CredentialChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialChain")
            .field("sources", &self.sources.len())
            .finish()
    }
}

impl CredentialSource for CredentialChain {
    fn credentials_for(&self, kind: ProviderKind) -> Vec<Credential> {
        self.sources
            .iter()
            .flat_map(|s| s.credentials_for(kind))
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
