//! Fetch context providing access to host APIs.
//!
//! The fetch context is passed to every provider and strategy and bundles
//! the credential source, HTTP client, process runner and settings.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use meterbar_core::ProviderKind;

use crate::host::{
    credentials::{CredentialSource, EnvCredentials},
    http::HttpClient,
    process::ProcessRunner,
};
use crate::retry::RetryStrategy;

// ============================================================================
// Fetch Settings
// ============================================================================

/// Settings for fetch operations.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Timeout for a single request or subprocess.
    pub timeout: Duration,
    /// Retry policy for transient failures within one attempt.
    pub retry: RetryStrategy,
    /// Per-provider endpoint overrides (base URLs).
    pub endpoints: HashMap<ProviderKind, String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryStrategy::default(),
            endpoints: HashMap::new(),
        }
    }
}

impl FetchSettings {
    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryStrategy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the base URL for a provider.
    #[must_use]
    pub fn with_endpoint(mut self, kind: ProviderKind, url: impl Into<String>) -> Self {
        self.endpoints.insert(kind, url.into());
        self
    }
}

// ============================================================================
// Fetch Context
// ============================================================================

/// Context provided to fetch strategies, giving access to host APIs.
pub struct FetchContext {
    /// Where tokens come from.
    pub credentials: Arc<dyn CredentialSource>,
    /// HTTP client with tracing.
    pub http: Arc<HttpClient>,
    /// Process runner for CLI tools.
    pub process: Arc<ProcessRunner>,
    /// Fetch settings.
    pub settings: FetchSettings,
}

impl FetchContext {
    /// Creates a context reading credentials from the environment.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for customizing the context.
    pub fn builder() -> FetchContextBuilder {
        FetchContextBuilder::new()
    }

    /// Returns the effective timeout for fetch operations.
    pub fn timeout(&self) -> Duration {
        self.settings.timeout
    }

    /// Returns the endpoint for a provider: the override if set, else
    /// `default`.
    pub fn endpoint<'a>(&'a self, kind: ProviderKind, default: &'a str) -> &'a str {
        self.settings
            .endpoints
            .get(&kind)
            .map_or(default, String::as_str)
    }
}

impl Default for FetchContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FetchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchContext")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Fetch Context Builder
// ============================================================================

/// Builder for constructing a `FetchContext`.
pub struct FetchContextBuilder {
    credentials: Option<Arc<dyn CredentialSource>>,
    http: Option<Arc<HttpClient>>,
    process: Option<Arc<ProcessRunner>>,
    settings: FetchSettings,
}

impl FetchContextBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self {
            credentials: None,
            http: None,
            process: None,
            settings: FetchSettings::default(),
        }
    }

    /// Sets the credential source.
    #[must_use]
    pub fn credentials(mut self, credentials: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the HTTP client.
    #[must_use]
    pub fn http(mut self, http: Arc<HttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Sets the process runner.
    #[must_use]
    pub fn process(mut self, process: Arc<ProcessRunner>) -> Self {
        self.process = Some(process);
        self
    }

    /// Sets the fetch settings.
    #[must_use]
    pub fn settings(mut self, settings: FetchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout;
        self
    }

    /// Builds the fetch context.
    pub fn build(self) -> FetchContext {
        let timeout = self.settings.timeout;
        FetchContext {
            credentials: self
                .credentials
                .unwrap_or_else(|| Arc::new(EnvCredentials::new())),
            http: self
                .http
                .unwrap_or_else(|| Arc::new(HttpClient::with_timeout(timeout))),
            process: self
                .process
                .unwrap_or_else(|| Arc::new(ProcessRunner::new().with_default_timeout(timeout))),
            settings: self.settings,
        }
    }
}

impl Default for FetchContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
