//! HTTP client with tracing and domain allowlist.
//!
//! This module provides a wrapped HTTP client that adds:
//! - Request/response tracing
//! - Domain allowlist for security
//! - Bearer-token JSON helpers that classify failures as [`FetchError`]

use reqwest::{Client, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::{FetchError, HttpError};
use crate::host::credentials::Secret;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for `MeterBar`.
const USER_AGENT: &str = concat!("MeterBar/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom timeout.
    ///
    /// # Panics
    ///
    /// Panics if the TLS backend cannot be initialized, which leaves no way
    /// to perform any network operation.
    pub fn with_timeout(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| panic!("Failed to create HTTP client: {e}"));

        Self {
            inner: client,
            allowed_domains: None,
        }
    }

    /// Restricts requests to the given domains and their subdomains.
    #[must_use]
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = Some(domains);
        self
    }

    /// Checks if a URL's domain is allowed.
    fn is_domain_allowed(&self, url: &str) -> Result<(), HttpError> {
        let Some(ref allowed) = self.allowed_domains else {
            return Ok(());
        };

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let allowed = allowed
            .iter()
            .any(|domain| host == domain || host.ends_with(&format!(".{domain}")));

        if allowed {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a GET request.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request");

        let response = self.inner.get(url).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET request with a bearer token and extra headers.
    #[instrument(skip(self, token, headers), fields(url = %url))]
    pub async fn get_with_bearer(
        &self,
        url: &str,
        token: &Secret,
        headers: &[(&str, &str)],
    ) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request with bearer token");

        let mut request = self.inner.get(url).bearer_auth(token.expose());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET request with a cookie header.
    #[instrument(skip(self, cookies), fields(url = %url))]
    pub async fn get_with_cookies(&self, url: &str, cookies: &Secret) -> Result<Response, HttpError> {
        self.is_domain_allowed(url)?;
        debug!("GET request with cookies");

        let response = self
            .inner
            .get(url)
            .header(header::COOKIE, cookies.expose())
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// GETs a bearer-authenticated JSON document.
    ///
    /// # Errors
    ///
    /// Non-success statuses become [`FetchError::Status`] (or
    /// [`FetchError::RateLimited`] for 429); bodies that fail to parse become
    /// [`FetchError::Json`].
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: &Secret,
        headers: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let response = self.get_with_bearer(url, token, headers).await?;
        let response = ensure_success(response)?;
        let body = response.text().await.map_err(HttpError::from)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Returns the inner reqwest client for advanced operations.
    pub fn inner(&self) -> &Client {
        &self.inner
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns a non-success response into a classified error.
///
/// # Errors
///
/// Returns [`FetchError::RateLimited`] for 429 and [`FetchError::Status`]
/// for any other non-2xx status.
pub fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response.retry_after_secs();
        warn!(retry_after = ?retry_after, "Rate limited");
        return Err(FetchError::RateLimited { retry_after });
    }
    warn!(status = %status, "Request rejected");
    Err(FetchError::Status {
        status: status.as_u16(),
    })
}

// ============================================================================
// Response Extensions
// ============================================================================

/// Extension trait for Response handling.
pub trait ResponseExt {
    /// Get the Retry-After header value in seconds.
    fn retry_after_secs(&self) -> Option<u64>;
}

impl ResponseExt for Response {
    fn retry_after_secs(&self) -> Option<u64> {
        self.headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }
}

// ============================================================================
// Tests
// ============================================================================
