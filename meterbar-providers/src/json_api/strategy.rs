//! Bearer-token strategy for JSON usage APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, instrument};

use meterbar_core::{Candidate, ProviderKind};
use meterbar_fetch::{
    CandidatePipeline, Credential, FetchContext, FetchError, FetchKind, FetchStrategy,
};

use super::mapping::UsageMapping;

/// Reads one account's usage with one token.
pub struct TokenApiStrategy {
    id: String,
    credential: Credential,
    kind: FetchKind,
    url: String,
    mapping: &'static UsageMapping,
    headers: &'static [(&'static str, &'static str)],
    expires_at: Option<DateTime<Utc>>,
}

impl TokenApiStrategy {
    /// Creates a strategy for `credential` against `url`.
    pub fn new(
        provider: ProviderKind,
        kind: FetchKind,
        credential: Credential,
        url: impl Into<String>,
        mapping: &'static UsageMapping,
    ) -> Self {
        Self {
            id: format!("{}.{}", provider.cli_name(), kind.login_method()),
            credential,
            kind,
            url: url.into(),
            mapping,
            headers: &[],
            expires_at: None,
        }
    }

    /// Adds fixed request headers.
    #[must_use]
    pub fn with_headers(mut self, headers: &'static [(&'static str, &'static str)]) -> Self {
        self.headers = headers;
        self
    }

    /// Marks the token as unusable after `at`.
    #[must_use]
    pub fn with_expiry(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = at;
        self
    }

    /// Returns the credential this strategy reads with.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

#[async_trait]
impl FetchStrategy for TokenApiStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> FetchKind {
        self.kind
    }

    fn source_label(&self) -> String {
        self.credential.source_label.clone()
    }

    async fn is_available(&self, _ctx: &FetchContext) -> bool {
        !self.credential.token.is_empty()
    }

    #[instrument(skip(self, ctx), fields(strategy = %self.id, source = %self.credential.source_label))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<Candidate, FetchError> {
        if self.is_expired() {
            return Err(FetchError::AuthenticationFailed(format!(
                "token from {} has expired",
                self.credential.source_label
            )));
        }

        let headers: Vec<(&str, &str)> = std::iter::once(("Accept", "application/json"))
            .chain(self.headers.iter().copied())
            .collect();
        let doc: Value = ctx
            .http
            .get_json(&self.url, &self.credential.token, &headers)
            .await?;
        debug!("Usage document received");

        let mut candidate = self.mapping.candidate(
            &doc,
            self.priority(),
            &self.credential.source_label,
            self.kind.login_method(),
        )?;
        if candidate.account_id.is_none() {
            candidate.account_id.clone_from(&self.credential.account_id);
        }
        if candidate.email.is_none() {
            candidate.email.clone_from(&self.credential.email);
        }
        Ok(candidate)
    }

    fn priority(&self) -> i32 {
        self.credential
            .priority_hint
            .unwrap_or_else(|| self.kind.default_priority())
    }
}

/// Builds one [`TokenApiStrategy`] per credential the context knows for
/// `provider`.
pub fn token_pipeline(
    ctx: &FetchContext,
    provider: ProviderKind,
    kind: FetchKind,
    default_url: &str,
    mapping: &'static UsageMapping,
) -> CandidatePipeline {
    let url = ctx.endpoint(provider, default_url).to_string();
    let strategies: Vec<Box<dyn FetchStrategy>> = ctx
        .credentials
        .credentials_for(provider)
        .into_iter()
        .map(|credential| {
            Box::new(TokenApiStrategy::new(provider, kind, credential, url.clone(), mapping))
                as Box<dyn FetchStrategy>
        })
        .collect();
    CandidatePipeline::with_strategies(strategies)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_api::UsageShape;
    use meterbar_core::ErrorKind;
    use meterbar_fetch::{FetchSettings, PipelineProvider, RetryStrategy, StaticCredentials, UsageProvider};
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    static MAPPING: UsageMapping = UsageMapping::new(UsageShape::Metered {
        utilization: None,
        cost: Some("/cost"),
        budget: None,
    });

    fn ctx(credentials: StaticCredentials) -> FetchContext {
        FetchContext::builder()
            .credentials(Arc::new(credentials))
            .build()
    }

    #[test]
    fn test_one_strategy_per_credential() {
        let creds = StaticCredentials::new()
            .with(ProviderKind::Exa, Credential::new("a", "env:A"))
            .with(ProviderKind::Exa, Credential::new("b", "env:B").with_priority(99));
        let pipeline = token_pipeline(
            &ctx(creds),
            ProviderKind::Exa,
            FetchKind::ApiKey,
            "https://api.exa.ai/usage",
            &MAPPING,
        );
        assert_eq!(pipeline.len(), 2);
    }

    #[test]
    fn test_strategy_identity() {
        let strategy = TokenApiStrategy::new(
            ProviderKind::Exa,
            FetchKind::ApiKey,
            Credential::new("a", "env:METERBAR_EXA_TOKEN"),
            "https://api.exa.ai/usage",
            &MAPPING,
        );
        assert_eq!(strategy.id(), "exa.api_key");
        assert_eq!(strategy.source_label(), "env:METERBAR_EXA_TOKEN");
        assert_eq!(strategy.priority(), FetchKind::ApiKey.default_priority());
    }

    #[tokio::test]
    async fn test_expired_token_is_auth_failure() {
        let strategy = TokenApiStrategy::new(
            ProviderKind::Claude,
            FetchKind::OAuth,
            Credential::new("a", "file"),
            "https://api.anthropic.com/api/oauth/usage",
            &MAPPING,
        )
        .with_expiry(Some(Utc::now() - chrono::Duration::hours(1)));

        let err = strategy
            .fetch(&ctx(StaticCredentials::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_blank_token_is_unavailable() {
        let strategy = TokenApiStrategy::new(
            ProviderKind::Exa,
            FetchKind::ApiKey,
            Credential::new("", "env:EMPTY"),
            "https://api.exa.ai/usage",
            &MAPPING,
        );
        assert!(!strategy.is_available(&ctx(StaticCredentials::new())).await);
    }

    fn exa_pipeline(ctx: &FetchContext) -> CandidatePipeline {
        token_pipeline(ctx, ProviderKind::Exa, FetchKind::ApiKey, "https://api.exa.ai/usage", &MAPPING)
    }

    fn served_by(server: &MockServer) -> FetchContext {
        let creds = StaticCredentials::new().with(ProviderKind::Exa, Credential::new("tok", "env:METERBAR_EXA_TOKEN"));
        let settings = FetchSettings::default()
            .with_retry(RetryStrategy::no_retry())
            .with_endpoint(ProviderKind::Exa, format!("{}/usage", server.uri()));
        FetchContext::builder()
            .credentials(Arc::new(creds))
            .settings(settings)
            .build()
    }

    #[tokio::test]
    async fn test_server_error_is_network_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/usage"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = PipelineProvider::new(ProviderKind::Exa, exa_pipeline);
        let err = provider.fetch(&served_by(&server)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("env:METERBAR_EXA_TOKEN"), "{err}");
    }

    #[tokio::test]
    async fn test_rejected_token_is_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/usage"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let provider = PipelineProvider::new(ProviderKind::Exa, exa_pipeline);
        let err = provider.fetch(&served_by(&server)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[tokio::test]
    async fn test_reads_usage_document() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/usage"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "cost": 12.5 })))
            .mount(&server)
            .await;

        let provider = PipelineProvider::new(ProviderKind::Exa, exa_pipeline);
        let result = provider.fetch(&served_by(&server)).await.unwrap();
        assert_eq!(result.aggregate_usage.cost(), Some(12.5));
    }
}
