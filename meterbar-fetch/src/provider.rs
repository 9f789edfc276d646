//! The provider contract.
//!
//! To the orchestrator a provider is a single operation: `fetch` returns a
//! [`ProviderResult`] or fails with an error that classifies onto
//! [`ErrorKind`](meterbar_core::ErrorKind). Whatever happens inside (several
//! credential sources, retries, subprocesses) stays inside.

use async_trait::async_trait;
use std::fmt;
use tracing::{debug, instrument};

use meterbar_core::{Candidate, ProviderKind, ProviderResult, ReconcileRules, reconcile_candidates};

use crate::context::FetchContext;
use crate::error::FetchError;
use crate::pipeline::CandidatePipeline;

// ============================================================================
// Usage Provider Trait
// ============================================================================

/// One metered service.
#[async_trait]
pub trait UsageProvider: Send + Sync {
    /// Which service this is.
    fn kind(&self) -> ProviderKind;

    /// Fetches and reconciles every account reachable through `ctx`.
    async fn fetch(&self, ctx: &FetchContext) -> Result<ProviderResult, FetchError>;
}

// ============================================================================
// Pipeline Provider
// ============================================================================

/// Builds a provider's strategies for the credentials visible in a context.
pub type PipelineBuilder = fn(&FetchContext) -> CandidatePipeline;

/// A provider backed by a candidate pipeline and reconciliation rules.
///
/// The pipeline is rebuilt on every fetch so that credentials added or
/// removed since the last cycle are picked up.
#[derive(Clone, Copy)]
pub struct PipelineProvider {
    kind: ProviderKind,
    build: PipelineBuilder,
    rules: ReconcileRules<Candidate>,
}

impl PipelineProvider {
    /// Creates a provider with the default candidate rules.
    pub fn new(kind: ProviderKind, build: PipelineBuilder) -> Self {
        Self {
            kind,
            build,
            rules: ReconcileRules::default(),
        }
    }

    /// Replaces the reconciliation rules.
    #[must_use]
    pub fn with_rules(mut self, rules: ReconcileRules<Candidate>) -> Self {
        self.rules = rules;
        self
    }

    /// Builds the pipeline for a context without running it.
    pub fn pipeline(&self, ctx: &FetchContext) -> CandidatePipeline {
        (self.build)(ctx)
    }
}

impl fmt::Debug for PipelineProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineProvider")
            .field("kind", &self.kind)
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl UsageProvider for PipelineProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    #[instrument(skip(self, ctx), fields(provider = %self.kind))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<ProviderResult, FetchError> {
        let pipeline = self.pipeline(ctx);
        if pipeline.is_empty() {
            return Err(FetchError::MissingCredentials(format!(
                "no credential source configured for {}",
                self.kind
            )));
        }

        let outcome = pipeline.collect(ctx).await;
        let accounts = reconcile_candidates(outcome.candidates, self.rules)?;
        debug!(accounts = accounts.len(), "Provider reconciled");

        Ok(ProviderResult::from_accounts(self.kind, accounts)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FetchSettings;
    use crate::retry::RetryStrategy;
    use crate::strategy::{FetchKind, FetchStrategy};
    use meterbar_core::{ErrorKind, UsageModel};

    struct Fixed {
        label: &'static str,
        account: &'static str,
        priority: i32,
        remaining: Option<f64>,
    }

    #[async_trait]
    impl FetchStrategy for Fixed {
        fn id(&self) -> &str {
            self.label
        }

        fn kind(&self) -> FetchKind {
            FetchKind::ApiKey
        }

        async fn is_available(&self, _ctx: &FetchContext) -> bool {
            true
        }

        async fn fetch(&self, _ctx: &FetchContext) -> Result<Candidate, FetchError> {
            let remaining = self
                .remaining
                .ok_or_else(|| FetchError::AuthenticationFailed("revoked".into()))?;
            Ok(Candidate::new(UsageModel::quota(remaining, 100.0, false)?, self.priority, self.label)
                .with_account_id(self.account))
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    struct Failing {
        label: &'static str,
        priority: i32,
        error: fn() -> FetchError,
    }

    #[async_trait]
    impl FetchStrategy for Failing {
        fn id(&self) -> &str {
            self.label
        }

        fn kind(&self) -> FetchKind {
            FetchKind::ApiKey
        }

        async fn is_available(&self, _ctx: &FetchContext) -> bool {
            true
        }

        async fn fetch(&self, _ctx: &FetchContext) -> Result<Candidate, FetchError> {
            Err((self.error)())
        }

        fn priority(&self) -> i32 {
            self.priority
        }
    }

    fn truncated_blob() -> FetchError {
        // field 1, declared length 5, one byte present
        match meterbar_core::wire::decode(&[0x0a, 0x05, 0x01]) {
            Err(e) => FetchError::Wire(e),
            Ok(_) => FetchError::Other("blob decoded".into()),
        }
    }

    fn unavailable() -> FetchError {
        FetchError::Status { status: 503 }
    }

    fn revoked() -> FetchError {
        FetchError::AuthenticationFailed("revoked".into())
    }

    fn ctx() -> FetchContext {
        FetchContext::builder()
            .settings(FetchSettings::default().with_retry(RetryStrategy::no_retry()))
            .build()
    }

    fn two_sources(_ctx: &FetchContext) -> CandidatePipeline {
        CandidatePipeline::with_strategies(vec![
            Box::new(Fixed { label: "env", account: "A", priority: 1, remaining: Some(50.0) }),
            Box::new(Fixed { label: "oauth", account: "A", priority: 2, remaining: Some(70.0) }),
        ])
    }

    fn all_revoked(_ctx: &FetchContext) -> CandidatePipeline {
        CandidatePipeline::with_strategies(vec![
            Box::new(Fixed { label: "env", account: "A", priority: 1, remaining: None }),
            Box::new(Fixed { label: "oauth", account: "B", priority: 2, remaining: None }),
        ])
    }

    fn corrupt_cache(_ctx: &FetchContext) -> CandidatePipeline {
        CandidatePipeline::with_strategies(vec![Box::new(Failing {
            label: "local:cache",
            priority: 1,
            error: truncated_blob,
        })])
    }

    fn server_down(_ctx: &FetchContext) -> CandidatePipeline {
        CandidatePipeline::with_strategies(vec![Box::new(Failing {
            label: "api",
            priority: 1,
            error: unavailable,
        })])
    }

    fn revoked_then_down(_ctx: &FetchContext) -> CandidatePipeline {
        CandidatePipeline::with_strategies(vec![
            Box::new(Failing { label: "oauth", priority: 2, error: revoked }),
            Box::new(Failing { label: "api", priority: 1, error: unavailable }),
        ])
    }

    fn nothing(_ctx: &FetchContext) -> CandidatePipeline {
        CandidatePipeline::new()
    }

    #[tokio::test]
    async fn test_reconciles_same_account() {
        let provider = PipelineProvider::new(ProviderKind::Zai, two_sources);
        let result = provider.fetch(&ctx()).await.unwrap();

        assert_eq!(result.account_count(), 1);
        assert_eq!(result.aggregate_usage.used_percent(), Some(30.0));
        assert_eq!(result.primary().source_labels, vec!["oauth", "env"]);
    }

    #[tokio::test]
    async fn test_all_sources_failed_is_auth_failure() {
        let provider = PipelineProvider::new(ProviderKind::Zai, all_revoked);
        let err = provider.fetch(&ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[tokio::test]
    async fn test_no_sources_is_auth_failure() {
        let provider = PipelineProvider::new(ProviderKind::Zai, nothing);
        let err = provider.fetch(&ctx()).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingCredentials(_)));
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[tokio::test]
    async fn test_truncated_blob_is_decoding_failure() {
        let provider = PipelineProvider::new(ProviderKind::Windsurf, corrupt_cache);
        let err = provider.fetch(&ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);

        let message = err.to_string();
        assert!(message.contains("local:cache"), "{message}");
        assert!(message.contains("malformed input at"), "{message}");
    }

    #[tokio::test]
    async fn test_server_error_is_network_failure() {
        let provider = PipelineProvider::new(ProviderKind::Zai, server_down);
        let err = provider.fetch(&ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("503"), "{err}");
    }

    #[tokio::test]
    async fn test_mixed_failures_report_non_credential_kind() {
        let provider = PipelineProvider::new(ProviderKind::Zai, revoked_then_down);
        let err = provider.fetch(&ctx()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }
}
