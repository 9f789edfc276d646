//! GitHub Copilot provider.
//!
//! Premium-request usage is only visible on GitHub's billing pages, so every
//! credential is a browser cookie header. Each one yields the current
//! period's usage card; the same session also pages through the per-day
//! usage table for cost history.

mod billing;
mod client;
mod error;

use async_trait::async_trait;
use tracing::instrument;

use meterbar_core::{Candidate, ProviderKind};
use meterbar_fetch::{
    CandidatePipeline, Credential, FetchContext, FetchError, FetchKind, FetchStrategy, HistoryPage,
    HistorySource,
};

use crate::descriptor::ProviderDescriptor;

pub use billing::{
    UsageCard, find_customer_id, login_from_cookies, parse_table_date, parse_usage_table,
};
pub use client::BillingClient;
pub use error::CopilotError;

/// Default GitHub base URL.
pub const GITHUB_URL: &str = "https://github.com";

// ============================================================================
// Strategy
// ============================================================================

/// Reads the usage card with one session cookie.
#[derive(Debug)]
pub struct CopilotWebStrategy {
    credential: Credential,
    client: BillingClient,
}

impl CopilotWebStrategy {
    /// Creates a strategy for `credential` against `base_url`.
    pub fn new(credential: Credential, base_url: &str) -> Self {
        let client = BillingClient::new(base_url, credential.token.clone());
        Self { credential, client }
    }
}

#[async_trait]
impl FetchStrategy for CopilotWebStrategy {
    fn id(&self) -> &str {
        "copilot.web_session"
    }

    fn kind(&self) -> FetchKind {
        FetchKind::WebSession
    }

    fn source_label(&self) -> String {
        self.credential.source_label.clone()
    }

    async fn is_available(&self, _ctx: &FetchContext) -> bool {
        !self.credential.token.is_empty()
    }

    #[instrument(skip(self, ctx), fields(source = %self.credential.source_label))]
    async fn fetch(&self, ctx: &FetchContext) -> Result<Candidate, FetchError> {
        let card = self.client.usage_card(ctx).await?;
        let mut candidate = card.candidate(self.priority(), &self.credential.source_label)?;
        candidate.account_id = self
            .credential
            .account_id
            .clone()
            .or_else(|| login_from_cookies(self.credential.token.expose()));
        candidate.email.clone_from(&self.credential.email);
        Ok(candidate)
    }

    fn priority(&self) -> i32 {
        self.credential
            .priority_hint
            .unwrap_or_else(|| self.kind().default_priority())
    }
}

// ============================================================================
// History
// ============================================================================

/// Pages through the per-day usage table.
#[derive(Debug)]
pub struct CopilotHistorySource {
    client: BillingClient,
    max_pages: u32,
}

impl CopilotHistorySource {
    /// Creates a history source for `credential` against `base_url`.
    pub fn new(credential: &Credential, base_url: &str) -> Self {
        Self {
            client: BillingClient::new(base_url, credential.token.clone()),
            max_pages: meterbar_fetch::DEFAULT_MAX_PAGES,
        }
    }

    /// Creates a history source for the first Copilot credential in `ctx`.
    pub fn from_context(ctx: &FetchContext) -> Option<Self> {
        let credential = ctx.credentials.credentials_for(ProviderKind::Copilot).into_iter().next()?;
        Some(Self::new(&credential, ctx.endpoint(ProviderKind::Copilot, GITHUB_URL)))
    }

    /// Sets the page limit.
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }
}

#[async_trait]
impl HistorySource for CopilotHistorySource {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Copilot
    }

    async fn fetch_page(&self, ctx: &FetchContext, page: u32) -> Result<HistoryPage, FetchError> {
        self.client.usage_table(ctx, page).await
    }

    fn max_pages(&self) -> u32 {
        self.max_pages
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// Builds one web-session strategy per cookie credential.
pub fn build_copilot_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    let base_url = ctx.endpoint(ProviderKind::Copilot, GITHUB_URL);
    let strategies: Vec<Box<dyn FetchStrategy>> = ctx
        .credentials
        .credentials_for(ProviderKind::Copilot)
        .into_iter()
        .map(|credential| Box::new(CopilotWebStrategy::new(credential, base_url)) as Box<dyn FetchStrategy>)
        .collect();
    CandidatePipeline::with_strategies(strategies)
}

/// Copilot descriptor.
pub fn copilot_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Copilot)
        .dashboard("https://github.com/settings/billing")
        .enabled_by_default()
        .endpoint(GITHUB_URL, &["github.com"])
        .pipeline(&[FetchKind::WebSession], build_copilot_pipeline)
        .aliases(&["github"])
        .build()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use meterbar_fetch::StaticCredentials;
    use std::sync::Arc;

    fn context() -> FetchContext {
        let creds = StaticCredentials::new()
            .with(
                ProviderKind::Copilot,
                Credential::new("user_session=a; dotcom_user=octocat", "env:METERBAR_COPILOT_TOKEN"),
            )
            .with(
                ProviderKind::Copilot,
                Credential::new("user_session=b", "env:METERBAR_COPILOT_TOKEN_1"),
            );
        FetchContext::builder().credentials(Arc::new(creds)).build()
    }

    #[test]
    fn test_pipeline_per_cookie() {
        assert_eq!(build_copilot_pipeline(&context()).len(), 2);
    }

    #[test]
    fn test_history_source_from_context() {
        let source = CopilotHistorySource::from_context(&context()).unwrap().with_max_pages(3);
        assert_eq!(source.provider(), ProviderKind::Copilot);
        assert_eq!(source.max_pages(), 3);

        assert!(CopilotHistorySource::from_context(&FetchContext::builder()
            .credentials(Arc::new(StaticCredentials::new()))
            .build())
        .is_none());
    }

    #[test]
    fn test_strategy_identity() {
        let strategy = CopilotWebStrategy::new(Credential::new("c=1", "manual").with_priority(55), GITHUB_URL);
        assert_eq!(strategy.kind(), FetchKind::WebSession);
        assert_eq!(strategy.source_label(), "manual");
        assert_eq!(strategy.priority(), 55);
    }

    #[test]
    fn test_descriptor() {
        let desc = copilot_descriptor();
        assert_eq!(desc.cli_name(), "copilot");
        assert_eq!(desc.metadata.domains, &["github.com"]);
    }
}
