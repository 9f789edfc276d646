//! Claude (Anthropic) provider.
//!
//! Claude is the multi-account OAuth family: every OAuth token the host
//! hands in becomes one strategy, and the CLI's own credentials file adds
//! one more. Two tokens for the same account (say, the file and an
//! exported copy) reconcile into one entry.
//!
//! All strategies call the OAuth usage endpoint, which reports the rolling
//! five-hour window as a utilization percentage.

mod error;
mod oauth;

use meterbar_core::ProviderKind;
use meterbar_fetch::{CandidatePipeline, Credential, FetchContext, FetchKind, FetchStrategy};
use tracing::debug;

use crate::descriptor::ProviderDescriptor;
use crate::json_api::{TokenApiStrategy, UsageMapping, UsageShape};

pub use error::ClaudeError;
pub use oauth::{ClaudeOAuthCredentials, FILE_SOURCE_LABEL, REQUIRED_SCOPE, credentials_file_path};

/// OAuth usage endpoint.
pub const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

const OAUTH_HEADERS: &[(&str, &str)] = &[("anthropic-beta", "oauth-2025-04-20")];

static USAGE_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Percent {
    used_percent: "/five_hour/utilization",
})
.resets_at("/five_hour/resets_at")
.identity("/account/uuid", "/account/email_address")
.plan("/account/plan")
.organization("/organization/name");

/// Builds one OAuth strategy per host credential plus the CLI's file.
pub fn build_claude_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    let url = ctx.endpoint(ProviderKind::Claude, USAGE_URL).to_string();
    let oauth = |credential: Credential| {
        TokenApiStrategy::new(ProviderKind::Claude, FetchKind::OAuth, credential, url.clone(), &USAGE_MAPPING)
            .with_headers(OAUTH_HEADERS)
    };

    let mut strategies: Vec<Box<dyn FetchStrategy>> = ctx
        .credentials
        .credentials_for(ProviderKind::Claude)
        .into_iter()
        .map(|credential| Box::new(oauth(credential)) as Box<dyn FetchStrategy>)
        .collect();

    if let Some(file) = ClaudeOAuthCredentials::load() {
        debug!(expired = file.is_expired(), "Using Claude credentials file");
        strategies.push(Box::new(oauth(file.credential).with_expiry(file.expires_at)));
    }

    CandidatePipeline::with_strategies(strategies)
}

/// Claude descriptor.
pub fn claude_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Claude)
        .dashboard("https://claude.ai/settings/usage")
        .enabled_by_default()
        .endpoint(USAGE_URL, &["anthropic.com", "claude.ai"])
        .pipeline(&[FetchKind::OAuth], build_claude_pipeline)
        .aliases(&["anthropic"])
        .build()
}

// ============================================================================
// Tests
// ============================================================================
