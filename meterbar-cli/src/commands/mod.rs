//! CLI command implementations.

pub mod config;
pub mod cost;
pub mod decode;
pub mod providers;
pub mod usage;
pub mod watch;

use anyhow::Result;
use meterbar_core::ProviderKind;
use meterbar_fetch::{EnvCredentials, FetchContext, HttpClient, ProcessRunner};
use meterbar_providers::ProviderRegistry;
use meterbar_store::Settings;
use std::sync::Arc;
use tracing::debug;

/// Resolves the providers for this run.
///
/// `None` means the enabled set from settings; `"all"` and `"default"` pick
/// every known provider or the built-in defaults; anything else is a
/// comma-separated list of CLI names or aliases.
pub fn select_providers(arg: Option<&str>, settings: &Settings) -> Result<Vec<ProviderKind>> {
    let Some(arg) = arg else {
        return Ok(settings.effective_enabled());
    };

    match arg.trim().to_lowercase().as_str() {
        "all" => Ok(ProviderRegistry::kinds()),
        "default" => Ok(ProviderRegistry::default_enabled().iter().map(|d| d.id).collect()),
        names => {
            let mut providers = Vec::new();
            for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let Some(desc) = ProviderRegistry::get_by_cli_name(name) else {
                    anyhow::bail!("Unknown provider: {name}");
                };
                if !providers.contains(&desc.id) {
                    providers.push(desc.id);
                }
            }
            if providers.is_empty() {
                anyhow::bail!("No valid providers specified");
            }
            Ok(providers)
        }
    }
}

/// Domains the HTTP client may reach: every descriptor's domains plus the
/// hosts of configured endpoint overrides.
fn allowed_domains(settings: &Settings) -> Vec<String> {
    let mut domains = ProviderRegistry::allowed_domains();
    for overrides in settings.provider_settings.values() {
        let Some(endpoint) = &overrides.endpoint else {
            continue;
        };
        if let Some(host) = url::Url::parse(endpoint).ok().and_then(|u| u.host_str().map(str::to_string)) {
            if !domains.contains(&host) {
                domains.push(host);
            }
        }
    }
    domains
}

/// Builds the fetch context from settings and the environment.
pub fn build_context(settings: &Settings) -> FetchContext {
    let fetch = settings.fetch_settings();
    let domains = allowed_domains(settings);
    debug!(domains = domains.len(), timeout = ?fetch.timeout, "Building fetch context");

    let http = HttpClient::with_timeout(fetch.timeout).with_allowed_domains(domains);
    FetchContext::builder()
        .credentials(Arc::new(EnvCredentials::new()))
        .http(Arc::new(http))
        .process(Arc::new(ProcessRunner::new().with_default_timeout(fetch.timeout)))
        .settings(fetch)
        .build()
}

// ============================================================================
// Tests
// ============================================================================
