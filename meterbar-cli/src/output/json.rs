//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, Utc};
use meterbar_core::{DailySample, ErrorKind, ModelUsage, Projection, ProviderKind, ProviderResult};
use meterbar_providers::ProviderDescriptor;
use meterbar_store::DisplayState;
use serde::Serialize;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a single provider.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOutput<'a> {
    pub provider: &'static str,
    /// One of `ok`, `stale`, `failed`, `no_data`.
    pub state: &'static str,
    pub confirmed_zero: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<&'a ProviderResult>,
}

impl<'a> ProviderOutput<'a> {
    /// Builds the output for one display state.
    pub fn from_state(provider: ProviderKind, state: &'a DisplayState) -> Self {
        let (label, error) = match state {
            DisplayState::NoData => ("no_data", None),
            DisplayState::Failed { kind, .. } => ("failed", Some(*kind)),
            DisplayState::Loaded { stale: true, .. } => ("stale", None),
            DisplayState::Loaded { stale: false, .. } => ("ok", None),
        };
        Self {
            provider: provider.cli_name(),
            state: label,
            confirmed_zero: state.is_confirmed_zero(),
            error,
            result: state.result().map(|r| &**r),
        }
    }
}

/// Cost report output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostOutput<'a> {
    pub provider: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<&'a Projection>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub daily: &'a [DailySample],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub models: &'a [ModelUsage],
}

/// Provider info output.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfoOutput {
    pub id: &'static str,
    pub display_name: &'static str,
    pub enabled: bool,
    pub default_enabled: bool,
    pub aliases: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_url: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<&'static str>,
}

impl ProviderInfoOutput {
    /// Builds the output for a descriptor.
    pub fn new(desc: &ProviderDescriptor, enabled: bool) -> Self {
        Self {
            id: desc.cli_name(),
            display_name: desc.display_name(),
            enabled,
            default_enabled: desc.metadata.default_enabled,
            aliases: desc.cli.aliases,
            dashboard_url: desc.metadata.dashboard_url,
            endpoint: desc.metadata.endpoint,
        }
    }
}

/// One watch tick.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickOutput<'a> {
    pub cycle_id: u64,
    pub refreshed_at: DateTime<Utc>,
    pub providers: Vec<ProviderOutput<'a>>,
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize + ?Sized>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats display states as an array, in the given order.
    pub fn format_states(&self, states: &[(ProviderKind, DisplayState)]) -> Result<String> {
        let outputs: Vec<ProviderOutput<'_>> = states
            .iter()
            .map(|(provider, state)| ProviderOutput::from_state(*provider, state))
            .collect();
        self.format(&outputs)
    }
}
