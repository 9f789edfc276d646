//! Usage command - run one fetch cycle and display every provider.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use meterbar_core::{DailySample, FetchResult, ProviderKind};
use meterbar_fetch::FetchOrchestrator;
use meterbar_providers::ProviderRegistry;
use meterbar_store::{DailyCostCache, DisplayState, Settings, SettingsStore, UsageStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{build_context, select_providers};
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Orchestrator scope used by CLI-triggered cycles.
pub const CLI_SCOPE: &str = "cli";

/// Runs the usage command.
pub async fn run(cli: &Cli) -> Result<ExitCode> {
    let settings = SettingsStore::load_default().await.get().await;
    let providers = select_providers(cli.provider.as_deref(), &settings)?;
    if providers.is_empty() {
        anyhow::bail!("No providers enabled; use --provider or `meterbar config enable <name>`");
    }

    info!(providers = ?providers, "Fetching usage");

    let orchestrator = orchestrator_for(&settings);
    let cycle = run_cycle(&orchestrator, &providers).await?;

    let store = UsageStore::new();
    store.apply(&cycle).await;
    record_daily_costs(&cost_cache(&settings), &cycle, Local::now().date_naive()).await;
    let states = store.display_states(&providers).await;

    print_states(&states, cli)?;

    Ok(exit_code(&states))
}

/// Builds an orchestrator configured from settings.
pub fn orchestrator_for(settings: &Settings) -> FetchOrchestrator {
    FetchOrchestrator::new(Arc::new(build_context(settings))).with_config(settings.orchestrator_config())
}

/// Runs one cycle over the given providers.
pub async fn run_cycle(orchestrator: &FetchOrchestrator, providers: &[ProviderKind]) -> Result<FetchResult> {
    orchestrator
        .run_cycle(CLI_SCOPE, ProviderRegistry::providers_for(providers))
        .await
        .context("A fetch cycle is already running")
}

/// Opens the cost history cache with the configured retention.
pub fn cost_cache(settings: &Settings) -> DailyCostCache {
    DailyCostCache::default_location().with_retention_days(settings.history_retention_days)
}

/// Stores each metered provider's spend from `cycle` as the sample for `today`.
///
/// Write failures are logged; they never fail the cycle.
pub async fn record_daily_costs(cache: &DailyCostCache, cycle: &FetchResult, today: NaiveDate) {
    for (provider, result) in &cycle.results {
        let Some(cost) = result.aggregate_usage.cost() else {
            continue;
        };
        let sample = match DailySample::new(today, cost) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(provider = %provider, error = %e, "Skipping cost sample");
                continue;
            }
        };
        match cache.record_at(*provider, &[sample], today).await {
            Ok(_) => debug!(provider = %provider, cost, "Recorded daily cost"),
            Err(e) => warn!(provider = %provider, error = %e, "Failed to record daily cost"),
        }
    }
}

fn print_states(states: &[(ProviderKind, DisplayState)], cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let blocks: Vec<String> = states
                .iter()
                .map(|(provider, state)| formatter.format_state(*provider, state))
                .collect();
            println!("{}", blocks.join("\n\n"));
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format_states(states)?);
        }
    }
    Ok(())
}

/// Succeeds when at least one provider has a result to show.
fn exit_code(states: &[(ProviderKind, DisplayState)]) -> ExitCode {
    if states.iter().any(|(_, state)| state.result().is_some()) {
        ExitCode::Success
    } else {
        ExitCode::ProviderMissing
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use meterbar_core::{Candidate, ErrorKind, ProviderResult, UsageModel};

    #[test]
    fn test_exit_code_requires_a_result() {
        let failed = vec![(
            ProviderKind::Claude,
            DisplayState::Failed {
                kind: ErrorKind::AuthenticationFailed,
                stale: None,
            },
        )];
        assert!(matches!(exit_code(&failed), ExitCode::ProviderMissing));
        assert!(matches!(exit_code(&[]), ExitCode::ProviderMissing));

        let usage = UsageModel::quota(1.0, 2.0, false).unwrap();
        let result = ProviderResult::from_accounts(ProviderKind::Kiro, vec![Candidate::new(usage, 70, "cli")]).unwrap();
        let mixed = vec![
            failed[0].clone(),
            (
                ProviderKind::Kiro,
                DisplayState::Loaded {
                    result: Arc::new(result),
                    stale: false,
                },
            ),
        ];
        assert!(matches!(exit_code(&mixed), ExitCode::Success));
    }

    #[tokio::test]
    async fn test_metered_results_recorded_as_today() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DailyCostCache::new(dir.path());
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let mut cycle = FetchResult::new(1);
        let metered = UsageModel::pay_as_you_go(40.0, Some(3.25)).unwrap();
        cycle.record_success(
            ProviderResult::from_accounts(ProviderKind::Cursor, vec![Candidate::new(metered, 60, "cookie")]).unwrap(),
        );
        let quota = UsageModel::quota(10.0, 50.0, false).unwrap();
        cycle.record_success(
            ProviderResult::from_accounts(ProviderKind::Kiro, vec![Candidate::new(quota, 70, "cli")]).unwrap(),
        );

        record_daily_costs(&cache, &cycle, today).await;
        assert_eq!(cache.samples(ProviderKind::Cursor).await, vec![DailySample::new(today, 3.25).unwrap()]);
        assert!(cache.samples(ProviderKind::Kiro).await.is_empty());

        // a later cycle the same day replaces the sample
        let mut later = FetchResult::new(2);
        let metered = UsageModel::pay_as_you_go(45.0, Some(4.0)).unwrap();
        later.record_success(
            ProviderResult::from_accounts(ProviderKind::Cursor, vec![Candidate::new(metered, 60, "cookie")]).unwrap(),
        );
        record_daily_costs(&cache, &later, today).await;
        assert_eq!(cache.samples(ProviderKind::Cursor).await, vec![DailySample::new(today, 4.0).unwrap()]);
    }

    #[tokio::test]
    async fn test_cycle_reports_every_selected_provider() {
        let settings = Settings {
            provider_timeout_secs: 5,
            cycle_deadline_secs: 10,
            ..Settings::default()
        };

        // Windsurf only reads a local cache file, so the cycle stays offline.
        let orchestrator = orchestrator_for(&settings);
        let cycle = run_cycle(&orchestrator, &[ProviderKind::Windsurf]).await.unwrap();

        assert!(cycle.is_finished());
        assert_eq!(cycle.results.len() + cycle.errors.len() + cycle.pending.len(), 1);
        assert!(!orchestrator.is_in_flight(CLI_SCOPE));
    }
}
