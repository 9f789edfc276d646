//! Watch command - refresh on a cadence and keep last good values on screen.

use anyhow::Result;
use clap::Args;
use meterbar_store::{RefreshCadence, SettingsStore, UsageStore};
use std::io::{Write, stdout};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{info, warn};

use super::select_providers;
use super::usage::{cost_cache, orchestrator_for, record_daily_costs, run_cycle};
use crate::output::{JsonFormatter, ProviderOutput, TextFormatter, TickOutput};
use crate::{Cli, ExitCode, OutputFormat};

/// Lower bound on the refresh interval, in seconds.
const MIN_INTERVAL_SECS: u64 = 10;

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds (defaults to the configured cadence).
    #[arg(long, short)]
    pub interval: Option<u64>,
}

/// Picks the refresh interval: the flag, else the configured cadence.
fn refresh_interval(flag: Option<u64>, cadence: RefreshCadence) -> Option<Duration> {
    let interval = match flag {
        Some(secs) => Duration::from_secs(secs),
        None => cadence.as_duration()?,
    };
    Some(interval.max(Duration::from_secs(MIN_INTERVAL_SECS)))
}

/// Drives `work` to completion unless `interrupt` resolves first.
async fn until_interrupted<T, I>(work: impl Future<Output = T>, interrupt: &mut I) -> Option<T>
where
    I: Future + Unpin,
{
    tokio::select! {
        value = work => Some(value),
        _ = interrupt => None,
    }
}

/// Runs the watch command.
pub async fn run(args: &WatchArgs, cli: &Cli) -> Result<ExitCode> {
    let settings = SettingsStore::load_default().await.get().await;
    let providers = select_providers(cli.provider.as_deref(), &settings)?;
    let Some(period) = refresh_interval(args.interval, settings.refresh_cadence) else {
        anyhow::bail!("Refresh cadence is manual; pass --interval or run `meterbar config refresh 5m`");
    };

    info!(interval = ?period, providers = providers.len(), "Starting watch mode");

    let orchestrator = orchestrator_for(&settings);
    let store = UsageStore::new();
    let costs = cost_cache(&settings);
    let text = TextFormatter::new(!cli.no_color);
    let json = JsonFormatter::new(cli.pretty);

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        if until_interrupted(ticker.tick(), &mut interrupt).await.is_none() {
            info!("Interrupted, leaving watch mode");
            return Ok(ExitCode::Success);
        }
        let Some(cycle) = until_interrupted(run_cycle(&orchestrator, &providers), &mut interrupt).await else {
            info!("Interrupted during refresh, leaving watch mode");
            return Ok(ExitCode::Success);
        };
        match cycle {
            Ok(cycle) => {
                store.apply(&cycle).await;
                record_daily_costs(&costs, &cycle, chrono::Local::now().date_naive()).await;
            }
            Err(e) => warn!(error = %e, "Skipping tick"),
        }
        let states = store.display_states(&providers).await;
        let now = chrono::Local::now();

        match cli.format {
            OutputFormat::Text => {
                print!("\x1b[2J\x1b[H");
                println!(
                    "{} - {} (refresh: {}s)",
                    text.bold("MeterBar"),
                    now.format("%H:%M:%S"),
                    period.as_secs()
                );
                println!("{}", "─".repeat(50));
                println!();
                println!("{}", text.format_summary(&states));
                println!();
                println!("{}", text.dim("Press Ctrl+C to exit"));
            }
            OutputFormat::Json => {
                let tick = TickOutput {
                    cycle_id: store.last_cycle().await.unwrap_or_default(),
                    refreshed_at: now.to_utc(),
                    providers: states
                        .iter()
                        .map(|(provider, state)| ProviderOutput::from_state(*provider, state))
                        .collect(),
                };
                println!("{}", json.format(&tick)?);
            }
        }
        stdout().flush()?;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_from_cadence() {
        assert_eq!(
            refresh_interval(None, RefreshCadence::FiveMinutes),
            Some(Duration::from_secs(300))
        );
        assert_eq!(refresh_interval(None, RefreshCadence::Manual), None);
    }

    #[test]
    fn test_interval_flag_wins_and_is_clamped() {
        assert_eq!(
            refresh_interval(Some(90), RefreshCadence::Manual),
            Some(Duration::from_secs(90))
        );
        assert_eq!(
            refresh_interval(Some(1), RefreshCadence::OneMinute),
            Some(Duration::from_secs(MIN_INTERVAL_SECS))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_cancels_slow_refresh() {
        let mut interrupt = Box::pin(tokio::time::sleep(Duration::from_secs(1)));
        let slow = async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            "cycle"
        };
        assert_eq!(until_interrupted(slow, &mut interrupt).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_work_finishing_first_is_kept() {
        let mut interrupt = Box::pin(tokio::time::sleep(Duration::from_secs(3600)));
        let quick = async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            "cycle"
        };
        assert_eq!(until_interrupted(quick, &mut interrupt).await, Some("cycle"));
    }
}
