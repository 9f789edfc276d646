//! Cost command - cached daily spend and the end-of-month projection.
//!
//! Reads the per-provider daily cost cache, optionally refreshing it first
//! from the provider's billing history.

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use clap::Args;
use meterbar_core::{DailySample, ModelUsage, Projection, ProjectionConfig, ProviderKind, project};
use meterbar_providers::CopilotHistorySource;
use meterbar_store::{BackfillTask, DailyCostCache, SettingsStore};
use std::sync::Arc;
use tracing::{info, warn};

use super::usage::cost_cache;
use super::{build_context, select_providers};
use crate::output::{CostOutput, JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the cost command.
#[derive(Args)]
pub struct CostArgs {
    /// Refresh the cache from the provider's billing history first.
    #[arg(long)]
    pub backfill: bool,

    /// Maximum history pages to read during a backfill.
    #[arg(long, default_value_t = meterbar_fetch::DEFAULT_MAX_PAGES)]
    pub max_pages: u32,

    /// Show daily breakdown for the current month.
    #[arg(long)]
    pub daily: bool,
}

/// One provider's report.
#[derive(Debug)]
struct CostReport {
    provider: ProviderKind,
    projection: Option<Projection>,
    daily: Vec<DailySample>,
    models: Vec<ModelUsage>,
}

/// Builds a report from cached samples.
fn build_report(
    provider: ProviderKind,
    samples: &[DailySample],
    today: NaiveDate,
    config: &ProjectionConfig,
    daily: bool,
) -> CostReport {
    let projection = project(samples, today, config);
    let daily = if daily {
        samples
            .iter()
            .filter(|s| s.date <= today && s.date.year() == today.year() && s.date.month() == today.month())
            .copied()
            .collect()
    } else {
        Vec::new()
    };

    CostReport {
        provider,
        projection,
        daily,
        models: Vec::new(),
    }
}

/// Runs a Copilot history backfill and returns per-model totals.
async fn backfill(
    settings: &meterbar_store::Settings,
    cache: &Arc<DailyCostCache>,
    max_pages: u32,
    quiet: bool,
) -> Result<Vec<ModelUsage>> {
    let ctx = Arc::new(build_context(settings));
    let Some(source) = CopilotHistorySource::from_context(&ctx) else {
        anyhow::bail!("No Copilot credential found; set METERBAR_COPILOT_TOKEN to backfill billing history");
    };
    let source = Arc::new(source.with_max_pages(max_pages));

    let task = BackfillTask::new();
    let mut progress = task.progress();
    task.start(source, ctx, Arc::clone(cache)).await?;

    if !quiet {
        while progress.changed().await.is_ok() {
            let Some(current) = progress.borrow_and_update().clone() else {
                continue;
            };
            eprint!("\rBackfilling: {} pages, {} days", current.pages_read, current.days_written);
            if current.finished {
                break;
            }
        }
        eprintln!();
    }

    let Some(done) = task.wait().await else {
        return Ok(Vec::new());
    };
    if let Some(kind) = done.error {
        warn!(error = %kind.label(), pages = done.pages_read, "Backfill stopped early");
    }
    info!(pages = done.pages_read, days = done.days_written, "Backfill finished");
    Ok(done.models)
}

/// Runs the cost command.
pub async fn run(args: &CostArgs, cli: &Cli) -> Result<ExitCode> {
    let settings = SettingsStore::load_default().await.get().await;
    let providers = match cli.provider.as_deref() {
        Some(arg) => select_providers(Some(arg), &settings)?,
        None => vec![ProviderKind::Copilot],
    };

    info!(providers = providers.len(), backfill = args.backfill, "Running cost report");

    let cache = Arc::new(cost_cache(&settings));
    let today = Local::now().date_naive();

    let mut reports = Vec::new();
    for provider in providers {
        let models = if args.backfill && provider == ProviderKind::Copilot {
            backfill(&settings, &cache, args.max_pages, cli.quiet)
                .await
                .context("Billing history backfill failed")?
        } else {
            if args.backfill {
                warn!(provider = %provider, "No billing history source, using cached data");
            }
            Vec::new()
        };

        let samples = cache.samples(provider).await;
        let mut report = build_report(provider, &samples, today, &settings.projection, args.daily);
        report.models = models;
        reports.push(report);
    }

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            let blocks: Vec<String> = reports
                .iter()
                .map(|r| formatter.format_cost(r.provider, r.projection.as_ref(), &r.daily, &r.models, today))
                .collect();
            println!("{}", blocks.join("\n\n"));
        }
        OutputFormat::Json => {
            let outputs: Vec<CostOutput<'_>> = reports
                .iter()
                .map(|r| CostOutput {
                    provider: r.provider.cli_name(),
                    projection: r.projection.as_ref(),
                    daily: &r.daily,
                    models: &r.models,
                })
                .collect();
            println!("{}", JsonFormatter::new(cli.pretty).format(&outputs)?);
        }
    }

    if reports.iter().all(|r| r.projection.is_none()) {
        return Ok(ExitCode::ProviderMissing);
    }
    Ok(ExitCode::Success)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[tokio::test]
    async fn test_report_from_cache() {
        let dir = TempDir::new().unwrap();
        let cache = DailyCostCache::new(dir.path());
        let samples = vec![
            DailySample::new(NaiveDate::from_ymd_opt(2026, 2, 27).unwrap(), 4.0).unwrap(),
            DailySample::new(day(1), 2.0).unwrap(),
            DailySample::new(day(2), 3.0).unwrap(),
        ];
        cache.record_at(ProviderKind::Copilot, &samples, day(2)).await.unwrap();

        let cached = cache.samples(ProviderKind::Copilot).await;
        let report = build_report(ProviderKind::Copilot, &cached, day(2), &ProjectionConfig::default(), true);

        let projection = report.projection.unwrap();
        assert!((projection.current_month_total - 5.0).abs() < 1e-9);
        assert_eq!(projection.remaining_days, 30);
        // February falls outside the daily breakdown
        assert_eq!(report.daily.len(), 2);
    }

    #[tokio::test]
    async fn test_report_without_history() {
        let dir = TempDir::new().unwrap();
        let cache = DailyCostCache::new(dir.path());

        let cached = cache.samples(ProviderKind::Copilot).await;
        let report = build_report(ProviderKind::Copilot, &cached, day(10), &ProjectionConfig::default(), true);
        assert!(report.projection.is_none());
        assert!(report.daily.is_empty());
    }

    #[test]
    fn test_daily_breakdown_is_opt_in() {
        let samples = vec![DailySample::new(day(3), 1.5).unwrap()];
        let report = build_report(ProviderKind::Copilot, &samples, day(3), &ProjectionConfig::default(), false);
        assert!(report.daily.is_empty());
        assert!(report.projection.is_some());
    }
}
