//! Daily cost cache.
//!
//! One JSON file per provider (`cost_history/<cli_name>.json`) mapping
//! dates to the cost seen that day. Every write is a
//! load-upsert-prune-save cycle behind a single async mutex, so a periodic
//! refresh and a manual backfill never interleave on the same file.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use meterbar_core::{DailySample, ProviderKind};

use crate::error::StoreError;
use crate::persistence::{default_cost_history_dir, load_json_or_default, save_json};
use crate::settings_store::DEFAULT_HISTORY_RETENTION_DAYS;

/// One persisted day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    /// Cost on that day.
    pub cost: f64,
    /// Running total since the 1st of that day's month.
    pub cumulative_cost: f64,
    /// When the value was written.
    pub fetched_at: DateTime<Utc>,
}

/// A provider's persisted history, keyed by date.
pub type CostHistory = BTreeMap<NaiveDate, CostEntry>;

/// Bounded per-provider daily cost store.
#[derive(Debug)]
pub struct DailyCostCache {
    dir: PathBuf,
    retention_days: u32,
    lock: Mutex<()>,
}

impl DailyCostCache {
    /// Creates a cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
            lock: Mutex::new(()),
        }
    }

    /// Creates a cache in the default cache directory.
    pub fn default_location() -> Self {
        Self::new(default_cost_history_dir())
    }

    /// Sets how many days are kept.
    #[must_use]
    pub fn with_retention_days(mut self, days: u32) -> Self {
        self.retention_days = days.max(1);
        self
    }

    /// Days kept on every save.
    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    fn path(&self, kind: ProviderKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.cli_name()))
    }

    /// Records samples, using the local date as "today" for pruning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn record(&self, kind: ProviderKind, samples: &[DailySample]) -> Result<usize, StoreError> {
        self.record_at(kind, samples, Local::now().date_naive()).await
    }

    /// Upserts samples, prunes days older than the retention window ending
    /// at `today`, recomputes monthly running totals and saves.
    ///
    /// Returns the number of days now stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    #[instrument(skip(self, samples), fields(provider = %kind, samples = samples.len()))]
    pub async fn record_at(
        &self,
        kind: ProviderKind,
        samples: &[DailySample],
        today: NaiveDate,
    ) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().await;
        let path = self.path(kind);

        let mut history: CostHistory = load_json_or_default(&path).await;
        let now = Utc::now();
        for sample in samples {
            history.insert(
                sample.date,
                CostEntry {
                    cost: sample.cost,
                    cumulative_cost: 0.0,
                    fetched_at: now,
                },
            );
        }

        let cutoff = today - chrono::Days::new(u64::from(self.retention_days));
        let before = history.len();
        history.retain(|date, _| *date > cutoff);
        let pruned = before - history.len();

        recompute_cumulative(&mut history);
        save_json(&path, &history).await?;

        debug!(days = history.len(), pruned, "Cost history saved");
        Ok(history.len())
    }

    /// Loads a provider's history; missing or corrupt files read as empty.
    pub async fn load(&self, kind: ProviderKind) -> CostHistory {
        let _guard = self.lock.lock().await;
        load_json_or_default(&self.path(kind)).await
    }

    /// Loads a provider's history as projection samples, oldest first.
    pub async fn samples(&self, kind: ProviderKind) -> Vec<DailySample> {
        self.load(kind)
            .await
            .into_iter()
            .filter_map(|(date, entry)| DailySample::new(date, entry.cost).ok())
            .collect()
    }
}

fn recompute_cumulative(history: &mut CostHistory) {
    let mut month = None;
    let mut running = 0.0;
    for (date, entry) in history.iter_mut() {
        let key = (date.year(), date.month());
        if month != Some(key) {
            month = Some(key);
            running = 0.0;
        }
        running += entry.cost;
        entry.cumulative_cost = running;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample(d: NaiveDate, cost: f64) -> DailySample {
        DailySample::new(d, cost).unwrap()
    }

    #[tokio::test]
    async fn test_record_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DailyCostCache::new(dir.path());
        let today = date(2026, 10, 16);

        let stored = cache
            .record_at(
                ProviderKind::Copilot,
                &[sample(date(2026, 10, 14), 1.0), sample(date(2026, 10, 15), 2.5)],
                today,
            )
            .await
            .unwrap();
        assert_eq!(stored, 2);
        assert!(dir.path().join("copilot.json").exists());

        let samples = cache.samples(ProviderKind::Copilot).await;
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].cost, 2.5);
    }

    #[tokio::test]
    async fn test_upsert_replaces_day() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DailyCostCache::new(dir.path());
        let today = date(2026, 10, 16);
        let day = date(2026, 10, 15);

        cache.record_at(ProviderKind::Copilot, &[sample(day, 1.0)], today).await.unwrap();
        cache.record_at(ProviderKind::Copilot, &[sample(day, 4.0)], today).await.unwrap();

        let history = cache.load(ProviderKind::Copilot).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[&day].cost, 4.0);
    }

    #[tokio::test]
    async fn test_prunes_outside_retention() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DailyCostCache::new(dir.path()).with_retention_days(10);
        let today = date(2026, 10, 16);

        cache
            .record_at(
                ProviderKind::Cursor,
                &[
                    sample(date(2026, 10, 6), 9.0),
                    sample(date(2026, 10, 7), 1.0),
                    sample(date(2026, 10, 16), 1.0),
                ],
                today,
            )
            .await
            .unwrap();

        let history = cache.load(ProviderKind::Cursor).await;
        assert!(!history.contains_key(&date(2026, 10, 6)));
        assert!(history.contains_key(&date(2026, 10, 7)));
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_cumulative_resets_each_month() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DailyCostCache::new(dir.path());
        let today = date(2026, 10, 16);

        cache
            .record_at(
                ProviderKind::Copilot,
                &[
                    sample(date(2026, 9, 29), 3.0),
                    sample(date(2026, 9, 30), 2.0),
                    sample(date(2026, 10, 1), 1.0),
                    sample(date(2026, 10, 2), 0.5),
                ],
                today,
            )
            .await
            .unwrap();

        let history = cache.load(ProviderKind::Copilot).await;
        assert_eq!(history[&date(2026, 9, 30)].cumulative_cost, 5.0);
        assert_eq!(history[&date(2026, 10, 1)].cumulative_cost, 1.0);
        assert_eq!(history[&date(2026, 10, 2)].cumulative_cost, 1.5);
    }

    #[tokio::test]
    async fn test_providers_are_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DailyCostCache::new(dir.path());
        let today = date(2026, 10, 16);

        cache.record_at(ProviderKind::Copilot, &[sample(today, 1.0)], today).await.unwrap();

        assert!(cache.load(ProviderKind::Cursor).await.is_empty());
        assert_eq!(cache.load(ProviderKind::Copilot).await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_do_not_lose_days() {
        let dir = tempfile::tempdir().unwrap();
        let cache = std::sync::Arc::new(DailyCostCache::new(dir.path()));
        let today = date(2026, 10, 16);

        let handles: Vec<_> = (1..=8)
            .map(|day| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    cache
                        .record_at(ProviderKind::Copilot, &[sample(date(2026, 10, day), 1.0)], today)
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let history = cache.load(ProviderKind::Copilot).await;
        assert_eq!(history.len(), 8);
        assert_eq!(history[&date(2026, 10, 8)].cumulative_cost, 8.0);
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("copilot.json"), "{not json").await.unwrap();
        let cache = DailyCostCache::new(dir.path());

        assert!(cache.samples(ProviderKind::Copilot).await.is_empty());
    }
}
