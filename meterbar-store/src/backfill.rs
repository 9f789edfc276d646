//! History backfill.
//!
//! Walks a [`HistorySource`] page by page on a detached task, writing every
//! page into the [`DailyCostCache`] and publishing progress after each one.
//! Only one backfill runs per task handle at a time.

use meterbar_core::{ErrorKind, ModelUsage, ProviderKind};
use meterbar_fetch::{FetchContext, HistorySource};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cost_cache::DailyCostCache;
use crate::error::StoreError;

// ============================================================================
// Progress
// ============================================================================

/// Progress of one backfill run.
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillProgress {
    /// Provider being backfilled.
    pub provider: ProviderKind,
    /// Pages read so far.
    pub pages_read: u32,
    /// Days written to the cache so far.
    pub days_written: usize,
    /// Per-model totals accumulated across pages.
    pub models: Vec<ModelUsage>,
    /// True once the run has stopped.
    pub finished: bool,
    /// Set when the run stopped on a fetch failure.
    pub error: Option<ErrorKind>,
}

impl BackfillProgress {
    fn started(provider: ProviderKind) -> Self {
        Self {
            provider,
            pages_read: 0,
            days_written: 0,
            models: Vec::new(),
            finished: false,
            error: None,
        }
    }
}

// ============================================================================
// Running Guard
// ============================================================================

/// Clears the running flag when the task ends or is aborted.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// Backfill Task
// ============================================================================

/// Handle to a background history backfill.
pub struct BackfillTask {
    running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
    progress: watch::Sender<Option<BackfillProgress>>,
}

impl BackfillTask {
    /// Creates an idle task handle.
    pub fn new() -> Self {
        let (progress, _) = watch::channel(None);
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
            progress,
        }
    }

    /// Returns true while a backfill is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Starts a backfill.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RefreshInProgress`] if one is already running.
    pub async fn start(
        &self,
        source: Arc<dyn HistorySource>,
        ctx: Arc<FetchContext>,
        cache: Arc<DailyCostCache>,
    ) -> Result<(), StoreError> {
        let provider = source.provider();
        // Held until the handle is stored so a concurrent cancel sees it.
        let mut slot = self.handle.lock().await;
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(provider = %provider, "Backfill already running");
            return Err(StoreError::RefreshInProgress(provider.cli_name().to_string()));
        }

        let guard = RunningGuard(self.running.clone());
        let progress = self.progress.clone();
        progress.send_replace(Some(BackfillProgress::started(provider)));

        info!(provider = %provider, max_pages = source.max_pages(), "Starting history backfill");
        let handle = tokio::spawn(async move {
            let _guard = guard;
            run_backfill(source.as_ref(), &ctx, &cache, &progress).await;
        });

        *slot = Some(handle);
        Ok(())
    }

    /// Aborts the running backfill, if any, and clears the guard.
    pub async fn cancel(&self) {
        let Some(handle) = self.handle.lock().await.take() else {
            return;
        };
        handle.abort();
        let _ = handle.await;
        self.running.store(false, Ordering::Release);
        self.progress.send_modify(|progress| {
            if let Some(progress) = progress {
                progress.finished = true;
            }
        });
        info!("History backfill cancelled");
    }

    /// Waits for the running backfill to stop and returns its final progress.
    pub async fn wait(&self) -> Option<BackfillProgress> {
        let handle = self.handle.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Backfill task ended abnormally");
            }
        }
        self.progress.borrow().clone()
    }

    /// Subscribes to progress updates.
    pub fn progress(&self) -> watch::Receiver<Option<BackfillProgress>> {
        self.progress.subscribe()
    }
}

impl Default for BackfillTask {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_backfill(
    source: &dyn HistorySource,
    ctx: &FetchContext,
    cache: &DailyCostCache,
    progress: &watch::Sender<Option<BackfillProgress>>,
) {
    let provider = source.provider();
    let mut state = BackfillProgress::started(provider);
    let mut models: BTreeMap<String, ModelUsage> = BTreeMap::new();

    for page in 1..=source.max_pages() {
        let fetched = match source.fetch_page(ctx, page).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(provider = %provider, page, error = %e, "History page failed");
                state.error = Some(e.kind());
                break;
            }
        };
        if fetched.is_empty() {
            debug!(provider = %provider, page, "Empty history page, stopping");
            break;
        }

        if let Err(e) = cache.record(provider, &fetched.samples).await {
            warn!(provider = %provider, page, error = %e, "Failed to write cost history");
            state.error = Some(ErrorKind::Generic);
            break;
        }

        for usage in fetched.models {
            models
                .entry(usage.model.clone())
                .and_modify(|total| {
                    total.included_requests += usage.included_requests;
                    total.billed_requests += usage.billed_requests;
                    total.billed_amount += usage.billed_amount;
                })
                .or_insert(usage);
        }

        state.pages_read = page;
        state.days_written += fetched.samples.len();
        state.models = models.values().cloned().collect();
        progress.send_replace(Some(state.clone()));
        debug!(provider = %provider, page, days = state.days_written, "History page written");
    }

    state.finished = true;
    info!(
        provider = %provider,
        pages = state.pages_read,
        days = state.days_written,
        "History backfill finished"
    );
    progress.send_replace(Some(state));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Days, Local, NaiveDate};
    use meterbar_core::DailySample;
    use meterbar_fetch::{FetchError, HistoryPage};
    use std::sync::atomic::AtomicU32;

    struct PagedSource {
        pages: Vec<HistoryPage>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl HistorySource for PagedSource {
        fn provider(&self) -> ProviderKind {
            ProviderKind::Copilot
        }

        async fn fetch_page(&self, _ctx: &FetchContext, page: u32) -> Result<HistoryPage, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages.get(page as usize - 1).cloned().unwrap_or_default())
        }

        fn max_pages(&self) -> u32 {
            5
        }
    }

    struct StuckSource;

    #[async_trait]
    impl HistorySource for StuckSource {
        fn provider(&self) -> ProviderKind {
            ProviderKind::Copilot
        }

        async fn fetch_page(&self, _ctx: &FetchContext, _page: u32) -> Result<HistoryPage, FetchError> {
            std::future::pending().await
        }
    }

    struct FailingSource;

    #[async_trait]
    impl HistorySource for FailingSource {
        fn provider(&self) -> ProviderKind {
            ProviderKind::Copilot
        }

        async fn fetch_page(&self, _ctx: &FetchContext, _page: u32) -> Result<HistoryPage, FetchError> {
            Err(FetchError::AuthenticationFailed("session expired".to_string()))
        }
    }

    fn days_ago(n: u64) -> NaiveDate {
        Local::now().date_naive() - Days::new(n)
    }

    fn page(days: &[u64], model: &str, requests: f64) -> HistoryPage {
        HistoryPage {
            samples: days
                .iter()
                .map(|d| DailySample::new(days_ago(*d), 1.0).unwrap())
                .collect(),
            models: vec![ModelUsage {
                model: model.to_string(),
                included_requests: requests,
                billed_requests: 0.0,
                billed_amount: 0.0,
            }],
        }
    }

    fn setup() -> (tempfile::TempDir, Arc<DailyCostCache>, Arc<FetchContext>) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(DailyCostCache::new(dir.path()));
        (dir, cache, Arc::new(FetchContext::new()))
    }

    #[tokio::test]
    async fn test_backfill_writes_pages_until_empty() {
        let (_dir, cache, ctx) = setup();
        let source = Arc::new(PagedSource {
            pages: vec![page(&[1, 2], "gpt-5", 10.0), page(&[3], "gpt-5", 5.0)],
            calls: AtomicU32::new(0),
        });

        let task = BackfillTask::new();
        task.start(source.clone(), ctx, cache.clone()).await.unwrap();
        let progress = task.wait().await.unwrap();

        assert!(progress.finished);
        assert_eq!(progress.pages_read, 2);
        assert_eq!(progress.days_written, 3);
        assert_eq!(progress.models.len(), 1);
        assert_eq!(progress.models[0].included_requests, 15.0);
        assert!(progress.error.is_none());
        // two pages plus the empty one that ends the walk
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.samples(ProviderKind::Copilot).await.len(), 3);
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn test_second_start_is_rejected() {
        let (_dir, cache, ctx) = setup();
        let task = BackfillTask::new();

        task.start(Arc::new(StuckSource), ctx.clone(), cache.clone()).await.unwrap();
        let err = task
            .start(Arc::new(StuckSource), ctx.clone(), cache.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RefreshInProgress(ref p) if p == "copilot"));

        task.cancel().await;
        assert!(!task.is_running());
        assert!(task.progress().borrow().as_ref().unwrap().finished);

        task.start(Arc::new(StuckSource), ctx, cache).await.unwrap();
        task.cancel().await;
    }

    #[tokio::test]
    async fn test_failure_stops_and_reports_kind() {
        let (_dir, cache, ctx) = setup();
        let task = BackfillTask::new();

        task.start(Arc::new(FailingSource), ctx, cache.clone()).await.unwrap();
        let progress = task.wait().await.unwrap();

        assert!(progress.finished);
        assert_eq!(progress.error, Some(ErrorKind::AuthenticationFailed));
        assert_eq!(progress.days_written, 0);
        assert!(cache.load(ProviderKind::Copilot).await.is_empty());
    }

    #[tokio::test]
    async fn test_progress_published_per_page() {
        let (_dir, cache, ctx) = setup();
        let source = Arc::new(PagedSource {
            pages: vec![page(&[1], "claude", 1.0)],
            calls: AtomicU32::new(0),
        });
        let task = BackfillTask::new();
        let mut rx = task.progress();

        task.start(source, ctx, cache).await.unwrap();
        task.wait().await;

        assert!(rx.has_changed().unwrap());
        let last = rx.borrow_and_update().clone().unwrap();
        assert_eq!(last.provider, ProviderKind::Copilot);
        assert_eq!(last.days_written, 1);
    }

    #[tokio::test]
    async fn test_cancel_when_idle_is_noop() {
        let task = BackfillTask::new();
        task.cancel().await;
        assert!(!task.is_running());
        assert!(task.progress().borrow().is_none());
    }

    #[tokio::test]
    async fn test_start_claims_handle_before_spawning() {
        let (_dir, cache, ctx) = setup();
        let task = BackfillTask::new();

        let slot = task.handle.lock().await;
        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            task.start(Arc::new(StuckSource), ctx.clone(), cache.clone()),
        )
        .await;
        assert!(blocked.is_err());
        assert!(!task.is_running());
        drop(slot);

        let (started, ()) = tokio::join!(task.start(Arc::new(StuckSource), ctx, cache), task.cancel());
        started.unwrap();
        assert!(!task.is_running());
        assert!(task.handle.lock().await.is_none());
    }
}
