//! Fetch cycle orchestration.
//!
//! A cycle launches every enabled provider concurrently, each in its own
//! task, and collects their outcomes into one [`FetchResult`].
//!
//! ```text
//! Idle ──run_cycle──▶ Fetching { pending } ──(pending empty | deadline)──▶ Idle
//!                         │
//!                         ├─ provider ok       → results[kind]
//!                         ├─ provider error    → errors[kind] = error.kind()
//!                         ├─ provider timeout  → errors[kind] = Network (task aborted)
//!                         └─ provider panic    → errors[kind] = Generic
//! ```
//!
//! Providers never see each other: a slow or failing one cannot cancel or
//! corrupt another's work. The only shared state is the result being
//! collected, which sits behind a single async mutex.
//!
//! Triggering a cycle for a scope that already has one in flight is a no-op
//! (`run_cycle` returns `None`), so a periodic timer never overlaps a slow
//! manual refresh.

use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use meterbar_core::{ErrorKind, FetchResult, ProviderKind, ProviderOutcome};

use crate::context::FetchContext;
use crate::provider::UsageProvider;

/// Default per-provider timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cycle-level deadline.
pub const DEFAULT_CYCLE_DEADLINE: Duration = Duration::from_secs(60);

// ============================================================================
// Configuration
// ============================================================================

/// Timeouts applied by the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Timeout for one provider's fetch.
    pub provider_timeout: Duration,
    /// After this long the cycle stops waiting and reports stragglers as
    /// pending.
    pub cycle_deadline: Duration,
    /// Per-provider timeout overrides.
    pub provider_timeouts: HashMap<ProviderKind, Duration>,
}

impl OrchestratorConfig {
    /// Returns the timeout for a provider.
    pub fn timeout_for(&self, kind: ProviderKind) -> Duration {
        self.provider_timeouts
            .get(&kind)
            .copied()
            .unwrap_or(self.provider_timeout)
    }

    /// Sets the default provider timeout.
    #[must_use]
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Sets the cycle deadline.
    #[must_use]
    pub fn with_cycle_deadline(mut self, deadline: Duration) -> Self {
        self.cycle_deadline = deadline;
        self
    }

    /// Overrides the timeout of one provider.
    #[must_use]
    pub fn with_timeout_for(mut self, kind: ProviderKind, timeout: Duration) -> Self {
        self.provider_timeouts.insert(kind, timeout);
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            cycle_deadline: DEFAULT_CYCLE_DEADLINE,
            provider_timeouts: HashMap::new(),
        }
    }
}

// ============================================================================
// Cycle State
// ============================================================================

/// Where a scope's cycle stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleState {
    /// No cycle running.
    Idle,
    /// A cycle is running; these providers have not reported yet.
    Fetching {
        /// Providers still in flight.
        pending: BTreeSet<ProviderKind>,
    },
}

type CycleTable = Arc<Mutex<HashMap<String, BTreeSet<ProviderKind>>>>;

/// Marks a scope as in flight; releases it on drop.
struct CycleGuard {
    cycles: CycleTable,
    scope: String,
}

impl CycleGuard {
    fn acquire(
        cycles: &CycleTable,
        scope: &str,
        kinds: impl IntoIterator<Item = ProviderKind>,
    ) -> Option<Self> {
        let mut table = cycles.lock().unwrap_or_else(PoisonError::into_inner);
        if table.contains_key(scope) {
            return None;
        }
        table.insert(scope.to_string(), kinds.into_iter().collect());
        Some(Self {
            cycles: Arc::clone(cycles),
            scope: scope.to_string(),
        })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.cycles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.scope);
    }
}

fn mark_reported(cycles: &CycleTable, scope: &str, kind: ProviderKind) {
    if let Some(pending) = cycles
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get_mut(scope)
    {
        pending.remove(&kind);
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs fetch cycles and publishes their results.
pub struct FetchOrchestrator {
    ctx: Arc<FetchContext>,
    config: OrchestratorConfig,
    cycles: CycleTable,
    last_cycle_id: AtomicU64,
    published: watch::Sender<Option<Arc<FetchResult>>>,
}

impl FetchOrchestrator {
    /// Creates an orchestrator with default timeouts.
    pub fn new(ctx: Arc<FetchContext>) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            ctx,
            config: OrchestratorConfig::default(),
            cycles: Arc::new(Mutex::new(HashMap::new())),
            last_cycle_id: AtomicU64::new(0),
            published,
        }
    }

    /// Replaces the timeout configuration.
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the timeout configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Subscribes to finished cycles.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<FetchResult>>> {
        self.published.subscribe()
    }

    /// Returns the most recently finished cycle.
    pub fn latest(&self) -> Option<Arc<FetchResult>> {
        self.published.borrow().clone()
    }

    /// Returns the state of a scope.
    pub fn state(&self, scope: &str) -> CycleState {
        match self
            .cycles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(scope)
        {
            Some(pending) => CycleState::Fetching {
                pending: pending.clone(),
            },
            None => CycleState::Idle,
        }
    }

    /// Returns true if a cycle is running for `scope`.
    pub fn is_in_flight(&self, scope: &str) -> bool {
        self.state(scope) != CycleState::Idle
    }

    /// Runs one fetch cycle over `providers`.
    ///
    /// Returns `None` without doing anything if a cycle for `scope` is
    /// already in flight.
    #[instrument(skip(self, providers), fields(scope = %scope, providers = providers.len()))]
    pub async fn run_cycle(
        &self,
        scope: &str,
        providers: Vec<Arc<dyn UsageProvider>>,
    ) -> Option<FetchResult> {
        let kinds: Vec<ProviderKind> = providers.iter().map(|p| p.kind()).collect();
        let Some(_guard) = CycleGuard::acquire(&self.cycles, scope, kinds.iter().copied()) else {
            debug!("Cycle already in flight, ignoring trigger");
            return None;
        };

        let cycle_id = self.last_cycle_id.fetch_add(1, Ordering::SeqCst) + 1;
        info!(cycle_id, "Fetch cycle started");

        let collected = Arc::new(tokio::sync::Mutex::new(FetchResult::new(cycle_id)));
        let mut abort_handles = Vec::with_capacity(providers.len());
        let mut watchers = Vec::with_capacity(providers.len());

        for provider in providers {
            let kind = provider.kind();
            let timeout = self.config.timeout_for(kind);
            let ctx = Arc::clone(&self.ctx);
            let mut handle = tokio::spawn(async move { provider.fetch(&ctx).await });
            abort_handles.push(handle.abort_handle());

            let collected = Arc::clone(&collected);
            let cycles = Arc::clone(&self.cycles);
            let scope = scope.to_string();
            watchers.push(async move {
                let outcome = match tokio::time::timeout(timeout, &mut handle).await {
                    Ok(Ok(Ok(result))) => Ok(result),
                    Ok(Ok(Err(error))) => {
                        warn!(provider = %kind, kind = %error.kind(), error = %error, "Provider failed");
                        Err(error.kind())
                    }
                    Ok(Err(join_error)) => {
                        warn!(provider = %kind, panicked = join_error.is_panic(), "Provider task died");
                        Err(ErrorKind::Generic)
                    }
                    Err(_) => {
                        handle.abort();
                        warn!(provider = %kind, timeout = ?timeout, "Provider timed out");
                        Err(ErrorKind::Network)
                    }
                };

                let mut result = collected.lock().await;
                match outcome {
                    Ok(mut provider_result) => {
                        if provider_result.provider != kind {
                            warn!(provider = %kind, reported = %provider_result.provider, "Provider reported another kind");
                            provider_result.provider = kind;
                        }
                        result.record_success(provider_result);
                    }
                    Err(error_kind) => result.record_failure(kind, error_kind),
                }
                drop(result);
                mark_reported(&cycles, &scope, kind);
            });
        }

        let completed = tokio::time::timeout(self.config.cycle_deadline, join_all(watchers))
            .await
            .is_ok();
        if !completed {
            for handle in &abort_handles {
                handle.abort();
            }
        }

        let mut result = collected.lock().await.clone();
        if !completed {
            result.pending = kinds
                .iter()
                .copied()
                .filter(|k| result.outcome(*k) == ProviderOutcome::InFlight)
                .collect();
            warn!(pending = ?result.pending, "Cycle deadline elapsed");
        }
        result.finished_at = Some(Utc::now());

        info!(
            cycle_id,
            succeeded = result.results.len(),
            failed = result.errors.len(),
            pending = result.pending.len(),
            "Fetch cycle finished"
        );
        self.published.send_replace(Some(Arc::new(result.clone())));
        Some(result)
    }
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

