//! Main usage state store.
//!
//! Holds the last good result per provider and folds each cycle's outcome
//! into it. Successes swap the whole `Arc<ProviderResult>`; failures and
//! stragglers keep the previous value around, marked stale.

use chrono::{DateTime, Utc};
use meterbar_core::{ErrorKind, FetchResult, ProviderKind, ProviderResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};

// ============================================================================
// Display State
// ============================================================================

/// What a provider's row should show.
///
/// "No data yet", "fetch failed" and "confirmed zero usage" never collapse
/// into each other.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayState {
    /// Nothing has been fetched for this provider.
    NoData,
    /// The latest fetch failed.
    Failed {
        /// Failure classification.
        kind: ErrorKind,
        /// Last good result, if any.
        stale: Option<Arc<ProviderResult>>,
    },
    /// A result is available.
    Loaded {
        /// The result.
        result: Arc<ProviderResult>,
        /// True when the latest cycle did not finish this provider.
        stale: bool,
    },
}

impl DisplayState {
    /// Returns the result to render, fresh or stale.
    pub fn result(&self) -> Option<&Arc<ProviderResult>> {
        match self {
            DisplayState::NoData => None,
            DisplayState::Failed { stale, .. } => stale.as_ref(),
            DisplayState::Loaded { result, .. } => Some(result),
        }
    }

    /// Returns true if the value shown is not from the latest cycle.
    pub fn is_stale(&self) -> bool {
        match self {
            DisplayState::NoData => false,
            DisplayState::Failed { stale, .. } => stale.is_some(),
            DisplayState::Loaded { stale, .. } => *stale,
        }
    }

    /// Returns true only for a fresh, real reading of zero usage.
    pub fn is_confirmed_zero(&self) -> bool {
        matches!(
            self,
            DisplayState::Loaded { result, stale: false } if result.aggregate_usage.is_confirmed_zero()
        )
    }

    /// Short label for the state.
    pub fn label(&self) -> &'static str {
        match self {
            DisplayState::NoData => "no data",
            DisplayState::Failed { .. } => "failed",
            DisplayState::Loaded { stale: true, .. } => "stale",
            DisplayState::Loaded { stale: false, .. } => "ok",
        }
    }
}

// ============================================================================
// Inner State
// ============================================================================

#[derive(Debug, Default)]
struct ProviderEntry {
    last_good: Option<Arc<ProviderResult>>,
    last_error: Option<ErrorKind>,
    stale: bool,
}

#[derive(Debug, Default)]
struct UsageStoreInner {
    entries: HashMap<ProviderKind, ProviderEntry>,
    last_cycle: Option<u64>,
    last_refresh: Option<DateTime<Utc>>,
}

// ============================================================================
// Usage Store
// ============================================================================

/// Per-provider usage state with change notifications.
pub struct UsageStore {
    inner: Arc<RwLock<UsageStoreInner>>,
    notify: watch::Sender<u64>,
}

impl UsageStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            inner: Arc::new(RwLock::new(UsageStoreInner::default())),
            notify,
        }
    }

    /// Folds one cycle's outcome into the store.
    ///
    /// Providers absent from the cycle entirely are left untouched.
    pub async fn apply(&self, cycle: &FetchResult) {
        {
            let mut inner = self.inner.write().await;

            for (kind, result) in &cycle.results {
                let entry = inner.entries.entry(*kind).or_default();
                entry.last_good = Some(Arc::new(result.clone()));
                entry.last_error = None;
                entry.stale = false;
            }

            for (kind, error) in &cycle.errors {
                let entry = inner.entries.entry(*kind).or_default();
                entry.last_error = Some(*error);
                entry.stale = entry.last_good.is_some();
            }

            for kind in &cycle.pending {
                if let Some(entry) = inner.entries.get_mut(kind) {
                    entry.last_error = None;
                    entry.stale = entry.last_good.is_some();
                }
            }

            inner.last_cycle = Some(cycle.cycle_id);
            inner.last_refresh = cycle.finished_at.or(Some(cycle.started_at));
        }

        info!(
            cycle = cycle.cycle_id,
            succeeded = cycle.results.len(),
            failed = cycle.errors.len(),
            pending = cycle.pending.len(),
            "Applied fetch cycle"
        );
        self.notify.send_modify(|version| *version += 1);
    }

    /// Returns what to show for a provider.
    pub async fn display_state(&self, kind: ProviderKind) -> DisplayState {
        let inner = self.inner.read().await;
        let Some(entry) = inner.entries.get(&kind) else {
            return DisplayState::NoData;
        };

        let state = match (&entry.last_error, &entry.last_good) {
            (Some(error), last_good) => DisplayState::Failed {
                kind: *error,
                stale: last_good.clone(),
            },
            (None, Some(result)) => DisplayState::Loaded {
                result: result.clone(),
                stale: entry.stale,
            },
            (None, None) => DisplayState::NoData,
        };
        debug!(provider = %kind, state = state.label(), "Display state");
        state
    }

    /// Returns display states for several providers, in the given order.
    pub async fn display_states(&self, kinds: &[ProviderKind]) -> Vec<(ProviderKind, DisplayState)> {
        let mut states = Vec::with_capacity(kinds.len());
        for kind in kinds {
            states.push((*kind, self.display_state(*kind).await));
        }
        states
    }

    /// Id of the last applied cycle.
    pub async fn last_cycle(&self) -> Option<u64> {
        self.inner.read().await.last_cycle
    }

    /// When the last applied cycle finished.
    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_refresh
    }

    /// Forgets everything known about a provider.
    pub async fn clear(&self, kind: ProviderKind) {
        self.inner.write().await.entries.remove(&kind);
        self.notify.send_modify(|version| *version += 1);
    }

    /// Subscribes to change notifications.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }
}

impl Default for UsageStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
