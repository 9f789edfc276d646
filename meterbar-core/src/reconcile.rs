//! Candidate reconciliation.
//!
//! The same account's credentials often live in several places (an OAuth
//! store, an environment variable, a CLI config). Each credential source
//! produces its own [`Candidate`], so a provider can end up with several
//! readings for one real account. The reconciler collapses them into one
//! canonical, priority-ordered list.
//!
//! Two entries describe the same account when:
//! 1. both carry an identity key and the keys are equal, or
//! 2. at least one of them has no identity key and the `same_usage`
//!    predicate says their measured numbers agree.
//!
//! The second rule is a heuristic. Two distinct accounts that report the
//! exact same numbers and reset time in one cycle are collapsed into one.
//!
//! On a match the higher-priority entry keeps its usage untouched; the
//! optional merge callback may only enrich metadata.

use std::cmp::Reverse;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::error::ErrorKind;
use crate::models::{Candidate, UsageModel};

// ============================================================================
// Errors
// ============================================================================

/// Reconciliation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// No credential source produced anything.
    #[error("no credential sources configured")]
    NoCandidates,

    /// Every credential source failed.
    #[error("all credential sources failed: {}", SourceFailures(.failures))]
    AllUnavailable {
        /// The failed sources, highest priority first.
        failures: Vec<SourceFailure>,
    },
}

impl ReconcileError {
    /// Classifies the failure.
    ///
    /// Authentication is reported only when no source failed for another
    /// reason; otherwise the highest-priority non-credential failure wins.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoCandidates => ErrorKind::AuthenticationFailed,
            Self::AllUnavailable { failures } => failures
                .iter()
                .map(|f| f.kind)
                .find(|kind| *kind != ErrorKind::AuthenticationFailed)
                .unwrap_or(ErrorKind::AuthenticationFailed),
        }
    }
}

/// One credential source that produced no reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Source label, e.g. `env:METERBAR_EXA_TOKEN`.
    pub label: String,
    /// Source priority.
    pub priority: i32,
    /// How it failed.
    pub kind: ErrorKind,
    /// The source's error message.
    pub reason: String,
}

impl SourceFailure {
    fn from_placeholder(candidate: Candidate) -> Self {
        let (kind, reason) = match candidate.usage {
            UsageModel::Unavailable { kind, reason } => (kind, reason),
            UsageModel::QuotaBased { .. } | UsageModel::PayAsYouGo { .. } => {
                (ErrorKind::Generic, String::new())
            }
        };
        Self {
            label: candidate.source_labels.into_iter().next().unwrap_or_default(),
            priority: candidate.source_priority,
            kind,
            reason,
        }
    }
}

struct SourceFailures<'a>(&'a [SourceFailure]);

impl fmt::Display for SourceFailures<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} ({})", failure.label, failure.reason)?;
        }
        Ok(())
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Callbacks that parameterize reconciliation for one item type.
pub struct ReconcileRules<T> {
    /// Explicit identity key, if the item has one.
    pub identity: fn(&T) -> Option<String>,
    /// Whether two items report the same measured usage.
    pub same_usage: fn(&T, &T) -> bool,
    /// Item priority; higher wins.
    pub priority: fn(&T) -> i32,
    /// Optional metadata merge: `(winner, loser)`.
    pub merge: Option<fn(&mut T, &T)>,
}

impl<T> Clone for ReconcileRules<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ReconcileRules<T> {}

impl<T> std::fmt::Debug for ReconcileRules<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileRules")
            .field("merge", &self.merge.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for ReconcileRules<Candidate> {
    fn default() -> Self {
        Self {
            identity: Candidate::identity_key,
            same_usage: |a, b| a.usage.same_reading(&b.usage),
            priority: |c| c.source_priority,
            merge: Some(merge_candidate_metadata),
        }
    }
}

/// Default metadata merge for candidates.
///
/// Appends the loser's source labels not already present and fills a
/// missing email, account id or detail key. Usage is never touched.
pub fn merge_candidate_metadata(winner: &mut Candidate, loser: &Candidate) {
    for label in &loser.source_labels {
        if !winner.source_labels.contains(label) {
            winner.source_labels.push(label.clone());
        }
    }
    if winner.email.is_none() {
        winner.email.clone_from(&loser.email);
    }
    if winner.account_id.is_none() {
        winner.account_id.clone_from(&loser.account_id);
    }
    winner.details.fill_missing_from(&loser.details);
}

// ============================================================================
// Reconciler
// ============================================================================

/// Generic merge/dedupe engine.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<T> {
    rules: ReconcileRules<T>,
}

impl<T> Reconciler<T> {
    /// Creates a reconciler with the given rules.
    pub fn new(rules: ReconcileRules<T>) -> Self {
        Self { rules }
    }

    /// Collapses `items` into canonical entries sorted by descending
    /// priority. Ties keep first-seen order.
    pub fn reconcile(&self, items: Vec<T>) -> Vec<T> {
        let mut canonical: Vec<T> = Vec::with_capacity(items.len());

        for item in items {
            match canonical.iter().position(|existing| self.matches(existing, &item)) {
                Some(index) => self.absorb(&mut canonical[index], item),
                None => canonical.push(item),
            }
        }

        let priority = self.rules.priority;
        canonical.sort_by_key(|item| Reverse(priority(item)));
        canonical
    }

    fn matches(&self, a: &T, b: &T) -> bool {
        match ((self.rules.identity)(a), (self.rules.identity)(b)) {
            (Some(left), Some(right)) => left == right,
            _ => (self.rules.same_usage)(a, b),
        }
    }

    fn absorb(&self, existing: &mut T, incoming: T) {
        let priority = self.rules.priority;
        if priority(&incoming) > priority(existing) {
            let loser = std::mem::replace(existing, incoming);
            if let Some(merge) = self.rules.merge {
                merge(existing, &loser);
            }
        } else if let Some(merge) = self.rules.merge {
            merge(existing, &incoming);
        }
    }
}

impl Default for Reconciler<Candidate> {
    fn default() -> Self {
        Self::new(ReconcileRules::default())
    }
}

/// Reconciles one provider's candidates, applying the placeholder rule.
///
/// Unavailable placeholders are dropped whenever at least one real reading
/// exists; they never stand in for zero usage.
///
/// # Errors
///
/// Returns [`ReconcileError::NoCandidates`] for an empty input and
/// [`ReconcileError::AllUnavailable`] when every candidate is a placeholder.
pub fn reconcile_candidates(
    candidates: Vec<Candidate>,
    rules: ReconcileRules<Candidate>,
) -> Result<Vec<Candidate>, ReconcileError> {
    if candidates.is_empty() {
        return Err(ReconcileError::NoCandidates);
    }

    let (placeholders, readings): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(Candidate::is_unavailable);

    if readings.is_empty() {
        let mut failures: Vec<SourceFailure> = placeholders
            .into_iter()
            .map(SourceFailure::from_placeholder)
            .collect();
        failures.sort_by_key(|f| Reverse(f.priority));
        return Err(ReconcileError::AllUnavailable { failures });
    }

    let input_count = readings.len();
    let reconciled = Reconciler::new(rules).reconcile(readings);
    debug!(
        readings = input_count,
        accounts = reconciled.len(),
        dropped_placeholders = placeholders.len(),
        "Reconciled candidates"
    );
    Ok(reconciled)
}

// ============================================================================
// Tests
// ============================================================================
