//! Candidate pipeline.
//!
//! Runs every available strategy of one provider concurrently and turns
//! each outcome into a [`Candidate`]. A failed strategy leaves an
//! unavailable placeholder behind so the reconciler can tell "every source
//! failed" apart from "nothing was used".

use futures::future::join_all;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use meterbar_core::{Candidate, ErrorKind};

use crate::context::FetchContext;
use crate::strategy::{FetchKind, FetchStrategy, StrategyInfo};

// ============================================================================
// Fetch Attempt
// ============================================================================

/// Record of a single strategy attempt.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    /// The strategy ID that was attempted.
    pub strategy_id: String,
    /// The source label of the strategy.
    pub source_label: String,
    /// The kind of fetch used.
    pub kind: FetchKind,
    /// Whether the strategy was run at all.
    pub available: bool,
    /// Failure classification, if the attempt failed.
    pub error_kind: Option<ErrorKind>,
    /// Error message if the attempt failed.
    pub error: Option<String>,
    /// How long the attempt took.
    pub duration: Duration,
}

impl FetchAttempt {
    /// Returns true if the attempt produced a reading.
    pub fn is_success(&self) -> bool {
        self.available && self.error.is_none()
    }
}

// ============================================================================
// Pipeline Outcome
// ============================================================================

/// The outcome of running a candidate pipeline.
#[derive(Debug)]
pub struct PipelineOutcome {
    /// One candidate per available strategy, in priority order.
    pub candidates: Vec<Candidate>,
    /// All attempts, including skipped strategies.
    pub attempts: Vec<FetchAttempt>,
    /// Wall time of the whole pipeline.
    pub duration: Duration,
}

impl PipelineOutcome {
    /// Returns the number of strategies that produced a reading.
    pub fn successes(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_success()).count()
    }

    /// Returns all error messages.
    pub fn errors(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_deref())
            .collect()
    }
}

// ============================================================================
// Candidate Pipeline
// ============================================================================

/// The strategies of one provider, ordered by priority.
pub struct CandidatePipeline {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl CandidatePipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Creates a pipeline with the given strategies.
    pub fn with_strategies(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        let mut pipeline = Self { strategies };
        pipeline.sort_by_priority();
        pipeline
    }

    /// Adds a strategy to the pipeline.
    pub fn add_strategy(&mut self, strategy: Box<dyn FetchStrategy>) {
        self.strategies.push(strategy);
        self.sort_by_priority();
    }

    /// Sorts strategies by priority (highest first, stable).
    fn sort_by_priority(&mut self) {
        self.strategies.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Returns the number of strategies in the pipeline.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Returns true if the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Returns information about all strategies.
    pub async fn strategy_info(&self, ctx: &FetchContext) -> Vec<StrategyInfo> {
        let mut info = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            info.push(StrategyInfo::from_strategy(strategy.as_ref(), ctx).await);
        }
        info
    }

    /// Runs every available strategy concurrently.
    ///
    /// Network failures are retried per the context's retry policy; any
    /// failure that remains becomes an unavailable placeholder.
    #[instrument(skip(self, ctx), fields(strategies = self.strategies.len()))]
    pub async fn collect(&self, ctx: &FetchContext) -> PipelineOutcome {
        let start = Instant::now();

        let runs = self.strategies.iter().map(|s| run_strategy(s.as_ref(), ctx));
        let results = join_all(runs).await;

        let mut candidates = Vec::with_capacity(results.len());
        let mut attempts = Vec::with_capacity(results.len());
        for (candidate, attempt) in results {
            if let Some(candidate) = candidate {
                candidates.push(candidate);
            }
            attempts.push(attempt);
        }

        let outcome = PipelineOutcome {
            candidates,
            attempts,
            duration: start.elapsed(),
        };
        info!(
            candidates = outcome.candidates.len(),
            successes = outcome.successes(),
            duration = ?outcome.duration,
            "Candidate pipeline finished"
        );
        outcome
    }
}

impl Default for CandidatePipeline {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_strategy(
    strategy: &dyn FetchStrategy,
    ctx: &FetchContext,
) -> (Option<Candidate>, FetchAttempt) {
    let strategy_id = strategy.id().to_string();
    let source_label = strategy.source_label();
    let kind = strategy.kind();
    let priority = strategy.priority();

    let mut attempt = FetchAttempt {
        strategy_id: strategy_id.clone(),
        source_label: source_label.clone(),
        kind,
        available: false,
        error_kind: None,
        error: None,
        duration: Duration::ZERO,
    };

    if !strategy.is_available(ctx).await {
        debug!(strategy = %strategy_id, "Strategy not available, skipping");
        return (None, attempt);
    }
    attempt.available = true;

    let started = Instant::now();
    let result = ctx.settings.retry.run(|| strategy.fetch(ctx)).await;
    attempt.duration = started.elapsed();

    match result {
        Ok(mut candidate) => {
            debug!(strategy = %strategy_id, duration = ?attempt.duration, "Strategy succeeded");
            if candidate.source_labels.is_empty() {
                candidate.source_labels.push(source_label);
            }
            (Some(candidate), attempt)
        }
        Err(error) => {
            warn!(
                strategy = %strategy_id,
                kind = %error.kind(),
                error = %error,
                "Strategy failed"
            );
            let kind = error.kind();
            let reason = error.to_string();
            attempt.error_kind = Some(kind);
            attempt.error = Some(reason.clone());
            let placeholder = Candidate::unavailable(source_label, priority, kind, reason);
            (Some(placeholder), attempt)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
