//! End-of-month cost projection.
//!
//! Forecasts a pay-as-you-go provider's month-end spend from an incomplete
//! daily series:
//!
//! ```text
//! predicted = current_month_total + weighted_avg_daily_cost * remaining_days
//! ```
//!
//! The average only covers days that actually have samples. Missing days
//! are never zero-filled; the weights realign to whatever dates exist.
//! `remaining_days` counts today, since today's spend is still accruing.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::models::{Confidence, DailySample, Projection};

/// Default look-back window in days.
pub const DEFAULT_LOOKBACK_DAYS: usize = 7;

// ============================================================================
// Errors
// ============================================================================

/// Invalid projection settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// Look-back window of zero days.
    #[error("lookback window must be at least one day")]
    EmptyLookback,

    /// Weight vector length differs from the window.
    #[error("expected {expected} weights, got {actual}")]
    WeightCountMismatch {
        /// Window length.
        expected: usize,
        /// Weights supplied.
        actual: usize,
    },

    /// Negative or non-finite weight.
    #[error("weight {index} is invalid: {value}")]
    InvalidWeight {
        /// Position in the vector.
        index: usize,
        /// Offending value.
        value: f64,
    },

    /// The most recent day carries no weight.
    #[error("the most recent day must have a positive weight")]
    ZeroLeadingWeight,
}

// ============================================================================
// Configuration
// ============================================================================

/// Look-back window and recency weights.
///
/// `weights[0]` applies to the most recent sampled date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProjectionConfigFields")]
pub struct ProjectionConfig {
    lookback_days: usize,
    weights: Vec<f64>,
}

#[derive(Deserialize)]
struct ProjectionConfigFields {
    lookback_days: usize,
    weights: Vec<f64>,
}

impl TryFrom<ProjectionConfigFields> for ProjectionConfig {
    type Error = ProjectionError;

    fn try_from(fields: ProjectionConfigFields) -> Result<Self, Self::Error> {
        Self::new(fields.lookback_days, fields.weights)
    }
}

impl ProjectionConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ProjectionError`] if the window is empty, the weight count
    /// does not match, a weight is negative or non-finite, or `weights[0]`
    /// is zero.
    pub fn new(lookback_days: usize, weights: Vec<f64>) -> Result<Self, ProjectionError> {
        if lookback_days == 0 {
            return Err(ProjectionError::EmptyLookback);
        }
        if weights.len() != lookback_days {
            return Err(ProjectionError::WeightCountMismatch {
                expected: lookback_days,
                actual: weights.len(),
            });
        }
        if let Some((index, &value)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(ProjectionError::InvalidWeight { index, value });
        }
        if weights[0] <= 0.0 {
            return Err(ProjectionError::ZeroLeadingWeight);
        }
        Ok(Self {
            lookback_days,
            weights,
        })
    }

    /// Equal weights over `days` (at least one).
    pub fn uniform(days: usize) -> Self {
        let days = days.max(1);
        Self {
            lookback_days: days,
            weights: vec![1.0; days],
        }
    }

    /// Linear recency taper over `days`: the most recent day weighs `days`,
    /// the oldest weighs 1.
    #[allow(clippy::cast_precision_loss)]
    pub fn tapered(days: usize) -> Self {
        let days = days.max(1);
        Self {
            lookback_days: days,
            weights: (1..=days).rev().map(|w| w as f64).collect(),
        }
    }

    /// Window length in days.
    pub fn lookback_days(&self) -> usize {
        self.lookback_days
    }

    /// Weights, most recent first.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self::tapered(DEFAULT_LOOKBACK_DAYS)
    }
}

// ============================================================================
// Projection
// ============================================================================

/// Merges samples from any number of series, summing costs per date.
///
/// Output is sorted by date.
pub fn aggregate_by_date<'a>(samples: impl IntoIterator<Item = &'a DailySample>) -> Vec<DailySample> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for sample in samples {
        *by_date.entry(sample.date).or_insert(0.0) += sample.cost;
    }
    by_date
        .into_iter()
        .map(|(date, cost)| DailySample { date, cost })
        .collect()
}

/// Projects month-end cost as of `today`.
///
/// Samples dated after `today` are ignored. Returns `None` when no sample
/// remains, so an empty series never reads as zero spend.
pub fn project(
    samples: &[DailySample],
    today: NaiveDate,
    config: &ProjectionConfig,
) -> Option<Projection> {
    let series = aggregate_by_date(samples.iter().filter(|s| s.date <= today));
    if series.is_empty() {
        return None;
    }

    let chosen: Vec<&DailySample> = series.iter().rev().take(config.lookback_days).collect();

    let (weighted_sum, weight_total) = chosen
        .iter()
        .zip(&config.weights)
        .fold((0.0, 0.0), |(sum, total), (sample, weight)| {
            (sum + sample.cost * weight, total + weight)
        });
    // weights[0] > 0 and at least one date was chosen
    let weighted_avg_daily_cost = weighted_sum / weight_total;

    let current_month_total: f64 = series
        .iter()
        .filter(|s| s.date.year() == today.year() && s.date.month() == today.month())
        .map(|s| s.cost)
        .sum();

    let remaining_days = days_in_month(today) - today.day() + 1;
    let predicted_eom = current_month_total + weighted_avg_daily_cost * f64::from(remaining_days);

    Some(Projection {
        predicted_eom,
        confidence: coverage(&chosen, today, config.lookback_days),
        current_month_total,
        weighted_avg_daily_cost,
        remaining_days,
        days_with_data: chosen.len(),
    })
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn coverage(chosen: &[&DailySample], today: NaiveDate, lookback_days: usize) -> Confidence {
    let window_start = today - Duration::days(lookback_days as i64 - 1);
    let in_window = chosen.iter().filter(|s| s.date >= window_start).count();
    Confidence::from_coverage(in_window as f64 / lookback_days as f64)
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .map_or(31, |last| last.day())
}

// ============================================================================
// Tests
// ============================================================================
