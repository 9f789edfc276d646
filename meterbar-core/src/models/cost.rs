//! Cost tracking types.
//!
//! This module contains types for tracking metered spend:
//! - [`DailySample`] - One day's cost for one provider
//! - [`ModelUsage`] - Per-model request totals from billing history
//! - [`Projection`] - End-of-month forecast
//! - [`Confidence`] - Coarse data-coverage hint for a projection

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

// ============================================================================
// Daily Sample
// ============================================================================

/// One day's observed cost in USD.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailySample {
    /// Calendar date (local).
    pub date: NaiveDate,
    /// Cost for that day.
    pub cost: f64,
}

impl DailySample {
    /// Creates a sample.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` for a negative or non-finite cost.
    pub fn new(date: NaiveDate, cost: f64) -> Result<Self, CoreError> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(CoreError::InvalidData(format!(
                "daily cost {cost} on {date} must be a non-negative number"
            )));
        }
        Ok(Self { date, cost })
    }
}

// ============================================================================
// Model Usage
// ============================================================================

/// Per-model request totals over a history range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    /// Model name as reported by the vendor.
    pub model: String,
    /// Requests covered by the plan.
    pub included_requests: f64,
    /// Requests billed beyond the plan.
    pub billed_requests: f64,
    /// Billed amount in USD.
    pub billed_amount: f64,
}

impl ModelUsage {
    /// Returns all requests for the model.
    pub fn total_requests(&self) -> f64 {
        self.included_requests + self.billed_requests
    }
}

// ============================================================================
// Projection
// ============================================================================

/// How much of the look-back window actually had data.
///
/// Display hint only; never used in the arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Under 40% coverage.
    Low,
    /// 40% up to 80% coverage.
    Medium,
    /// At least 80% coverage.
    High,
}

impl Confidence {
    /// Classifies a coverage ratio in `0.0..=1.0`.
    pub fn from_coverage(ratio: f64) -> Self {
        if ratio >= 0.8 {
            Self::High
        } else if ratio >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// End-of-month cost forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Predicted cumulative cost at month end.
    pub predicted_eom: f64,
    /// Coverage hint.
    pub confidence: Confidence,
    /// Sum of samples within the current calendar month.
    pub current_month_total: f64,
    /// Weighted average over the chosen look-back dates.
    pub weighted_avg_daily_cost: f64,
    /// Days still ahead in the month, today included.
    pub remaining_days: u32,
    /// Distinct dates that fed the average.
    pub days_with_data: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_sample_rejects_negative_cost() {
        let date = NaiveDate::from_ymd_opt(2026, 5, 3).unwrap();
        assert!(DailySample::new(date, -0.01).is_err());
        assert!(DailySample::new(date, f64::NAN).is_err());
        assert!(DailySample::new(date, 0.0).is_ok());
    }

    #[test]
    fn test_confidence_thresholds() {
        assert_eq!(Confidence::from_coverage(1.0), Confidence::High);
        assert_eq!(Confidence::from_coverage(0.8), Confidence::High);
        assert_eq!(Confidence::from_coverage(0.5), Confidence::Medium);
        assert_eq!(Confidence::from_coverage(0.1), Confidence::Low);
    }
}
