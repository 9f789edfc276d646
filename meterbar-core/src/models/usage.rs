//! Usage-related types.
//!
//! A reading is either a capped, periodically-resetting pool
//! ([`UsageModel::QuotaBased`]) or unbounded metered spend
//! ([`UsageModel::PayAsYouGo`]). [`UsageModel::Unavailable`] is the
//! placeholder a failed credential source leaves behind; it is never a zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, ErrorKind};

/// Tolerance used when comparing measured quantities.
const QUANTITY_EPSILON: f64 = 1e-9;

// ============================================================================
// Usage Model
// ============================================================================

/// One measured usage reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UsageModel {
    /// A capped pool: `remaining` out of `total`.
    QuotaBased {
        /// Units left in the pool. Negative only when overage is permitted.
        remaining: f64,
        /// Pool size.
        total: f64,
        /// Whether usage beyond the pool is billed instead of blocked.
        overage_permitted: bool,
        /// When the pool resets.
        #[serde(default)]
        resets_at: Option<DateTime<Utc>>,
    },
    /// Metered spend within a billing cycle.
    PayAsYouGo {
        /// Utilization of any soft budget, in percent.
        utilization_percent: f64,
        /// Spend so far in USD.
        #[serde(default)]
        cost: Option<f64>,
        /// When the billing cycle resets.
        #[serde(default)]
        resets_at: Option<DateTime<Utc>>,
    },
    /// No reading: the credential source behind this candidate failed.
    Unavailable {
        /// How the source failed.
        kind: ErrorKind,
        /// Why the source produced nothing.
        reason: String,
    },
}

impl UsageModel {
    /// Creates a validated quota-based reading.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` when a number is not finite, the total
    /// is negative, `remaining > total`, or `remaining` is negative without
    /// overage being permitted.
    pub fn quota(remaining: f64, total: f64, overage_permitted: bool) -> Result<Self, CoreError> {
        if !remaining.is_finite() || !total.is_finite() {
            return Err(CoreError::InvalidData(
                "quota values must be finite numbers".to_string(),
            ));
        }
        if total < 0.0 {
            return Err(CoreError::InvalidData(format!("quota total {total} is negative")));
        }
        if remaining > total {
            return Err(CoreError::InvalidData(format!(
                "remaining {remaining} exceeds total {total}"
            )));
        }
        if remaining < 0.0 && !overage_permitted {
            return Err(CoreError::InvalidData(format!(
                "remaining {remaining} is negative but overage is not permitted"
            )));
        }
        Ok(Self::QuotaBased {
            remaining,
            total,
            overage_permitted,
            resets_at: None,
        })
    }

    /// Creates a validated pay-as-you-go reading.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` for negative or non-finite values.
    pub fn pay_as_you_go(utilization_percent: f64, cost: Option<f64>) -> Result<Self, CoreError> {
        if !utilization_percent.is_finite() || utilization_percent < 0.0 {
            return Err(CoreError::InvalidData(format!(
                "utilization {utilization_percent} must be a non-negative number"
            )));
        }
        if let Some(cost) = cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(CoreError::InvalidData(format!(
                    "cost {cost} must be a non-negative number"
                )));
            }
        }
        Ok(Self::PayAsYouGo {
            utilization_percent,
            cost,
            resets_at: None,
        })
    }

    /// Creates the placeholder for a failed credential source.
    pub fn unavailable(kind: ErrorKind, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            kind,
            reason: reason.into(),
        }
    }

    /// Returns the failure kind of a placeholder.
    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Unavailable { kind, .. } => Some(*kind),
            Self::QuotaBased { .. } | Self::PayAsYouGo { .. } => None,
        }
    }

    /// Returns the reading with its reset time set.
    ///
    /// No-op for [`UsageModel::Unavailable`].
    #[must_use]
    pub fn with_resets_at(mut self, at: DateTime<Utc>) -> Self {
        match &mut self {
            Self::QuotaBased { resets_at, .. } | Self::PayAsYouGo { resets_at, .. } => {
                *resets_at = Some(at);
            }
            Self::Unavailable { .. } => {}
        }
        self
    }

    /// Returns true for the failed-source placeholder.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Returns the reset time, if known.
    pub fn resets_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::QuotaBased { resets_at, .. } | Self::PayAsYouGo { resets_at, .. } => *resets_at,
            Self::Unavailable { .. } => None,
        }
    }

    /// Returns the used share in percent, if the reading has one.
    pub fn used_percent(&self) -> Option<f64> {
        match self {
            Self::QuotaBased {
                remaining, total, ..
            } => {
                if *total > 0.0 {
                    Some(((total - remaining) / total) * 100.0)
                } else {
                    None
                }
            }
            Self::PayAsYouGo {
                utilization_percent,
                ..
            } => Some(*utilization_percent),
            Self::Unavailable { .. } => None,
        }
    }

    /// Returns the spend in USD, if the reading carries one.
    pub fn cost(&self) -> Option<f64> {
        match self {
            Self::PayAsYouGo { cost, .. } => *cost,
            _ => None,
        }
    }

    /// Returns true only for a real reading whose numbers say nothing was used.
    ///
    /// An unavailable reading is unknown, not zero.
    pub fn is_confirmed_zero(&self) -> bool {
        match self {
            Self::QuotaBased {
                remaining, total, ..
            } => (total - remaining).abs() < QUANTITY_EPSILON,
            Self::PayAsYouGo {
                utilization_percent,
                cost,
                ..
            } => {
                utilization_percent.abs() < QUANTITY_EPSILON
                    && cost.is_none_or(|c| c.abs() < QUANTITY_EPSILON)
            }
            Self::Unavailable { .. } => false,
        }
    }

    /// Returns true if both readings report the same measured quantities and
    /// the same reset time at whole-second precision.
    ///
    /// Used as the identity fallback for credential sources that expose no
    /// account id. Unavailable readings never match anything.
    pub fn same_reading(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::QuotaBased {
                    remaining: r1,
                    total: t1,
                    overage_permitted: o1,
                    resets_at: a1,
                },
                Self::QuotaBased {
                    remaining: r2,
                    total: t2,
                    overage_permitted: o2,
                    resets_at: a2,
                },
            ) => {
                approx_eq(*r1, *r2) && approx_eq(*t1, *t2) && o1 == o2 && same_second(*a1, *a2)
            }
            (
                Self::PayAsYouGo {
                    utilization_percent: u1,
                    cost: c1,
                    resets_at: a1,
                },
                Self::PayAsYouGo {
                    utilization_percent: u2,
                    cost: c2,
                    resets_at: a2,
                },
            ) => {
                let costs_match = match (c1, c2) {
                    (Some(a), Some(b)) => approx_eq(*a, *b),
                    (None, None) => true,
                    _ => false,
                };
                approx_eq(*u1, *u2) && costs_match && same_second(*a1, *a2)
            }
            _ => false,
        }
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < QUANTITY_EPSILON
}

fn same_second(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.timestamp() == b.timestamp(),
        (None, None) => true,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
