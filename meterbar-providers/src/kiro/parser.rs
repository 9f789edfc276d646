//! Kiro CLI output parser.
//!
//! `kiro-cli usage --format json` prints one object. Older builds nest the
//! credit figures under `credits`; both layouts are accepted.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use meterbar_core::{Candidate, UsageModel, keys};

use super::error::KiroError;

// ============================================================================
// JSON Structures
// ============================================================================

/// Kiro usage output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KiroUsageResponse {
    /// Plan name (e.g. "Pro", "Free").
    pub plan_name: Option<String>,
    /// Credits used this cycle.
    pub credits_used: Option<f64>,
    /// Credits available this cycle.
    pub credits_total: Option<f64>,
    /// Bonus credits left.
    pub bonus_credits_remaining: Option<f64>,
    /// When credits reset.
    pub resets_at: Option<DateTime<Utc>>,
    /// Logged-in user.
    #[serde(default)]
    pub user: Option<KiroUser>,
    /// Nested credits object (older layout).
    #[serde(default)]
    pub credits: Option<KiroCredits>,
}

/// Nested credits object.
#[derive(Debug, Deserialize)]
pub struct KiroCredits {
    /// Credits used.
    pub used: Option<f64>,
    /// Credits available.
    pub total: Option<f64>,
}

/// User info.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KiroUser {
    /// Account email.
    pub email: Option<String>,
    /// Account id.
    pub user_id: Option<String>,
    /// Plan name.
    pub plan: Option<String>,
}

impl KiroUsageResponse {
    /// Returns `(used, total)`, preferring the flat fields.
    pub fn credits(&self) -> Option<(f64, f64)> {
        match (self.credits_used, self.credits_total) {
            (Some(used), Some(total)) => Some((used, total)),
            _ => {
                let nested = self.credits.as_ref()?;
                Some((nested.used?, nested.total?))
            }
        }
    }

    /// Returns the plan name from either location.
    pub fn plan(&self) -> Option<&str> {
        self.plan_name
            .as_deref()
            .or_else(|| self.user.as_ref()?.plan.as_deref())
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses CLI stdout into a candidate.
///
/// # Errors
///
/// Returns [`KiroError::Parse`] for non-JSON output and [`KiroError::NoData`]
/// when the credit figures are missing or inconsistent.
pub fn parse_kiro_output(stdout: &str, priority: i32, label: &str) -> Result<Candidate, KiroError> {
    debug!(len = stdout.len(), "Parsing kiro-cli output");
    let response: KiroUsageResponse = serde_json::from_str(stdout.trim())?;

    let (used, total) = response.credits().ok_or(KiroError::NoData)?;
    let usage = UsageModel::quota(total - used, total, false).map_err(|_| KiroError::NoData)?;
    let usage = match response.resets_at {
        Some(at) => usage.with_resets_at(at),
        None => usage,
    };

    let mut candidate = Candidate::new(usage, priority, label).with_detail(keys::LOGIN_METHOD, "cli");
    if let Some(plan) = response.plan() {
        candidate.details.insert(keys::PLAN, plan);
    }
    if let Some(bonus) = response.bonus_credits_remaining {
        candidate.details.insert("bonus_credits_remaining", bonus);
    }
    if let Some(user) = response.user {
        candidate.email = user.email;
        candidate.account_id = user.user_id;
    }
    Ok(candidate)
}

/// Returns true if CLI output says nobody is logged in.
pub fn is_not_logged_in(output: &str) -> bool {
    let lower = output.to_lowercase();
    lower.contains("not logged in") || lower.contains("login required")
}

// ============================================================================
// Tests
// ============================================================================
