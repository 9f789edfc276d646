//! Mapping a JSON usage document onto a candidate.
//!
//! Each JSON-API provider describes where its numbers live with
//! [JSON pointers](https://www.rfc-editor.org/rfc/rfc6901). Numbers may be
//! JSON numbers or strings such as `"$1,234.50"`; timestamps may be RFC 3339
//! strings or Unix seconds/milliseconds.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use meterbar_core::{Candidate, UsageModel, keys};
use meterbar_fetch::FetchError;

/// Unix timestamps above this are taken to be milliseconds.
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

// ============================================================================
// Usage Shape
// ============================================================================

/// Where the usage numbers live and which model they form.
#[derive(Debug, Clone, Copy)]
pub enum UsageShape {
    /// A capped pool. Needs `total` plus either `remaining` or `used`.
    Quota {
        /// Pointer to the units left.
        remaining: Option<&'static str>,
        /// Pointer to the units consumed.
        used: Option<&'static str>,
        /// Pointer to the pool size.
        total: &'static str,
        /// Whether usage past the pool is billed.
        overage_permitted: bool,
    },
    /// A pool reported only as a used percentage out of 100.
    Percent {
        /// Pointer to the used percentage.
        used_percent: &'static str,
    },
    /// Metered spend. Needs `utilization` or `cost`.
    Metered {
        /// Pointer to the budget utilization in percent.
        utilization: Option<&'static str>,
        /// Pointer to the spend in USD.
        cost: Option<&'static str>,
        /// Pointer to the budget; utilization is derived from it when absent.
        budget: Option<&'static str>,
    },
}

// ============================================================================
// Usage Mapping
// ============================================================================

/// Pointers into a provider's usage document.
#[derive(Debug, Clone, Copy)]
pub struct UsageMapping {
    /// The usage numbers.
    pub shape: UsageShape,
    /// Reset or billing-cycle end time.
    pub resets_at: Option<&'static str>,
    /// Stable account id.
    pub account_id: Option<&'static str>,
    /// Account email.
    pub email: Option<&'static str>,
    /// Plan name.
    pub plan: Option<&'static str>,
    /// Organization name.
    pub organization: Option<&'static str>,
}

impl UsageMapping {
    /// Creates a mapping with only the usage numbers.
    pub const fn new(shape: UsageShape) -> Self {
        Self {
            shape,
            resets_at: None,
            account_id: None,
            email: None,
            plan: None,
            organization: None,
        }
    }

    /// Sets the reset pointer.
    #[must_use]
    pub const fn resets_at(mut self, pointer: &'static str) -> Self {
        self.resets_at = Some(pointer);
        self
    }

    /// Sets the account id and email pointers.
    #[must_use]
    pub const fn identity(mut self, account_id: &'static str, email: &'static str) -> Self {
        self.account_id = Some(account_id);
        self.email = Some(email);
        self
    }

    /// Sets the plan pointer.
    #[must_use]
    pub const fn plan(mut self, pointer: &'static str) -> Self {
        self.plan = Some(pointer);
        self
    }

    /// Sets the organization pointer.
    #[must_use]
    pub const fn organization(mut self, pointer: &'static str) -> Self {
        self.organization = Some(pointer);
        self
    }

    /// Reads the usage model out of `doc`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidResponse`] when a required number is
    /// missing and [`FetchError::Core`] when the numbers violate the model's
    /// invariants.
    pub fn usage(&self, doc: &Value) -> Result<UsageModel, FetchError> {
        let usage = match self.shape {
            UsageShape::Quota {
                remaining,
                used,
                total,
                overage_permitted,
            } => {
                let total = require_number(doc, total)?;
                let remaining = match (remaining.and_then(|p| number_at(doc, p)), used) {
                    (Some(remaining), _) => remaining,
                    (None, Some(used)) => total - require_number(doc, used)?,
                    (None, None) => {
                        return Err(FetchError::InvalidResponse(
                            "no remaining or used figure in usage document".to_string(),
                        ));
                    }
                };
                UsageModel::quota(remaining, total, overage_permitted)?
            }
            UsageShape::Percent { used_percent } => {
                let used = require_number(doc, used_percent)?.clamp(0.0, 100.0);
                UsageModel::quota(100.0 - used, 100.0, false)?
            }
            UsageShape::Metered {
                utilization,
                cost,
                budget,
            } => {
                let cost = cost.and_then(|p| number_at(doc, p));
                let utilization = match utilization.and_then(|p| number_at(doc, p)) {
                    Some(utilization) => Some(utilization),
                    None => match (cost, budget.and_then(|p| number_at(doc, p))) {
                        (Some(cost), Some(budget)) if budget > 0.0 => Some(cost / budget * 100.0),
                        _ => None,
                    },
                };
                if utilization.is_none() && cost.is_none() {
                    return Err(FetchError::InvalidResponse(
                        "no utilization or cost figure in usage document".to_string(),
                    ));
                }
                UsageModel::pay_as_you_go(utilization.unwrap_or(0.0), cost)?
            }
        };

        Ok(match self.resets_at.and_then(|p| timestamp_at(doc, p)) {
            Some(at) => usage.with_resets_at(at),
            None => usage,
        })
    }

    /// Builds a candidate from `doc`.
    ///
    /// # Errors
    ///
    /// See [`UsageMapping::usage`].
    pub fn candidate(
        &self,
        doc: &Value,
        priority: i32,
        label: &str,
        login_method: &str,
    ) -> Result<Candidate, FetchError> {
        let mut candidate = Candidate::new(self.usage(doc)?, priority, label)
            .with_detail(keys::LOGIN_METHOD, login_method);

        candidate.account_id = self.account_id.and_then(|p| text_at(doc, p));
        candidate.email = self.email.and_then(|p| text_at(doc, p));
        if let Some(plan) = self.plan.and_then(|p| text_at(doc, p)) {
            candidate.details.insert(keys::PLAN, plan);
        }
        if let Some(org) = self.organization.and_then(|p| text_at(doc, p)) {
            candidate.details.insert(keys::ORGANIZATION, org);
        }
        Ok(candidate)
    }
}

// ============================================================================
// Value Helpers
// ============================================================================

fn require_number(doc: &Value, pointer: &str) -> Result<f64, FetchError> {
    number_at(doc, pointer)
        .ok_or_else(|| FetchError::InvalidResponse(format!("missing number at {pointer}")))
}

/// Reads a number, accepting numeric strings with `$` and thousands separators.
pub fn number_at(doc: &Value, pointer: &str) -> Option<f64> {
    match doc.pointer(pointer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_amount(s),
        _ => None,
    }
}

/// Parses `"$1,234.50"`, `"1,234"` or `"12.5"`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok().filter(|v: &f64| v.is_finite())
}

/// Reads a non-empty string; numbers are rendered as text.
pub fn text_at(doc: &Value, pointer: &str) -> Option<String> {
    match doc.pointer(pointer)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reads an RFC 3339 string or a Unix timestamp in seconds or milliseconds.
pub fn timestamp_at(doc: &Value, pointer: &str) -> Option<DateTime<Utc>> {
    match doc.pointer(pointer)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => {
            let ts = n.as_i64()?;
            let secs = if ts > MILLIS_THRESHOLD { ts / 1000 } else { ts };
            Utc.timestamp_opt(secs, 0).single()
        }
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use meterbar_core::ErrorKind;
    use serde_json::json;

    const QUOTA: UsageMapping = UsageMapping::new(UsageShape::Quota {
        remaining: None,
        used: Some("/usage/used"),
        total: "/usage/limit",
        overage_permitted: false,
    })
    .resets_at("/usage/resets_at")
    .identity("/account/id", "/account/email")
    .plan("/account/plan");

    const METERED: UsageMapping = UsageMapping::new(UsageShape::Metered {
        utilization: None,
        cost: Some("/data/usage"),
        budget: Some("/data/limit"),
    });

    #[test]
    fn test_quota_from_used() {
        let doc = json!({
            "usage": {"used": 250, "limit": 1000, "resets_at": "2026-11-01T00:00:00Z"},
            "account": {"id": 42, "email": "dev@example.com", "plan": "pro"}
        });
        let candidate = QUOTA.candidate(&doc, 60, "env:X", "api_key").unwrap();

        assert_eq!(candidate.usage.used_percent(), Some(25.0));
        assert!(candidate.usage.resets_at().is_some());
        assert_eq!(candidate.account_id.as_deref(), Some("42"));
        assert_eq!(candidate.email.as_deref(), Some("dev@example.com"));
        assert_eq!(candidate.details.text(keys::PLAN), Some("pro"));
        assert_eq!(candidate.details.text(keys::LOGIN_METHOD), Some("api_key"));
    }

    #[test]
    fn test_quota_missing_numbers_is_decoding() {
        let err = QUOTA.usage(&json!({"usage": {"limit": 10}})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[test]
    fn test_quota_invariant_violation_is_decoding() {
        let doc = json!({"usage": {"used": -5, "limit": 10}});
        let err = QUOTA.usage(&doc).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[test]
    fn test_metered_derives_utilization_from_budget() {
        let doc = json!({"data": {"usage": "$12.50", "limit": 50}});
        let usage = METERED.usage(&doc).unwrap();
        assert_eq!(usage.cost(), Some(12.5));
        assert_eq!(usage.used_percent(), Some(25.0));
    }

    #[test]
    fn test_metered_without_budget() {
        let doc = json!({"data": {"usage": 3.0, "limit": null}});
        let usage = METERED.usage(&doc).unwrap();
        assert_eq!(usage.cost(), Some(3.0));
    }

    #[test]
    fn test_percent_shape() {
        let mapping = UsageMapping::new(UsageShape::Percent {
            used_percent: "/five_hour/utilization",
        });
        let usage = mapping.usage(&json!({"five_hour": {"utilization": 37.5}})).unwrap();
        assert_eq!(usage.used_percent(), Some(37.5));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.50"), Some(1234.5));
        assert_eq!(parse_amount("17"), Some(17.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn test_timestamp_seconds_and_millis() {
        let doc = json!({"s": 1_767_225_600, "ms": 1_767_225_600_000_i64});
        assert_eq!(timestamp_at(&doc, "/s"), timestamp_at(&doc, "/ms"));
        assert!(timestamp_at(&doc, "/s").is_some());
    }
}
