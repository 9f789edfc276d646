//! GitHub billing documents for Copilot premium requests.
//!
//! Three documents are involved:
//!
//! - the billing settings page, scraped for the numeric customer id;
//! - the usage card, the current period's premium-request totals;
//! - the usage table, paged per-day rows with an optional per-model subtable.

use chrono::NaiveDate;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use meterbar_core::{Candidate, DailySample, ModelUsage, UsageModel, keys};
use meterbar_fetch::{FetchError, HistoryPage};

use super::error::CopilotError;
use crate::json_api::parse_amount;

/// Date formats seen in the usage table.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%b %d, %Y", "%B %d, %Y"];

/// Cells a daily row must carry.
const ROW_CELLS: usize = 5;

// ============================================================================
// Customer Id
// ============================================================================

static CUSTOMER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""customerId":\s*(\d+)"#).expect("valid customer id pattern"));

/// Finds the billing customer id in the settings page.
///
/// # Errors
///
/// Returns [`CopilotError::CustomerIdNotFound`] if the page has none.
pub fn find_customer_id(html: &str) -> Result<String, CopilotError> {
    CUSTOMER_ID
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or(CopilotError::CustomerIdNotFound)
}

/// Returns the `dotcom_user` login from a cookie header.
pub fn login_from_cookies(cookies: &str) -> Option<String> {
    cookies.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == "dotcom_user" && !value.is_empty()).then(|| value.to_string())
    })
}

// ============================================================================
// Usage Card
// ============================================================================

/// Current-period premium request totals.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageCard {
    /// Billed requests.
    pub net_quantity: f64,
    /// Requests covered by the plan.
    pub discount_quantity: f64,
    /// Premium requests included in the plan.
    pub user_premium_request_entitlement: f64,
    /// Add-on spend in USD.
    pub net_billed_amount: f64,
    /// Plan name, when reported.
    pub plan: Option<String>,
}

impl UsageCard {
    /// Requests consumed this period.
    pub fn used(&self) -> f64 {
        self.net_quantity + self.discount_quantity
    }

    /// Maps the card onto a reading.
    ///
    /// With an entitlement the pool is quota-based with overage billed;
    /// without one the spend is pay-as-you-go.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Core`] for negative or non-finite figures.
    pub fn usage(&self) -> Result<UsageModel, FetchError> {
        let entitlement = self.user_premium_request_entitlement;
        let usage = if entitlement > 0.0 {
            UsageModel::quota(entitlement - self.used(), entitlement, true)?
        } else {
            UsageModel::pay_as_you_go(0.0, Some(self.net_billed_amount))?
        };
        Ok(usage)
    }

    /// Builds a candidate from the card.
    ///
    /// # Errors
    ///
    /// See [`UsageCard::usage`].
    pub fn candidate(&self, priority: i32, label: &str) -> Result<Candidate, FetchError> {
        let mut candidate = Candidate::new(self.usage()?, priority, label)
            .with_detail(keys::LOGIN_METHOD, "web_session")
            .with_detail("billed_amount", self.net_billed_amount);
        if let Some(plan) = &self.plan {
            candidate.details.insert(keys::PLAN, plan.as_str());
        }
        Ok(candidate)
    }
}

// ============================================================================
// Usage Table
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct TableDocument {
    #[serde(default)]
    table: Table,
}

#[derive(Debug, Default, Deserialize)]
struct Table {
    #[serde(default)]
    rows: Vec<Row>,
}

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(default)]
    cells: Vec<Cell>,
    #[serde(default)]
    subtable: Option<Table>,
}

#[derive(Debug, Deserialize)]
struct Cell {
    #[serde(default)]
    value: Value,
}

impl Cell {
    fn text(&self) -> Option<&str> {
        self.value.as_str().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Reads a numeric cell. Blank cells count as zero.
    fn amount(&self) -> Result<f64, CopilotError> {
        let amount = match &self.value {
            Value::Null => Some(0.0),
            Value::Number(n) => n.as_f64(),
            Value::String(s) if s.trim().is_empty() => Some(0.0),
            Value::String(s) => parse_amount(s),
            _ => None,
        };
        amount.ok_or_else(|| CopilotError::InvalidTable(format!("unreadable amount: {}", self.value)))
    }
}

/// Parses a table date.
///
/// # Errors
///
/// Returns [`CopilotError::InvalidDate`] if no known format matches.
pub fn parse_table_date(text: &str) -> Result<NaiveDate, CopilotError> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .ok_or_else(|| CopilotError::InvalidDate(text.to_string()))
}

/// Parses one page of the usage table.
///
/// Rows with fewer than five cells are skipped. Rows sharing a date are
/// summed into one sample, and per-model subtable rows are summed by model
/// name across the page.
///
/// # Errors
///
/// Returns [`FetchError::Json`] for a malformed document, and a
/// [`CopilotError`] for unparseable dates, unreadable amounts or negative
/// amounts.
pub fn parse_usage_table(body: &str) -> Result<HistoryPage, FetchError> {
    let doc: TableDocument = serde_json::from_str(body)?;
    let mut daily: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut models: BTreeMap<String, ModelUsage> = BTreeMap::new();

    for row in &doc.table.rows {
        if row.cells.len() < ROW_CELLS {
            debug!(cells = row.cells.len(), "Skipping short row");
            continue;
        }
        let date_text = row.cells[0]
            .text()
            .ok_or_else(|| CopilotError::InvalidTable("row without a date".to_string()))?;
        let date = parse_table_date(date_text)?;
        *daily.entry(date).or_default() += row.cells[4].amount()?;

        let Some(subtable) = &row.subtable else {
            continue;
        };
        for model_row in &subtable.rows {
            if model_row.cells.len() < ROW_CELLS {
                continue;
            }
            let Some(name) = model_row.cells[0].text() else {
                warn!("Skipping unnamed model row");
                continue;
            };
            let entry = models.entry(name.to_string()).or_insert_with(|| ModelUsage {
                model: name.to_string(),
                included_requests: 0.0,
                billed_requests: 0.0,
                billed_amount: 0.0,
            });
            entry.included_requests += model_row.cells[1].amount()?;
            entry.billed_requests += model_row.cells[2].amount()?;
            entry.billed_amount += model_row.cells[4].amount()?;
        }
    }

    let samples = daily
        .into_iter()
        .map(|(date, cost)| DailySample::new(date, cost))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(days = samples.len(), models = models.len(), "Parsed usage table page");
    Ok(HistoryPage {
        samples,
        models: models.into_values().collect(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use meterbar_core::ErrorKind;

    #[test]
    fn test_find_customer_id() {
        let html = r#"<script>{"props":{"customerId": 4815162342,"plan":"pro"}}</script>"#;
        assert_eq!(find_customer_id(html).unwrap(), "4815162342");
        assert!(matches!(
            find_customer_id("<html>sign in</html>"),
            Err(CopilotError::CustomerIdNotFound)
        ));
    }

    #[test]
    fn test_login_from_cookies() {
        let cookies = "user_session=abc; dotcom_user=octocat; logged_in=yes";
        assert_eq!(login_from_cookies(cookies).as_deref(), Some("octocat"));
        assert_eq!(login_from_cookies("user_session=abc"), None);
    }

    #[test]
    fn test_card_with_entitlement() {
        let card: UsageCard = serde_json::from_str(
            r#"{"netQuantity": 40, "discountQuantity": 300, "userPremiumRequestEntitlement": 300, "netBilledAmount": 1.6}"#,
        )
        .unwrap();

        assert_eq!(card.used(), 340.0);
        assert_eq!(card.usage().unwrap(), UsageModel::quota(-40.0, 300.0, true).unwrap());
    }

    #[test]
    fn test_card_without_entitlement_is_metered() {
        let card: UsageCard =
            serde_json::from_str(r#"{"netQuantity": 12, "netBilledAmount": 0.48}"#).unwrap();
        let candidate = card.candidate(40, "cookie").unwrap();

        assert_eq!(candidate.usage.cost(), Some(0.48));
        assert_eq!(candidate.details.number("billed_amount"), Some(0.48));
    }

    #[test]
    fn test_table_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 10, 3).unwrap();
        assert_eq!(parse_table_date("2026-10-03").unwrap(), expected);
        assert_eq!(parse_table_date("Oct 03, 2026").unwrap(), expected);
        assert_eq!(parse_table_date("October 3, 2026").unwrap(), expected);
        assert!(parse_table_date("03/10/2026").is_err());
    }

    #[test]
    fn test_parse_usage_table() {
        let body = r#"{"table": {"rows": [
            {"cells": [{"value": "Oct 01, 2026"}, {"value": "10"}, {"value": "2"}, {"value": "$0.48"}, {"value": "$1,234.50"}],
             "subtable": {"rows": [
                {"cells": [{"value": "Claude Sonnet"}, {"value": 6}, {"value": 2}, {"value": "$0.08"}, {"value": "$0.08"}]},
                {"cells": [{"value": "GPT-5"}, {"value": 4}, {"value": 0}, {"value": "$0"}, {"value": "$0"}]}
             ]}},
            {"cells": [{"value": "Oct 02, 2026"}, {"value": "1"}]},
            {"cells": [{"value": "2026-10-02"}, {"value": 3}, {"value": 1}, {"value": 0.04}, {"value": 0.04}],
             "subtable": {"rows": [
                {"cells": [{"value": "Claude Sonnet"}, {"value": 3}, {"value": 1}, {"value": 0.04}, {"value": 0.04}]}
             ]}}
        ]}}"#;
        let page = parse_usage_table(body).unwrap();

        assert_eq!(page.samples.len(), 2);
        assert_eq!(page.samples[0].cost, 1234.5);
        assert_eq!(page.samples[1].date, NaiveDate::from_ymd_opt(2026, 10, 2).unwrap());

        let sonnet = page.models.iter().find(|m| m.model == "Claude Sonnet").unwrap();
        assert_eq!(sonnet.included_requests, 9.0);
        assert_eq!(sonnet.billed_requests, 3.0);
        assert!((sonnet.billed_amount - 0.12).abs() < 1e-9);
        assert_eq!(page.models.len(), 2);
    }

    #[test]
    fn test_empty_table() {
        assert!(parse_usage_table(r#"{"table": {"rows": []}}"#).unwrap().is_empty());
        assert!(parse_usage_table("{}").unwrap().is_empty());
    }

    #[test]
    fn test_bad_date_is_decoding_error() {
        let body = r#"{"table": {"rows": [{"cells": [{"value": "yesterday"}, {"value": 1}, {"value": 1}, {"value": 1}, {"value": 1}]}]}}"#;
        let err = parse_usage_table(body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
    }

    #[test]
    fn test_unreadable_amount_is_decoding_error() {
        let body = r#"{"table": {"rows": [{"cells": [{"value": "2026-10-01"}, {"value": 1}, {"value": 1}, {"value": 1}, {"value": "n/a"}]}]}}"#;
        let err = parse_usage_table(body).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decoding);
        assert!(err.to_string().contains("n/a"), "{err}");

        let model_body = r#"{"table": {"rows": [{"cells": [{"value": "2026-10-01"}, {"value": 1}, {"value": 1}, {"value": 1}, {"value": 1}],
            "subtable": {"rows": [{"cells": [{"value": "GPT-5"}, {"value": "lots"}, {"value": 0}, {"value": 0}, {"value": 0}]}]}}]}}"#;
        assert_eq!(parse_usage_table(model_body).unwrap_err().kind(), ErrorKind::Decoding);
    }

    #[test]
    fn test_blank_amount_is_zero() {
        let body = r#"{"table": {"rows": [{"cells": [{"value": "2026-10-01"}, {"value": 1}, {"value": 1}, {"value": null}, {"value": ""}]}]}}"#;
        let page = parse_usage_table(body).unwrap();
        assert_eq!(page.samples[0].cost, 0.0);
    }

    #[test]
    fn test_rows_sharing_a_date_are_summed() {
        let body = r#"{"table": {"rows": [
            {"cells": [{"value": "2026-10-01"}, {"value": 1}, {"value": 0}, {"value": 0}, {"value": "$1.25"}]},
            {"cells": [{"value": "Oct 01, 2026"}, {"value": 1}, {"value": 0}, {"value": 0}, {"value": "$0.75"}]},
            {"cells": [{"value": "2026-10-02"}, {"value": 1}, {"value": 0}, {"value": 0}, {"value": 3}]}
        ]}}"#;
        let page = parse_usage_table(body).unwrap();

        assert_eq!(page.samples.len(), 2);
        assert_eq!(page.samples[0].date, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(page.samples[0].cost, 2.0);
        assert_eq!(page.samples[1].cost, 3.0);
    }
}
