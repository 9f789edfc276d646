//! Candidate and result types.
//!
//! - [`Candidate`] - One credential source's reading for one account
//! - [`Details`] - Sparse auxiliary metadata attached to a candidate
//! - [`ProviderResult`] - A provider's reconciled account list
//! - [`FetchResult`] - The aggregate outcome of one fetch cycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::provider::ProviderKind;
use super::usage::UsageModel;
use crate::error::{CoreError, ErrorKind};

// ============================================================================
// Details
// ============================================================================

/// Well-known detail keys.
pub mod keys {
    /// Plan or subscription name.
    pub const PLAN: &str = "plan";
    /// Organization the account belongs to.
    pub const ORGANIZATION: &str = "organization";
    /// How the credential was obtained (oauth, api_key, cli, local_cache).
    pub const LOGIN_METHOD: &str = "login_method";
    /// Human-readable account label.
    pub const DISPLAY_NAME: &str = "display_name";
}

/// A typed detail value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DetailValue {
    /// Free text.
    Text(String),
    /// A number.
    Number(f64),
    /// A boolean flag.
    Flag(bool),
    /// A point in time.
    Timestamp(DateTime<Utc>),
}

impl From<&str> for DetailValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for DetailValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for DetailValue {
    fn from(value: bool) -> Self {
        Self::Flag(value)
    }
}

impl From<DateTime<Utc>> for DetailValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// Sparse key to typed-value map of auxiliary account metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Details(BTreeMap<String, DetailValue>);

impl Details {
    /// Creates an empty detail map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a value, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<DetailValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the raw value for a key.
    pub fn get(&self, key: &str) -> Option<&DetailValue> {
        self.0.get(key)
    }

    /// Returns a text value.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(DetailValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Returns a numeric value.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(DetailValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Returns a flag value.
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(DetailValue::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    /// Returns a timestamp value.
    pub fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.0.get(key) {
            Some(DetailValue::Timestamp(t)) => Some(*t),
            _ => None,
        }
    }

    /// Copies every key present in `other` but missing here.
    pub fn fill_missing_from(&mut self, other: &Details) {
        for (key, value) in &other.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Returns true if there are no details.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of details.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over all details in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DetailValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// One fetch attempt's reading for one real-world account, pre-reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable account identifier, when the source exposes one.
    pub account_id: Option<String>,
    /// Resolved account email, when known.
    pub email: Option<String>,
    /// The measured usage.
    pub usage: UsageModel,
    /// Auxiliary metadata.
    #[serde(default)]
    pub details: Details,
    /// Priority of the source that produced this reading (higher wins).
    pub source_priority: i32,
    /// Labels of the credential sources that contributed to this entry.
    pub source_labels: Vec<String>,
}

impl Candidate {
    /// Creates a candidate from a single source.
    pub fn new(usage: UsageModel, source_priority: i32, source_label: impl Into<String>) -> Self {
        Self {
            account_id: None,
            email: None,
            usage,
            details: Details::new(),
            source_priority,
            source_labels: vec![source_label.into()],
        }
    }

    /// Creates the placeholder left behind by a failed credential source.
    pub fn unavailable(
        source_label: impl Into<String>,
        source_priority: i32,
        kind: ErrorKind,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(UsageModel::unavailable(kind, reason), source_priority, source_label)
    }

    /// Sets the account id.
    #[must_use]
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    /// Sets the email.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Adds a detail.
    #[must_use]
    pub fn with_detail(mut self, key: &str, value: impl Into<DetailValue>) -> Self {
        self.details.insert(key, value);
        self
    }

    /// Returns the explicit identity key: the account id, else the email
    /// lower-cased.
    pub fn identity_key(&self) -> Option<String> {
        self.account_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| {
                self.email
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_lowercase)
            })
    }

    /// Returns true for the failed-source placeholder.
    pub fn is_unavailable(&self) -> bool {
        self.usage.is_unavailable()
    }

    /// Returns a label suitable for display.
    pub fn display_label(&self) -> String {
        if let Some(name) = self.details.text(keys::DISPLAY_NAME) {
            return name.to_string();
        }
        self.email
            .clone()
            .or_else(|| self.account_id.clone())
            .unwrap_or_else(|| self.source_labels.join(", "))
    }
}

// ============================================================================
// Provider Result
// ============================================================================

/// A provider's reconciled output for one cycle.
///
/// Immutable once produced; `aggregate_usage` and `primary_details` mirror
/// `accounts[0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    /// The provider this result is for.
    pub provider: ProviderKind,
    /// Usage of the primary account.
    pub aggregate_usage: UsageModel,
    /// Details of the primary account.
    pub primary_details: Details,
    /// Reconciled accounts, highest priority first.
    pub accounts: Vec<Candidate>,
    /// When the result was produced.
    pub fetched_at: DateTime<Utc>,
}

impl ProviderResult {
    /// Builds a result from an already reconciled, priority-ordered list.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidData` if the list is empty or its primary
    /// entry is an unavailable placeholder.
    pub fn from_accounts(provider: ProviderKind, accounts: Vec<Candidate>) -> Result<Self, CoreError> {
        let Some(primary) = accounts.first() else {
            return Err(CoreError::InvalidData(format!(
                "{provider} produced no accounts"
            )));
        };
        if primary.is_unavailable() {
            return Err(CoreError::InvalidData(format!(
                "{provider} primary account has no reading"
            )));
        }
        Ok(Self {
            provider,
            aggregate_usage: primary.usage.clone(),
            primary_details: primary.details.clone(),
            accounts,
            fetched_at: Utc::now(),
        })
    }

    /// Returns the primary account.
    pub fn primary(&self) -> &Candidate {
        // from_accounts guarantees at least one entry
        &self.accounts[0]
    }

    /// Returns the number of reconciled accounts.
    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }
}

// ============================================================================
// Fetch Result
// ============================================================================

/// Where a provider stands within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderOutcome {
    /// The provider produced a result.
    Succeeded,
    /// The provider failed with the given kind.
    Failed(ErrorKind),
    /// The provider is neither in the results nor the errors map.
    InFlight,
}

/// The aggregate outcome of one fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    /// Monotonic cycle counter, per orchestrator.
    pub cycle_id: u64,
    /// When the cycle started.
    pub started_at: DateTime<Utc>,
    /// When the cycle finished; `None` while still collecting.
    pub finished_at: Option<DateTime<Utc>>,
    /// Successful providers.
    pub results: BTreeMap<ProviderKind, ProviderResult>,
    /// Failed providers.
    pub errors: BTreeMap<ProviderKind, ErrorKind>,
    /// Providers still running when the cycle deadline elapsed.
    #[serde(default)]
    pub pending: BTreeSet<ProviderKind>,
}

impl FetchResult {
    /// Creates an empty result for a cycle.
    pub fn new(cycle_id: u64) -> Self {
        Self {
            cycle_id,
            started_at: Utc::now(),
            finished_at: None,
            results: BTreeMap::new(),
            errors: BTreeMap::new(),
            pending: BTreeSet::new(),
        }
    }

    /// Records a success, clearing any earlier failure for the provider.
    pub fn record_success(&mut self, result: ProviderResult) {
        self.errors.remove(&result.provider);
        self.pending.remove(&result.provider);
        self.results.insert(result.provider, result);
    }

    /// Records a failure.
    pub fn record_failure(&mut self, provider: ProviderKind, kind: ErrorKind) {
        self.results.remove(&provider);
        self.pending.remove(&provider);
        self.errors.insert(provider, kind);
    }

    /// Returns where a provider stands in this cycle.
    pub fn outcome(&self, provider: ProviderKind) -> ProviderOutcome {
        if self.results.contains_key(&provider) {
            ProviderOutcome::Succeeded
        } else if let Some(kind) = self.errors.get(&provider) {
            ProviderOutcome::Failed(*kind)
        } else {
            ProviderOutcome::InFlight
        }
    }

    /// Returns true once the cycle has been closed.
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
