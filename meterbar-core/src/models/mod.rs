//! Domain models for `MeterBar`.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider kinds and categories
//! - [`usage`] - The usage reading union
//! - [`candidate`] - Candidates, details, provider and cycle results
//! - [`cost`] - Daily cost samples and projections

mod candidate;
mod cost;
mod provider;
mod usage;

pub use candidate::{
    Candidate, DetailValue, Details, FetchResult, ProviderOutcome, ProviderResult, keys,
};
pub use cost::{Confidence, DailySample, ModelUsage, Projection};
pub use provider::{ProviderCategory, ProviderKind};
pub use usage::UsageModel;
