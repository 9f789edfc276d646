// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MeterBar` Core
//!
//! Core types and pure algorithms shared by every other `MeterBar` crate.
//!
//! Nothing in here performs I/O: fetching lives in `meterbar-fetch`,
//! vendor adapters in `meterbar-providers`, persistence in `meterbar-store`.
//!
//! ## Key Types
//!
//! ### Readings
//! - [`ProviderKind`] - Enum of all supported metered services
//! - [`UsageModel`] - Quota-based, pay-as-you-go, or unavailable reading
//! - [`Candidate`] - One credential source's reading for one account
//! - [`Details`] - Sparse typed metadata attached to a candidate
//!
//! ### Results
//! - [`ProviderResult`] - Reconciled accounts for one provider
//! - [`FetchResult`] - Successes and failures of one fetch cycle
//! - [`ErrorKind`] - Four-way failure taxonomy
//!
//! ### Algorithms
//! - [`wire`] - Schema-less decoder for tagged-record binary caches
//! - [`reconcile`] - Merge/dedupe of candidates across credential sources
//! - [`projection`] - Weighted end-of-month cost forecast

pub mod error;
pub mod models;
pub mod projection;
pub mod reconcile;
pub mod wire;

// Re-export error types
pub use error::{CoreError, ErrorKind};

// Re-export all model types
pub use models::{
    // Provider types
    ProviderCategory,
    ProviderKind,
    // Readings
    Candidate,
    DetailValue,
    Details,
    UsageModel,
    keys,
    // Results
    FetchResult,
    ProviderOutcome,
    ProviderResult,
    // Cost tracking
    Confidence,
    DailySample,
    ModelUsage,
    Projection,
};

// Re-export algorithm entry points
pub use projection::{ProjectionConfig, ProjectionError, aggregate_by_date, project};
pub use reconcile::{ReconcileError, ReconcileRules, Reconciler, SourceFailure, reconcile_candidates};
pub use wire::{RawValue, WireError, WireMessage};
