// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MeterBar` Fetch
//!
//! The provider contract and everything needed to run it.
//!
//! ## Host APIs
//!
//! The [`host`] module wraps the outside world:
//!
//! - [`host::credentials`] - Credential sources handed in by the host
//! - [`host::http`] - HTTP client with tracing and domain allowlist
//! - [`host::process`] - Subprocess execution for CLI tools
//!
//! ## Providers
//!
//! - [`strategy::FetchStrategy`] - One credential source, one candidate
//! - [`pipeline::CandidatePipeline`] - Runs a provider's strategies
//! - [`provider::UsageProvider`] - The contract the orchestrator sees
//! - [`provider::PipelineProvider`] - Pipeline plus reconciliation
//!
//! ## History
//!
//! [`history::HistorySource`] reads paged per-day billing history for the
//! store's backfill task.
//!
//! ## Cycles
//!
//! [`orchestrator::FetchOrchestrator`] runs every enabled provider in its own
//! task, bounds each with a timeout, and publishes one
//! [`FetchResult`](meterbar_core::FetchResult) per cycle.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use meterbar_fetch::{FetchContext, FetchOrchestrator};
//!
//! let orchestrator = FetchOrchestrator::new(Arc::new(FetchContext::new()));
//! let providers = registry.enabled_providers(&settings);
//!
//! if let Some(result) = orchestrator.run_cycle("manual", providers).await {
//!     println!("{} providers reported", result.results.len());
//! }
//! ```

pub mod context;
pub mod error;
pub mod history;
pub mod host;
pub mod orchestrator;
pub mod pipeline;
pub mod provider;
pub mod retry;
pub mod strategy;

// Errors
pub use error::{FetchError, HttpError, ProcessError, status_kind};

// Host APIs
pub use host::{
    credentials::{
        Credential, CredentialChain, CredentialSource, EnvCredentials, Secret, StaticCredentials,
    },
    http::{HttpClient, ResponseExt, ensure_success},
    process::{ProcessOutput, ProcessRunner},
};

// History
pub use history::{DEFAULT_MAX_PAGES, HistoryPage, HistorySource};

// Strategy, pipeline and provider
pub use context::{FetchContext, FetchContextBuilder, FetchSettings};
pub use pipeline::{CandidatePipeline, FetchAttempt, PipelineOutcome};
pub use provider::{PipelineBuilder, PipelineProvider, UsageProvider};
pub use retry::RetryStrategy;
pub use strategy::{FetchKind, FetchStrategy, StrategyInfo};

// Orchestration
pub use orchestrator::{
    CycleState, DEFAULT_CYCLE_DEADLINE, DEFAULT_PROVIDER_TIMEOUT, FetchOrchestrator,
    OrchestratorConfig,
};
