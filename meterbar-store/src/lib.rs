// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MeterBar` Store
//!
//! State kept between fetch cycles.
//!
//! This crate provides:
//!
//! - **`UsageStore`**: last good result per provider, with stale fallback and
//!   a three-way [`DisplayState`]
//! - **`SettingsStore`**: user preferences with persistence
//! - **`DailyCostCache`**: bounded per-provider daily cost history
//! - **`BackfillTask`**: background walk over a paged billing history
//! - **Persistence**: atomic JSON file I/O with restrictive permissions
//!
//! ## Usage
//!
//! ```ignore
//! use meterbar_store::{SettingsStore, UsageStore};
//!
//! let settings = SettingsStore::load_default().await;
//! let usage = UsageStore::new();
//!
//! // After each fetch cycle
//! usage.apply(&cycle).await;
//!
//! let mut rx = usage.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("Usage updated!");
//! }
//! ```

pub mod backfill;
pub mod cost_cache;
pub mod error;
pub mod persistence;
pub mod settings_store;
pub mod usage_store;

pub use backfill::{BackfillProgress, BackfillTask};
pub use cost_cache::{CostEntry, CostHistory, DailyCostCache};
pub use error::StoreError;
pub use persistence::{
    default_cache_dir, default_config_dir, default_cost_history_dir, default_settings_path,
    ensure_dir, load_json, load_json_or_default, save_json,
};
pub use settings_store::{
    DEFAULT_CYCLE_DEADLINE_SECS, DEFAULT_HISTORY_RETENTION_DAYS, DEFAULT_PROVIDER_TIMEOUT_SECS,
    ProviderSettings, RefreshCadence, Settings, SettingsStore,
};
pub use usage_store::{DisplayState, UsageStore};
