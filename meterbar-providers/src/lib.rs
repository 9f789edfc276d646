// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `MeterBar` Providers
//!
//! Concrete providers for every supported service.
//!
//! Each provider is a [`ProviderDescriptor`]: static metadata plus a
//! pipeline builder that turns the credentials visible in a
//! [`FetchContext`](meterbar_fetch::FetchContext) into strategies.
//!
//! ## Supported Providers
//!
//! | Provider | Family | Credential source |
//! |----------|--------|-------------------|
//! | Claude | OAuth, multi-account | host tokens + `~/.claude/.credentials.json` |
//! | Codex | OAuth | host tokens |
//! | Gemini | OAuth | host tokens |
//! | Copilot | billing pages | session cookies |
//! | Cursor | JSON API | session token |
//! | Windsurf | local binary cache | `state.vscdb` |
//! | Kiro | CLI subprocess | `kiro-cli` login |
//! | Augment, z.ai, MiniMax, OpenRouter | JSON API | API keys |
//! | Perplexity, Tavily, Brave, Exa | JSON API | API keys |
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use meterbar_core::ProviderKind;
//! use meterbar_fetch::{FetchContext, FetchOrchestrator};
//! use meterbar_providers::ProviderRegistry;
//!
//! let orchestrator = FetchOrchestrator::new(Arc::new(FetchContext::new()));
//! let providers = ProviderRegistry::providers_for(&[ProviderKind::Claude, ProviderKind::Exa]);
//! let result = orchestrator.run_cycle("manual", providers).await;
//! ```

pub mod catalog;
pub mod descriptor;
pub mod json_api;
pub mod registry;

// Provider families with their own modules
pub mod claude;
pub mod copilot;
pub mod kiro;
pub mod windsurf;

// Re-export key types
pub use descriptor::{CliConfig, FetchPlan, ProviderDescriptor, ProviderDescriptorBuilder, ProviderMetadata};
pub use registry::ProviderRegistry;

// Re-export provider descriptors
pub use catalog::{
    augment_descriptor, brave_descriptor, codex_descriptor, cursor_descriptor, exa_descriptor,
    gemini_descriptor, minimax_descriptor, openrouter_descriptor, perplexity_descriptor,
    tavily_descriptor, zai_descriptor,
};
pub use claude::claude_descriptor;
pub use copilot::copilot_descriptor;
pub use kiro::kiro_descriptor;
pub use windsurf::windsurf_descriptor;

// Re-export strategy types for convenience
pub use copilot::{CopilotHistorySource, CopilotWebStrategy};
pub use json_api::TokenApiStrategy;
pub use kiro::KiroCliStrategy;
pub use windsurf::WindsurfCacheStrategy;
