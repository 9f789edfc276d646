//! Provider registry for managing all provider descriptors.
//!
//! The registry provides static access to all provider configurations
//! and is the central point for looking up providers.

use meterbar_core::ProviderKind;
use meterbar_fetch::UsageProvider;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};

use crate::catalog::{
    augment_descriptor, brave_descriptor, codex_descriptor, cursor_descriptor, exa_descriptor,
    gemini_descriptor, minimax_descriptor, openrouter_descriptor, perplexity_descriptor,
    tavily_descriptor, zai_descriptor,
};
use crate::claude::claude_descriptor;
use crate::copilot::copilot_descriptor;
use crate::descriptor::ProviderDescriptor;
use crate::kiro::kiro_descriptor;
use crate::windsurf::windsurf_descriptor;

// ============================================================================
// Static Registry
// ============================================================================

/// Static storage for all provider descriptors.
static DESCRIPTORS: OnceLock<Vec<ProviderDescriptor>> = OnceLock::new();

/// Static storage for CLI name to provider kind mapping.
static CLI_NAME_MAP: OnceLock<HashMap<String, ProviderKind>> = OnceLock::new();

/// Initializes all provider descriptors, in [`ProviderKind::all`] order.
fn init_descriptors() -> Vec<ProviderDescriptor> {
    vec![
        // Coding assistants
        claude_descriptor(),
        codex_descriptor(),
        gemini_descriptor(),
        copilot_descriptor(),
        cursor_descriptor(),
        windsurf_descriptor(),
        kiro_descriptor(),
        augment_descriptor(),
        // Model platforms
        zai_descriptor(),
        minimax_descriptor(),
        openrouter_descriptor(),
        // Search APIs
        perplexity_descriptor(),
        tavily_descriptor(),
        brave_descriptor(),
        exa_descriptor(),
    ]
}

/// Builds the CLI name to provider kind mapping.
fn build_cli_name_map(descriptors: &[ProviderDescriptor]) -> HashMap<String, ProviderKind> {
    let mut map = HashMap::new();

    for desc in descriptors {
        map.insert(desc.cli.name.to_string(), desc.id);
        for alias in desc.cli.aliases {
            map.insert((*alias).to_string(), desc.id);
        }
    }

    map
}

// ============================================================================
// Provider Registry
// ============================================================================

/// Global registry of all provider descriptors.
///
/// The registry is initialized lazily on first access and provides
/// thread-safe access to provider configurations.
pub struct ProviderRegistry;

impl ProviderRegistry {
    /// Returns all provider descriptors.
    pub fn all() -> &'static [ProviderDescriptor] {
        DESCRIPTORS.get_or_init(init_descriptors)
    }

    /// Gets a provider descriptor by kind.
    pub fn get(id: ProviderKind) -> Option<&'static ProviderDescriptor> {
        Self::all().iter().find(|d| d.id == id)
    }

    /// Returns the CLI name to provider kind mapping.
    pub fn cli_name_map() -> &'static HashMap<String, ProviderKind> {
        CLI_NAME_MAP.get_or_init(|| build_cli_name_map(Self::all()))
    }

    /// Looks up a provider by CLI name or alias, case-insensitively.
    pub fn get_by_cli_name(name: &str) -> Option<&'static ProviderDescriptor> {
        let kind = Self::cli_name_map().get(&name.trim().to_lowercase())?;
        Self::get(*kind)
    }

    /// Returns all enabled-by-default providers.
    pub fn default_enabled() -> Vec<&'static ProviderDescriptor> {
        Self::all()
            .iter()
            .filter(|d| d.metadata.default_enabled)
            .collect()
    }

    /// Returns the number of registered providers.
    pub fn count() -> usize {
        Self::all().len()
    }

    /// Returns all provider kinds.
    pub fn kinds() -> Vec<ProviderKind> {
        Self::all().iter().map(|d| d.id).collect()
    }

    /// Returns the runnable provider for a kind.
    pub fn provider(kind: ProviderKind) -> Option<Arc<dyn UsageProvider>> {
        Self::get(kind).map(|d| Arc::new(d.provider()) as Arc<dyn UsageProvider>)
    }

    /// Returns runnable providers for the given kinds, skipping duplicates.
    pub fn providers_for(kinds: &[ProviderKind]) -> Vec<Arc<dyn UsageProvider>> {
        let mut seen = BTreeSet::new();
        kinds
            .iter()
            .filter(|kind| seen.insert(**kind))
            .filter_map(|kind| Self::provider(*kind))
            .collect()
    }

    /// Returns every host any provider may contact, for the HTTP allowlist.
    pub fn allowed_domains() -> Vec<String> {
        let domains: BTreeSet<&str> = Self::all()
            .iter()
            .flat_map(|d| d.metadata.domains.iter().copied())
            .collect();
        domains.into_iter().map(str::to_string).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
