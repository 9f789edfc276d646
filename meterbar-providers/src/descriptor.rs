//! Provider descriptor system.
//!
//! A descriptor contains all the static configuration for a provider:
//! - Metadata (display name, dashboard, default endpoint, allowed domains)
//! - Fetch plan (which credential strategies to build, how to reconcile)
//! - CLI configuration (names accepted on the command line)

use meterbar_core::{Candidate, ProviderKind, ReconcileRules};
use meterbar_fetch::{CandidatePipeline, FetchContext, FetchKind, PipelineBuilder, PipelineProvider};

// ============================================================================
// Provider Descriptor
// ============================================================================

/// Complete descriptor for a provider.
pub struct ProviderDescriptor {
    /// Provider identifier.
    pub id: ProviderKind,
    /// Display metadata.
    pub metadata: ProviderMetadata,
    /// How to fetch usage data.
    pub fetch_plan: FetchPlan,
    /// CLI configuration.
    pub cli: CliConfig,
}

impl ProviderDescriptor {
    /// Creates a new descriptor builder.
    pub fn builder(id: ProviderKind) -> ProviderDescriptorBuilder {
        ProviderDescriptorBuilder::new(id)
    }

    /// Returns the display name.
    pub fn display_name(&self) -> &'static str {
        self.metadata.display_name
    }

    /// Returns the CLI name.
    pub fn cli_name(&self) -> &'static str {
        self.cli.name
    }

    /// Builds the candidate pipeline for this provider.
    pub fn build_pipeline(&self, ctx: &FetchContext) -> CandidatePipeline {
        (self.fetch_plan.build_pipeline)(ctx)
    }

    /// Returns the provider the orchestrator runs.
    pub fn provider(&self) -> PipelineProvider {
        PipelineProvider::new(self.id, self.fetch_plan.build_pipeline)
            .with_rules(self.fetch_plan.rules)
    }
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("id", &self.id)
            .field("metadata", &self.metadata)
            .field("cli", &self.cli)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Display and network metadata.
#[derive(Debug, Clone)]
pub struct ProviderMetadata {
    /// Name shown to users.
    pub display_name: &'static str,
    /// Where the user can inspect usage themselves.
    pub dashboard_url: Option<&'static str>,
    /// Whether the provider is enabled in fresh settings.
    pub default_enabled: bool,
    /// Default usage endpoint; overridable per provider in settings.
    pub endpoint: Option<&'static str>,
    /// Hosts the provider is allowed to contact.
    pub domains: &'static [&'static str],
}

impl ProviderMetadata {
    /// Default metadata for a provider.
    pub fn for_provider(id: ProviderKind) -> Self {
        Self {
            display_name: id.display_name(),
            dashboard_url: None,
            default_enabled: false,
            endpoint: None,
            domains: &[],
        }
    }
}

// ============================================================================
// Fetch Plan
// ============================================================================

/// How to fetch usage data.
pub struct FetchPlan {
    /// Credential source kinds the pipeline may contain, in priority order.
    pub source_kinds: &'static [FetchKind],
    /// Builds the strategies for the credentials visible in a context.
    pub build_pipeline: PipelineBuilder,
    /// How candidates of this provider are reconciled.
    pub rules: ReconcileRules<Candidate>,
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self {
            source_kinds: &[],
            build_pipeline: |_| CandidatePipeline::new(),
            rules: ReconcileRules::default(),
        }
    }
}

// ============================================================================
// CLI Config
// ============================================================================

/// Names accepted on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Primary name.
    pub name: &'static str,
    /// Alternative names.
    pub aliases: &'static [&'static str],
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`ProviderDescriptor`].
pub struct ProviderDescriptorBuilder {
    id: ProviderKind,
    metadata: ProviderMetadata,
    fetch_plan: FetchPlan,
    cli: CliConfig,
}

impl ProviderDescriptorBuilder {
    /// Creates a new builder for the given provider.
    pub fn new(id: ProviderKind) -> Self {
        Self {
            id,
            metadata: ProviderMetadata::for_provider(id),
            fetch_plan: FetchPlan::default(),
            cli: CliConfig {
                name: id.cli_name(),
                aliases: &[],
            },
        }
    }

    /// Sets the dashboard URL.
    #[must_use]
    pub fn dashboard(mut self, url: &'static str) -> Self {
        self.metadata.dashboard_url = Some(url);
        self
    }

    /// Enables the provider in fresh settings.
    #[must_use]
    pub fn enabled_by_default(mut self) -> Self {
        self.metadata.default_enabled = true;
        self
    }

    /// Sets the default endpoint and the hosts it may contact.
    #[must_use]
    pub fn endpoint(mut self, url: &'static str, domains: &'static [&'static str]) -> Self {
        self.metadata.endpoint = Some(url);
        self.metadata.domains = domains;
        self
    }

    /// Sets the pipeline builder.
    #[must_use]
    pub fn pipeline(mut self, kinds: &'static [FetchKind], build: PipelineBuilder) -> Self {
        self.fetch_plan.source_kinds = kinds;
        self.fetch_plan.build_pipeline = build;
        self
    }

    /// Sets the reconciliation rules.
    #[must_use]
    pub fn rules(mut self, rules: ReconcileRules<Candidate>) -> Self {
        self.fetch_plan.rules = rules;
        self
    }

    /// Sets CLI aliases.
    #[must_use]
    pub fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.cli.aliases = aliases;
        self
    }

    /// Builds the descriptor.
    pub fn build(self) -> ProviderDescriptor {
        ProviderDescriptor {
            id: self.id,
            metadata: self.metadata,
            fetch_plan: self.fetch_plan,
            cli: self.cli,
        }
    }
}
