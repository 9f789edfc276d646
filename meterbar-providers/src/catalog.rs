//! Descriptors for the providers read through the JSON usage API family.
//!
//! Each entry pairs a default endpoint with a [`UsageMapping`]. Endpoints are
//! overridable per provider in settings.

use meterbar_core::ProviderKind;
use meterbar_fetch::{CandidatePipeline, FetchContext, FetchKind};

use crate::descriptor::ProviderDescriptor;
use crate::json_api::{UsageMapping, UsageShape, token_pipeline};

// ============================================================================
// Coding Assistants
// ============================================================================

const CODEX_URL: &str = "https://chatgpt.com/backend-api/wham/usage";

static CODEX_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Percent {
    used_percent: "/rate_limit/primary_window/used_percent",
})
.resets_at("/rate_limit/primary_window/reset_at")
.identity("/account_id", "/email")
.plan("/plan_type");

fn build_codex_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Codex, FetchKind::OAuth, CODEX_URL, &CODEX_MAPPING)
}

/// Codex (`OpenAI`) descriptor.
pub fn codex_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Codex)
        .dashboard("https://chatgpt.com/codex/settings/usage")
        .enabled_by_default()
        .endpoint(CODEX_URL, &["chatgpt.com"])
        .pipeline(&[FetchKind::OAuth], build_codex_pipeline)
        .aliases(&["openai"])
        .build()
}

const GEMINI_URL: &str = "https://cloudcode-pa.googleapis.com/v1internal:retrieveUserQuota";

static GEMINI_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Quota {
    remaining: Some("/quota/remaining"),
    used: Some("/quota/used"),
    total: "/quota/limit",
    overage_permitted: false,
})
.resets_at("/quota/resetTime")
.identity("/projectId", "/email")
.plan("/tier");

fn build_gemini_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Gemini, FetchKind::OAuth, GEMINI_URL, &GEMINI_MAPPING)
}

/// Gemini descriptor.
pub fn gemini_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Gemini)
        .dashboard("https://aistudio.google.com/usage")
        .endpoint(GEMINI_URL, &["googleapis.com"])
        .pipeline(&[FetchKind::OAuth], build_gemini_pipeline)
        .aliases(&["google"])
        .build()
}

const CURSOR_URL: &str = "https://cursor.com/api/usage";

static CURSOR_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Quota {
    remaining: None,
    used: Some("/gpt-4/numRequests"),
    total: "/gpt-4/maxRequestUsage",
    overage_permitted: true,
})
.resets_at("/startOfMonth")
.identity("/userId", "/email")
.plan("/membershipType");

fn build_cursor_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Cursor, FetchKind::WebSession, CURSOR_URL, &CURSOR_MAPPING)
}

/// Cursor descriptor.
pub fn cursor_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Cursor)
        .dashboard("https://cursor.com/dashboard?tab=usage")
        .enabled_by_default()
        .endpoint(CURSOR_URL, &["cursor.com"])
        .pipeline(&[FetchKind::WebSession], build_cursor_pipeline)
        .build()
}

const AUGMENT_URL: &str = "https://app.augmentcode.com/api/credits";

static AUGMENT_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Quota {
    remaining: Some("/usageUnitsRemaining"),
    used: Some("/usageUnitsUsedThisBillingCycle"),
    total: "/usageUnitsAvailable",
    overage_permitted: false,
})
.resets_at("/billingPeriodEnd")
.identity("/userId", "/email")
.plan("/planName");

fn build_augment_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Augment, FetchKind::WebSession, AUGMENT_URL, &AUGMENT_MAPPING)
}

/// Augment descriptor.
pub fn augment_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Augment)
        .dashboard("https://app.augmentcode.com/account/subscription")
        .endpoint(AUGMENT_URL, &["augmentcode.com"])
        .pipeline(&[FetchKind::WebSession], build_augment_pipeline)
        .build()
}

const ZAI_URL: &str = "https://api.z.ai/api/monitor/usage/quota/limit";

static ZAI_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Quota {
    remaining: Some("/data/remaining"),
    used: Some("/data/used"),
    total: "/data/limit",
    overage_permitted: false,
})
.resets_at("/data/nextResetTime")
.plan("/data/planName");

fn build_zai_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Zai, FetchKind::ApiKey, ZAI_URL, &ZAI_MAPPING)
}

/// z.ai descriptor.
pub fn zai_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Zai)
        .dashboard("https://z.ai/manage-apikey/subscription")
        .endpoint(ZAI_URL, &["z.ai"])
        .pipeline(&[FetchKind::ApiKey], build_zai_pipeline)
        .aliases(&["z.ai", "glm"])
        .build()
}

const MINIMAX_URL: &str = "https://api.minimax.io/v1/api/openplatform/coding_plan/remains";

static MINIMAX_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Quota {
    remaining: Some("/model_remains/0/current_interval_remaining_count"),
    used: Some("/model_remains/0/current_interval_usage_count"),
    total: "/model_remains/0/current_interval_total_count",
    overage_permitted: false,
})
.resets_at("/model_remains/0/end_time")
.plan("/plan_name");

fn build_minimax_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::MiniMax, FetchKind::ApiKey, MINIMAX_URL, &MINIMAX_MAPPING)
}

/// `MiniMax` descriptor.
pub fn minimax_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::MiniMax)
        .dashboard("https://platform.minimax.io/user-center/payment/coding-plan")
        .endpoint(MINIMAX_URL, &["minimax.io"])
        .pipeline(&[FetchKind::ApiKey], build_minimax_pipeline)
        .build()
}

// ============================================================================
// Gateways
// ============================================================================

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/key";

static OPENROUTER_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Metered {
    utilization: None,
    cost: Some("/data/usage"),
    budget: Some("/data/limit"),
})
.identity("/data/label", "/data/email");

fn build_openrouter_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::OpenRouter, FetchKind::ApiKey, OPENROUTER_URL, &OPENROUTER_MAPPING)
}

/// `OpenRouter` descriptor.
pub fn openrouter_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::OpenRouter)
        .dashboard("https://openrouter.ai/activity")
        .endpoint(OPENROUTER_URL, &["openrouter.ai"])
        .pipeline(&[FetchKind::ApiKey], build_openrouter_pipeline)
        .build()
}

// ============================================================================
// Search APIs
// ============================================================================

const PERPLEXITY_URL: &str = "https://api.perplexity.ai/v1/usage";

static PERPLEXITY_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Metered {
    utilization: None,
    cost: Some("/current_period/cost"),
    budget: Some("/current_period/spend_limit"),
})
.resets_at("/current_period/end")
.identity("/account_id", "/email");

fn build_perplexity_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Perplexity, FetchKind::ApiKey, PERPLEXITY_URL, &PERPLEXITY_MAPPING)
}

/// Perplexity descriptor.
pub fn perplexity_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Perplexity)
        .dashboard("https://www.perplexity.ai/account/api/billing")
        .endpoint(PERPLEXITY_URL, &["perplexity.ai"])
        .pipeline(&[FetchKind::ApiKey], build_perplexity_pipeline)
        .aliases(&["pplx"])
        .build()
}

const TAVILY_URL: &str = "https://api.tavily.com/usage";

static TAVILY_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Quota {
    remaining: None,
    used: Some("/key/usage"),
    total: "/key/limit",
    overage_permitted: false,
})
.plan("/account/current_plan");

fn build_tavily_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Tavily, FetchKind::ApiKey, TAVILY_URL, &TAVILY_MAPPING)
}

/// Tavily descriptor.
pub fn tavily_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Tavily)
        .dashboard("https://app.tavily.com/home")
        .endpoint(TAVILY_URL, &["tavily.com"])
        .pipeline(&[FetchKind::ApiKey], build_tavily_pipeline)
        .build()
}

const BRAVE_URL: &str = "https://api.search.brave.com/res/v1/subscription/usage";

static BRAVE_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Quota {
    remaining: Some("/monthly/remaining"),
    used: Some("/monthly/used"),
    total: "/monthly/limit",
    overage_permitted: false,
})
.resets_at("/monthly/reset_at")
.plan("/plan");

fn build_brave_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Brave, FetchKind::ApiKey, BRAVE_URL, &BRAVE_MAPPING)
}

/// Brave Search descriptor.
pub fn brave_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Brave)
        .dashboard("https://api-dashboard.search.brave.com/app/subscriptions")
        .endpoint(BRAVE_URL, &["search.brave.com"])
        .pipeline(&[FetchKind::ApiKey], build_brave_pipeline)
        .build()
}

const EXA_URL: &str = "https://api.exa.ai/v1/usage";

static EXA_MAPPING: UsageMapping = UsageMapping::new(UsageShape::Metered {
    utilization: None,
    cost: Some("/total_cost"),
    budget: Some("/budget"),
})
.resets_at("/period_end")
.identity("/team_id", "/email");

fn build_exa_pipeline(ctx: &FetchContext) -> CandidatePipeline {
    token_pipeline(ctx, ProviderKind::Exa, FetchKind::ApiKey, EXA_URL, &EXA_MAPPING)
}

/// Exa descriptor.
pub fn exa_descriptor() -> ProviderDescriptor {
    ProviderDescriptor::builder(ProviderKind::Exa)
        .dashboard("https://dashboard.exa.ai/usage")
        .endpoint(EXA_URL, &["exa.ai"])
        .pipeline(&[FetchKind::ApiKey], build_exa_pipeline)
        .build()
}

// ============================================================================
// Tests
// ============================================================================
