//! Provider-related types.
//!
//! This module contains types related to metered services:
//! - [`ProviderKind`] - Enum of supported providers
//! - [`ProviderCategory`] - Coarse grouping used for display and defaults

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported metered service kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Anthropic Claude
    Claude,
    /// OpenAI Codex
    Codex,
    /// Google Gemini
    Gemini,
    /// GitHub Copilot
    Copilot,
    /// Cursor IDE
    Cursor,
    /// Windsurf IDE
    Windsurf,
    /// Kiro AI
    Kiro,
    /// Augment Code
    Augment,
    /// z.ai
    Zai,
    /// MiniMax
    MiniMax,
    /// OpenRouter
    OpenRouter,
    /// Perplexity API
    Perplexity,
    /// Tavily search API
    Tavily,
    /// Brave Search API
    Brave,
    /// Exa search API
    Exa,
}

impl ProviderKind {
    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Claude => "Claude",
            Self::Codex => "Codex",
            Self::Gemini => "Gemini",
            Self::Copilot => "Copilot",
            Self::Cursor => "Cursor",
            Self::Windsurf => "Windsurf",
            Self::Kiro => "Kiro",
            Self::Augment => "Augment",
            Self::Zai => "z.ai",
            Self::MiniMax => "MiniMax",
            Self::OpenRouter => "OpenRouter",
            Self::Perplexity => "Perplexity",
            Self::Tavily => "Tavily",
            Self::Brave => "Brave Search",
            Self::Exa => "Exa",
        }
    }

    /// Returns all available provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[
            Self::Claude,
            Self::Codex,
            Self::Gemini,
            Self::Copilot,
            Self::Cursor,
            Self::Windsurf,
            Self::Kiro,
            Self::Augment,
            Self::Zai,
            Self::MiniMax,
            Self::OpenRouter,
            Self::Perplexity,
            Self::Tavily,
            Self::Brave,
            Self::Exa,
        ]
    }

    /// Returns the CLI name for this provider (lowercase, no spaces).
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Codex => "codex",
            Self::Gemini => "gemini",
            Self::Copilot => "copilot",
            Self::Cursor => "cursor",
            Self::Windsurf => "windsurf",
            Self::Kiro => "kiro",
            Self::Augment => "augment",
            Self::Zai => "zai",
            Self::MiniMax => "minimax",
            Self::OpenRouter => "openrouter",
            Self::Perplexity => "perplexity",
            Self::Tavily => "tavily",
            Self::Brave => "brave",
            Self::Exa => "exa",
        }
    }

    /// Looks up a provider by its CLI name (case-insensitive).
    pub fn from_cli_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::all().iter().copied().find(|k| k.cli_name() == name)
    }

    /// Returns the category this provider belongs to.
    pub fn category(&self) -> ProviderCategory {
        match self {
            Self::Tavily | Self::Brave | Self::Exa | Self::Perplexity => ProviderCategory::Search,
            Self::OpenRouter => ProviderCategory::Gateway,
            _ => ProviderCategory::CodingAssistant,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Coarse grouping of providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderCategory {
    /// Coding-assistant subscriptions.
    CodingAssistant,
    /// Search APIs.
    Search,
    /// Model gateways billed by spend.
    Gateway,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_display_name() {
        assert_eq!(ProviderKind::Claude.display_name(), "Claude");
        assert_eq!(ProviderKind::Brave.display_name(), "Brave Search");
    }

    #[test]
    fn test_all_kinds_have_unique_cli_names() {
        let mut names: Vec<_> = ProviderKind::all().iter().map(|k| k.cli_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn test_from_cli_name() {
        assert_eq!(ProviderKind::from_cli_name("Windsurf"), Some(ProviderKind::Windsurf));
        assert_eq!(ProviderKind::from_cli_name(" exa "), Some(ProviderKind::Exa));
        assert_eq!(ProviderKind::from_cli_name("nope"), None);
    }

    #[test]
    fn test_category() {
        assert_eq!(ProviderKind::Tavily.category(), ProviderCategory::Search);
        assert_eq!(ProviderKind::Claude.category(), ProviderCategory::CodingAssistant);
    }
}
