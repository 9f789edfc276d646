//! Config command - manage configuration.

use anyhow::Result;
use clap::{Args, Subcommand};
use meterbar_core::ProviderKind;
use meterbar_providers::{ProviderDescriptor, ProviderRegistry};
use meterbar_store::{
    RefreshCadence, Settings, SettingsStore, default_config_dir, default_cost_history_dir, default_settings_path,
};
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, ExitCode, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Enable a provider.
    Enable {
        /// Provider to enable.
        provider: String,
    },

    /// Disable a provider.
    Disable {
        /// Provider to disable.
        provider: String,
    },

    /// Set refresh cadence.
    Refresh {
        /// Cadence: manual, 1m, 2m, 5m, 15m, 30m.
        cadence: String,
    },

    /// Set the fetch timeout, globally or for one provider.
    Timeout {
        /// Timeout in seconds.
        secs: u64,
        /// Provider to override; omit for the global default.
        target: Option<String>,
    },

    /// Point a provider at a different base URL.
    ///
    /// Windsurf reads a local database, so its override is a file path.
    Endpoint {
        /// Provider to override.
        target: String,
        /// Base URL or database path; omit to restore the default.
        url: Option<String>,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<ExitCode> {
    match &args.action {
        ConfigAction::Show => show_config(cli).await?,
        ConfigAction::Path => show_paths(cli)?,
        ConfigAction::Reset => reset_config().await?,
        action => {
            let store = SettingsStore::load_default().await;
            let message = apply(&store, action).await?;
            store.save().await?;
            println!("{message}");
        }
    }
    Ok(ExitCode::Success)
}

fn lookup(name: &str) -> Result<&'static ProviderDescriptor> {
    ProviderRegistry::get_by_cli_name(name).ok_or_else(|| anyhow::anyhow!("Unknown provider: {name}"))
}

/// Applies a mutating action and returns the confirmation line.
async fn apply(store: &SettingsStore, action: &ConfigAction) -> Result<String> {
    match action {
        ConfigAction::Enable { provider } => {
            let desc = lookup(provider)?;
            store.set_provider_enabled(desc.id, true).await;
            info!(provider = %desc.display_name(), "Provider enabled");
            Ok(format!("Enabled: {}", desc.display_name()))
        }
        ConfigAction::Disable { provider } => {
            let desc = lookup(provider)?;
            store.set_provider_enabled(desc.id, false).await;
            info!(provider = %desc.display_name(), "Provider disabled");
            Ok(format!("Disabled: {}", desc.display_name()))
        }
        ConfigAction::Refresh { cadence } => {
            let Some(cadence) = RefreshCadence::parse(cadence) else {
                anyhow::bail!("Unknown cadence: {cadence}. Use: manual, 1m, 2m, 5m, 15m, 30m");
            };
            store.set_refresh_cadence(cadence).await;
            info!(cadence = %cadence, "Refresh cadence updated");
            Ok(format!("Refresh cadence set to: {cadence}"))
        }
        ConfigAction::Timeout { secs, target } => {
            if *secs == 0 {
                anyhow::bail!("Timeout must be at least one second");
            }
            let secs = *secs;
            match target {
                Some(name) => {
                    let desc = lookup(name)?;
                    store
                        .update(|s| s.provider_settings.entry(desc.id).or_default().timeout_secs = Some(secs))
                        .await;
                    Ok(format!("{} timeout set to {secs}s", desc.display_name()))
                }
                None => {
                    store.update(|s| s.provider_timeout_secs = secs).await;
                    Ok(format!("Provider timeout set to {secs}s"))
                }
            }
        }
        ConfigAction::Endpoint { target, url } => {
            let desc = lookup(target)?;
            let endpoint = url.as_deref().map(|raw| validate_endpoint(desc.id, raw)).transpose()?;
            let message = match &endpoint {
                Some(url) => format!("{} endpoint set to {url}", desc.display_name()),
                None => format!("{} endpoint restored", desc.display_name()),
            };
            store
                .update(|s| s.provider_settings.entry(desc.id).or_default().endpoint = endpoint)
                .await;
            Ok(message)
        }
        ConfigAction::Show | ConfigAction::Path | ConfigAction::Reset => {
            anyhow::bail!("Action does not modify settings")
        }
    }
}

fn validate_endpoint(kind: ProviderKind, raw: &str) -> Result<String> {
    if kind == ProviderKind::Windsurf {
        if raw.trim().is_empty() {
            anyhow::bail!("Database path must not be empty");
        }
        return Ok(raw.to_string());
    }
    let parsed = url::Url::parse(raw).map_err(|e| anyhow::anyhow!("Invalid endpoint {raw}: {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        anyhow::bail!("Endpoint must be an http(s) URL with a host: {raw}");
    }
    Ok(raw.trim_end_matches('/').to_string())
}

fn describe(settings: &Settings, formatter: &TextFormatter) -> Vec<String> {
    let mut lines = vec![
        format!("{} Configuration", formatter.bold("MeterBar")),
        "─".repeat(40),
        String::new(),
        "Enabled providers:".to_string(),
    ];
    for provider in settings.effective_enabled() {
        lines.push(format!("  • {}", provider.display_name()));
    }
    lines.push(String::new());
    lines.push(format!("Refresh cadence:   {}", settings.refresh_cadence));
    lines.push(format!("Provider timeout:  {}s", settings.provider_timeout_secs));
    lines.push(format!("Cycle deadline:    {}s", settings.cycle_deadline_secs));
    lines.push(format!(
        "Projection:        {} day look-back",
        settings.projection.lookback_days()
    ));
    lines.push(format!("History retention: {} days", settings.history_retention_days));

    let overrides: Vec<(&ProviderKind, _)> = settings
        .provider_settings
        .iter()
        .filter(|(_, o)| o.enabled.is_some() || o.timeout_secs.is_some() || o.endpoint.is_some())
        .collect();
    if !overrides.is_empty() {
        lines.push(String::new());
        lines.push("Overrides:".to_string());
        for (provider, o) in overrides {
            let mut parts = Vec::new();
            if let Some(enabled) = o.enabled {
                parts.push(format!("enabled={enabled}"));
            }
            if let Some(secs) = o.timeout_secs {
                parts.push(format!("timeout={secs}s"));
            }
            if let Some(endpoint) = &o.endpoint {
                parts.push(format!("endpoint={endpoint}"));
            }
            lines.push(format!("  {}: {}", provider.cli_name(), parts.join(", ")));
        }
    }
    lines
}

async fn show_config(cli: &Cli) -> Result<()> {
    let settings = SettingsStore::load_default().await.get().await;

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!("{}", describe(&settings, &formatter).join("\n"));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&settings)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_path = default_settings_path();
    let history_dir = default_cost_history_dir();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_path.display());
            println!("Cost history:  {}", history_dir.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
                "cost_history_dir": history_dir.display().to_string(),
            });
            println!("{}", JsonFormatter::new(cli.pretty).format(&paths)?);
        }
    }

    Ok(())
}

async fn reset_config() -> Result<()> {
    let path = default_settings_path();

    if tokio::fs::try_exists(&path).await? {
        tokio::fs::remove_file(&path).await?;
        info!(path = %path.display(), "Settings reset");
        println!("Configuration reset to defaults");
    } else {
        println!("No configuration file to reset");
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, SettingsStore) {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json")).await;
        (dir, store)
    }

    #[tokio::test]
    async fn test_enable_disable_roundtrip() {
        let (_dir, store) = store().await;

        apply(&store, &ConfigAction::Enable { provider: "kiro".into() }).await.unwrap();
        assert!(store.is_provider_enabled(ProviderKind::Kiro).await);

        apply(&store, &ConfigAction::Disable { provider: "kiro".into() }).await.unwrap();
        assert!(!store.is_provider_enabled(ProviderKind::Kiro).await);

        assert!(apply(&store, &ConfigAction::Enable { provider: "nope".into() }).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_cadence() {
        let (_dir, store) = store().await;

        apply(&store, &ConfigAction::Refresh { cadence: "30m".into() }).await.unwrap();
        assert_eq!(store.refresh_cadence().await, RefreshCadence::ThirtyMinutes);
        assert!(apply(&store, &ConfigAction::Refresh { cadence: "7m".into() }).await.is_err());
    }

    #[tokio::test]
    async fn test_timeouts() {
        let (_dir, store) = store().await;

        apply(&store, &ConfigAction::Timeout { secs: 45, target: None }).await.unwrap();
        apply(&store, &ConfigAction::Timeout { secs: 5, target: Some("copilot".into()) })
            .await
            .unwrap();
        assert!(apply(&store, &ConfigAction::Timeout { secs: 0, target: None }).await.is_err());

        let settings = store.get().await;
        assert_eq!(settings.provider_timeout_secs, 45);
        assert_eq!(settings.provider_settings[&ProviderKind::Copilot].timeout_secs, Some(5));
    }

    #[tokio::test]
    async fn test_endpoint_set_and_clear() {
        let (_dir, store) = store().await;

        let set = ConfigAction::Endpoint {
            target: "copilot".into(),
            url: Some("https://ghe.example.com/api/".into()),
        };
        apply(&store, &set).await.unwrap();
        let settings = store.get().await;
        assert_eq!(
            settings.provider_settings[&ProviderKind::Copilot].endpoint.as_deref(),
            Some("https://ghe.example.com/api")
        );

        let clear = ConfigAction::Endpoint { target: "copilot".into(), url: None };
        apply(&store, &clear).await.unwrap();
        let settings = store.get().await;
        assert_eq!(settings.provider_settings[&ProviderKind::Copilot].endpoint, None);
    }

    #[test]
    fn test_endpoint_validation() {
        let copilot = ProviderKind::Copilot;
        assert!(validate_endpoint(copilot, "ftp://example.com").is_err());
        assert!(validate_endpoint(copilot, "not a url").is_err());
        assert_eq!(validate_endpoint(copilot, "http://localhost:8080").unwrap(), "http://localhost:8080");

        let windsurf = ProviderKind::Windsurf;
        assert_eq!(validate_endpoint(windsurf, "/tmp/state.vscdb").unwrap(), "/tmp/state.vscdb");
        assert!(validate_endpoint(windsurf, "  ").is_err());
    }

    #[tokio::test]
    async fn test_changes_persist() {
        let (dir, store) = store().await;
        apply(&store, &ConfigAction::Refresh { cadence: "manual".into() }).await.unwrap();
        store.save().await.unwrap();

        let reloaded = SettingsStore::load(dir.path().join("settings.json")).await;
        assert_eq!(reloaded.refresh_cadence().await, RefreshCadence::Manual);
    }

    #[test]
    fn test_describe_lists_overrides() {
        let mut settings = Settings::default();
        settings.provider_settings.entry(ProviderKind::Kiro).or_default().timeout_secs = Some(12);

        let lines = describe(&settings, &TextFormatter::new(false));
        assert!(lines.iter().any(|l| l == "  kiro: timeout=12s"));
    }
}
