//! User preferences store.
//!
//! Manages user settings with persistence and change notification.

use meterbar_core::{ProjectionConfig, ProviderKind};
use meterbar_fetch::{FetchSettings, OrchestratorConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_settings_path, load_json_or_default, save_json};

/// Default per-provider fetch timeout in seconds.
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Default cycle deadline in seconds.
pub const DEFAULT_CYCLE_DEADLINE_SECS: u64 = 60;

/// Default number of days kept in the cost history.
pub const DEFAULT_HISTORY_RETENTION_DAYS: u32 = 90;

// ============================================================================
// Settings Types
// ============================================================================

/// User preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Enabled providers.
    pub enabled_providers: BTreeSet<ProviderKind>,

    /// Auto-refresh cadence.
    pub refresh_cadence: RefreshCadence,

    /// Timeout for one provider's fetch.
    pub provider_timeout_secs: u64,

    /// How long a cycle waits before reporting stragglers as pending.
    pub cycle_deadline_secs: u64,

    /// End-of-month projection window and weights.
    pub projection: ProjectionConfig,

    /// Days of cost history kept on disk.
    pub history_retention_days: u32,

    /// Per-provider settings.
    pub provider_settings: BTreeMap<ProviderKind, ProviderSettings>,
}

impl Default for Settings {
    fn default() -> Self {
        let enabled_providers = [
            ProviderKind::Claude,
            ProviderKind::Codex,
            ProviderKind::Copilot,
            ProviderKind::Cursor,
        ]
        .into_iter()
        .collect();

        Self {
            enabled_providers,
            refresh_cadence: RefreshCadence::default(),
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
            cycle_deadline_secs: DEFAULT_CYCLE_DEADLINE_SECS,
            projection: ProjectionConfig::default(),
            history_retention_days: DEFAULT_HISTORY_RETENTION_DAYS,
            provider_settings: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Returns true if a provider is enabled.
    ///
    /// A per-provider `enabled` override wins over the enabled set.
    pub fn is_enabled(&self, provider: ProviderKind) -> bool {
        self.provider_settings
            .get(&provider)
            .and_then(|p| p.enabled)
            .unwrap_or_else(|| self.enabled_providers.contains(&provider))
    }

    /// Enabled providers in display order, overrides applied.
    pub fn effective_enabled(&self) -> Vec<ProviderKind> {
        ProviderKind::all()
            .iter()
            .copied()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }

    /// Builds the orchestrator timeouts.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::default()
            .with_provider_timeout(Duration::from_secs(self.provider_timeout_secs))
            .with_cycle_deadline(Duration::from_secs(self.cycle_deadline_secs));
        for (kind, overrides) in &self.provider_settings {
            if let Some(secs) = overrides.timeout_secs {
                config = config.with_timeout_for(*kind, Duration::from_secs(secs));
            }
        }
        config
    }

    /// Builds the fetch settings handed to providers.
    pub fn fetch_settings(&self) -> FetchSettings {
        let mut settings =
            FetchSettings::default().with_timeout(Duration::from_secs(self.provider_timeout_secs));
        for (kind, overrides) in &self.provider_settings {
            if let Some(endpoint) = &overrides.endpoint {
                settings = settings.with_endpoint(*kind, endpoint.clone());
            }
        }
        settings
    }
}

/// Refresh cadence options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshCadence {
    /// Manual refresh only.
    Manual,
    /// Every minute.
    OneMinute,
    /// Every two minutes.
    #[default]
    TwoMinutes,
    /// Every five minutes.
    FiveMinutes,
    /// Every fifteen minutes.
    FifteenMinutes,
    /// Every thirty minutes.
    ThirtyMinutes,
}

impl RefreshCadence {
    /// Returns the duration, or None for manual.
    pub fn as_duration(&self) -> Option<Duration> {
        match self {
            RefreshCadence::Manual => None,
            RefreshCadence::OneMinute => Some(Duration::from_secs(60)),
            RefreshCadence::TwoMinutes => Some(Duration::from_secs(120)),
            RefreshCadence::FiveMinutes => Some(Duration::from_secs(300)),
            RefreshCadence::FifteenMinutes => Some(Duration::from_secs(900)),
            RefreshCadence::ThirtyMinutes => Some(Duration::from_secs(1800)),
        }
    }

    /// All available cadences.
    pub fn all() -> &'static [RefreshCadence] {
        &[
            RefreshCadence::Manual,
            RefreshCadence::OneMinute,
            RefreshCadence::TwoMinutes,
            RefreshCadence::FiveMinutes,
            RefreshCadence::FifteenMinutes,
            RefreshCadence::ThirtyMinutes,
        ]
    }

    /// Parses `manual` or a minute count (`1`, `2`, `5`, `15`, `30`).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "manual" | "off" => Some(RefreshCadence::Manual),
            "1" | "1m" => Some(RefreshCadence::OneMinute),
            "2" | "2m" => Some(RefreshCadence::TwoMinutes),
            "5" | "5m" => Some(RefreshCadence::FiveMinutes),
            "15" | "15m" => Some(RefreshCadence::FifteenMinutes),
            "30" | "30m" => Some(RefreshCadence::ThirtyMinutes),
            _ => None,
        }
    }
}

impl std::fmt::Display for RefreshCadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshCadence::Manual => write!(f, "Manual"),
            RefreshCadence::OneMinute => write!(f, "1 minute"),
            RefreshCadence::TwoMinutes => write!(f, "2 minutes"),
            RefreshCadence::FiveMinutes => write!(f, "5 minutes"),
            RefreshCadence::FifteenMinutes => write!(f, "15 minutes"),
            RefreshCadence::ThirtyMinutes => write!(f, "30 minutes"),
        }
    }
}

/// Per-provider overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Forces the provider on or off regardless of the enabled set.
    pub enabled: Option<bool>,

    /// Fetch timeout for this provider.
    pub timeout_secs: Option<u64>,

    /// Base URL replacing the provider's default endpoint.
    pub endpoint: Option<String>,
}

// ============================================================================
// Settings Store
// ============================================================================

/// Persistent settings store with change notifications.
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
    path: PathBuf,
    notify: watch::Sender<u64>,
}

impl SettingsStore {
    /// Creates a store with default settings.
    pub fn new(path: PathBuf) -> Self {
        Self::with_settings(path, Settings::default())
    }

    fn with_settings(path: PathBuf, settings: Settings) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            settings: Arc::new(RwLock::new(settings)),
            path,
            notify,
        }
    }

    /// Loads settings from the default path.
    pub async fn load_default() -> Self {
        Self::load(default_settings_path()).await
    }

    /// Loads settings from a path.
    ///
    /// A missing or unreadable file yields defaults.
    pub async fn load(path: PathBuf) -> Self {
        if path.exists() {
            info!(path = %path.display(), "Loading settings");
        } else {
            debug!(path = %path.display(), "Settings file not found, using defaults");
        }
        let settings: Settings = load_json_or_default(&path).await;
        Self::with_settings(path, settings)
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Gets a copy of the current settings.
    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Updates settings and notifies subscribers.
    pub async fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        {
            let mut settings = self.settings.write().await;
            f(&mut settings);
        }
        self.notify.send_modify(|version| *version += 1);
    }

    /// Saves settings to disk.
    ///
    /// # Errors
    ///
    /// Returns error if settings cannot be written to disk.
    pub async fn save(&self) -> Result<(), StoreError> {
        let settings = self.settings.read().await;
        save_json(&self.path, &*settings).await?;
        info!(path = %self.path.display(), "Settings saved");
        Ok(())
    }

    /// Subscribes to settings changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }

    // ========================================================================
    // Convenience Methods
    // ========================================================================

    /// Checks if a provider is enabled.
    pub async fn is_provider_enabled(&self, provider: ProviderKind) -> bool {
        self.settings.read().await.is_enabled(provider)
    }

    /// Enables or disables a provider.
    ///
    /// Clears any per-provider `enabled` override so the change sticks.
    pub async fn set_provider_enabled(&self, provider: ProviderKind, enabled: bool) {
        self.update(|s| {
            if enabled {
                s.enabled_providers.insert(provider);
            } else {
                s.enabled_providers.remove(&provider);
            }
            if let Some(overrides) = s.provider_settings.get_mut(&provider) {
                overrides.enabled = None;
            }
        })
        .await;
    }

    /// Gets the refresh cadence.
    pub async fn refresh_cadence(&self) -> RefreshCadence {
        self.settings.read().await.refresh_cadence
    }

    /// Sets the refresh cadence.
    pub async fn set_refresh_cadence(&self, cadence: RefreshCadence) {
        self.update(|s| s.refresh_cadence = cadence).await;
    }

    /// Gets enabled providers, overrides applied.
    pub async fn enabled_providers(&self) -> Vec<ProviderKind> {
        self.settings.read().await.effective_enabled()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(settings.enabled_providers.contains(&ProviderKind::Codex));
        assert!(settings.enabled_providers.contains(&ProviderKind::Claude));
        assert!(settings.enabled_providers.contains(&ProviderKind::Copilot));
        assert_eq!(settings.refresh_cadence, RefreshCadence::TwoMinutes);
        assert_eq!(settings.provider_timeout_secs, 30);
        assert_eq!(settings.cycle_deadline_secs, 60);
        assert_eq!(settings.history_retention_days, 90);
        assert_eq!(settings.projection.lookback_days(), 7);
    }

    #[test]
    fn test_refresh_cadence_duration() {
        assert_eq!(RefreshCadence::Manual.as_duration(), None);
        assert_eq!(
            RefreshCadence::TwoMinutes.as_duration(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(
            RefreshCadence::ThirtyMinutes.as_duration(),
            Some(Duration::from_secs(1800))
        );
    }

    #[test]
    fn test_refresh_cadence_parse() {
        assert_eq!(RefreshCadence::parse("manual"), Some(RefreshCadence::Manual));
        assert_eq!(RefreshCadence::parse("15"), Some(RefreshCadence::FifteenMinutes));
        assert_eq!(RefreshCadence::parse(" 30m "), Some(RefreshCadence::ThirtyMinutes));
        assert_eq!(RefreshCadence::parse("3"), None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{"refresh_cadence": "five_minutes", "enabled_providers": ["kiro"]}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();

        assert_eq!(settings.refresh_cadence, RefreshCadence::FiveMinutes);
        assert_eq!(settings.effective_enabled(), vec![ProviderKind::Kiro]);
        assert_eq!(settings.provider_timeout_secs, 30);
        assert_eq!(settings.projection, ProjectionConfig::default());
    }

    #[test]
    fn test_invalid_projection_is_rejected() {
        let json = r#"{"projection": {"lookback_days": 3, "weights": [1.0]}}"#;
        assert!(serde_json::from_str::<Settings>(json).is_err());
    }

    #[test]
    fn test_provider_override_wins() {
        let mut settings = Settings::default();
        settings.provider_settings.insert(
            ProviderKind::Claude,
            ProviderSettings {
                enabled: Some(false),
                ..ProviderSettings::default()
            },
        );
        settings.provider_settings.insert(
            ProviderKind::Windsurf,
            ProviderSettings {
                enabled: Some(true),
                ..ProviderSettings::default()
            },
        );

        let enabled = settings.effective_enabled();
        assert!(!enabled.contains(&ProviderKind::Claude));
        assert!(enabled.contains(&ProviderKind::Windsurf));
    }

    #[test]
    fn test_orchestrator_and_fetch_settings() {
        let mut settings = Settings {
            provider_timeout_secs: 10,
            cycle_deadline_secs: 20,
            ..Settings::default()
        };
        settings.provider_settings.insert(
            ProviderKind::Kiro,
            ProviderSettings {
                timeout_secs: Some(45),
                endpoint: None,
                enabled: None,
            },
        );
        settings.provider_settings.insert(
            ProviderKind::Copilot,
            ProviderSettings {
                endpoint: Some("http://127.0.0.1:9000".to_string()),
                ..ProviderSettings::default()
            },
        );

        let config = settings.orchestrator_config();
        assert_eq!(config.cycle_deadline, Duration::from_secs(20));
        assert_eq!(config.timeout_for(ProviderKind::Claude), Duration::from_secs(10));
        assert_eq!(config.timeout_for(ProviderKind::Kiro), Duration::from_secs(45));

        let fetch = settings.fetch_settings();
        assert_eq!(fetch.timeout, Duration::from_secs(10));
        assert_eq!(
            fetch.endpoints.get(&ProviderKind::Copilot).map(String::as_str),
            Some("http://127.0.0.1:9000")
        );
    }

    #[tokio::test]
    async fn test_settings_store_update_notifies() {
        let store = SettingsStore::new(PathBuf::from("/tmp/meterbar_test_settings.json"));
        let mut rx = store.subscribe();

        store.set_refresh_cadence(RefreshCadence::Manual).await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        assert_eq!(store.refresh_cadence().await, RefreshCadence::Manual);
    }

    #[tokio::test]
    async fn test_provider_toggle() {
        let store = SettingsStore::new(PathBuf::from("/tmp/meterbar_test_settings.json"));

        assert!(store.is_provider_enabled(ProviderKind::Codex).await);

        store.set_provider_enabled(ProviderKind::Codex, false).await;
        assert!(!store.is_provider_enabled(ProviderKind::Codex).await);

        store.set_provider_enabled(ProviderKind::Codex, true).await;
        assert!(store.is_provider_enabled(ProviderKind::Codex).await);
    }

    #[tokio::test]
    async fn test_toggle_clears_override() {
        let store = SettingsStore::new(PathBuf::from("/tmp/meterbar_test_settings.json"));
        store
            .update(|s| {
                s.provider_settings.insert(
                    ProviderKind::Gemini,
                    ProviderSettings {
                        enabled: Some(false),
                        timeout_secs: Some(5),
                        endpoint: None,
                    },
                );
            })
            .await;

        store.set_provider_enabled(ProviderKind::Gemini, true).await;
        assert!(store.is_provider_enabled(ProviderKind::Gemini).await);
        assert_eq!(
            store.get().await.provider_settings[&ProviderKind::Gemini].timeout_secs,
            Some(5)
        );
    }
}
