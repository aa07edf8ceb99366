//! Engine configuration: timer durations, publisher capacity, and icon mapping.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! yields [`EngineConfig::default`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Auto-dismiss timeout when the source does not supply one (ms).
pub const DEFAULT_TIMEOUT_MS: u64 = 15_000;

/// Close-animation grace period between Closing and Removed (ms).
pub const GRACE_PERIOD_MS: u64 = 850;

/// Icon used when neither the source nor the app map provides one.
pub const FALLBACK_ICON: &str = "dialog-information-symbolic";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_timeout_ms: u64,
    pub grace_period_ms: u64,
    /// Buffered snapshots per subscriber before it starts lagging.
    pub snapshot_capacity: usize,
    pub fallback_icon: String,
    /// `app_name` → icon name, consulted when the source sends no icon.
    pub app_icons: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut app_icons = BTreeMap::new();
        app_icons.insert(
            "Telegram Desktop".to_owned(),
            "org.telegram.desktop".to_owned(),
        );
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            grace_period_ms: GRACE_PERIOD_MS,
            snapshot_capacity: 64,
            fallback_icon: FALLBACK_ICON.to_owned(),
            app_icons,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Load a config file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Broadcast channels reject a zero capacity.
    pub fn snapshot_capacity(&self) -> usize {
        self.snapshot_capacity.max(1)
    }
}
