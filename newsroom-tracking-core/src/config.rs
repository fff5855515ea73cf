//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/newsroom-tracking/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/newsroom-tracking/` (~/.config/newsroom-tracking/)
//! - Data: `$XDG_DATA_HOME/newsroom-tracking/` (~/.local/share/newsroom-tracking/)
//! - State/Logs: `$XDG_STATE_HOME/newsroom-tracking/` (~/.local/state/newsroom-tracking/)

use crate::error::{Error, Result};
use crate::queue::DrainMode;
use crate::store::{DeferredIdentityStore, MemoryStore, SqliteStore};
use crate::tracker::TrackerContext;
use crate::types::{PrezlyMeta, TrackingPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const APP_DIR: &str = "newsroom-tracking";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tracking façade configuration
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Deferred identity storage
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tracking façade configuration
///
/// The newsroom id is the only required value, and only when tracking is
/// enabled.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TrackingConfig {
    /// Master switch; when false every tracking call is a no-op
    #[serde(default)]
    pub enabled: bool,

    /// Newsroom the events belong to
    pub newsroom: Option<Uuid>,

    /// Story being viewed, if any
    pub story: Option<Uuid>,

    /// Newsroom tracking policy
    #[serde(default)]
    pub policy: TrackingPolicy,

    /// How many queued calls each notification drains
    #[serde(default)]
    pub drain_mode: DrainMode,

    /// User agent reported once the visitor consents
    pub user_agent: Option<String>,
}

impl TrackingConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.enabled && self.newsroom.is_none() {
            return Err(Error::Config(
                "tracking.newsroom is required when tracking is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// First-party metadata for this newsroom
    pub fn meta(&self) -> PrezlyMeta {
        PrezlyMeta::new(self.newsroom.unwrap_or_else(Uuid::nil))
            .with_story(self.story)
            .with_tracking_policy(Some(self.policy))
    }

    /// Build the façade context, with the consent known at startup
    pub fn context(&self, consent: bool) -> Result<TrackerContext> {
        self.validate()?;

        Ok(TrackerContext {
            meta: self.meta(),
            policy: self.policy,
            consent,
            enabled: self.enabled,
            user_agent: self.user_agent.clone(),
            drain_mode: self.drain_mode,
        })
    }
}

/// Deferred identity storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Keep the deferred identity across restarts
    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Override for the SQLite file
    pub path: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            persist: default_persist(),
            path: None,
        }
    }
}

fn default_persist() -> bool {
    true
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Open the configured deferred identity store, migrated and ready
    pub fn open_store(&self) -> Result<Box<dyn DeferredIdentityStore>> {
        if !self.storage.persist {
            return Ok(Box::new(MemoryStore::new()));
        }

        let store = SqliteStore::open(&self.store_path())?;
        store.migrate()?;
        Ok(Box::new(store))
    }

    /// The SQLite file used for the deferred identity
    pub fn store_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(Self::database_path)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/newsroom-tracking/config.toml`
    pub fn config_path() -> PathBuf {
        xdg_config_home().join(APP_DIR).join("config.toml")
    }

    /// Returns the data directory path (for the SQLite store)
    ///
    /// `$XDG_DATA_HOME/newsroom-tracking/`
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join(APP_DIR)
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/newsroom-tracking/`
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join(APP_DIR)
    }

    /// Returns the default store file path
    ///
    /// `$XDG_DATA_HOME/newsroom-tracking/state.db`
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("state.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/newsroom-tracking/newsroom-tracking.log`
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("newsroom-tracking.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// For CLI binaries that want stable path behavior before other
    /// components read these variables.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.tracking.enabled);
        assert_eq!(config.tracking.policy, TrackingPolicy::Default);
        assert_eq!(config.tracking.drain_mode, DrainMode::OnePerTick);
        assert!(config.storage.persist);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[tracking]
enabled = true
newsroom = "6f1c2f0e-2b8e-4a53-9a3a-0d5d8f0c1b2a"
policy = "CONSENT_TO_IDENTIFY"
drain_mode = "eager"
user_agent = "Mozilla/5.0"

[storage]
persist = false

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert!(config.tracking.enabled);
        assert_eq!(config.tracking.policy, TrackingPolicy::ConsentToIdentify);
        assert_eq!(config.tracking.drain_mode, DrainMode::Eager);
        assert_eq!(config.tracking.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert!(!config.storage.persist);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_tracking_validation() {
        // Disabled config is always valid
        let config = TrackingConfig::default();
        assert!(config.validate().is_ok());

        // Enabled without a newsroom should fail
        let config = TrackingConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(config.context(false).is_err());

        let config = TrackingConfig {
            enabled: true,
            newsroom: Some(Uuid::new_v4()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_context_from_config() {
        let newsroom = Uuid::new_v4();
        let story = Uuid::new_v4();
        let config = TrackingConfig {
            enabled: true,
            newsroom: Some(newsroom),
            story: Some(story),
            policy: TrackingPolicy::ConsentToIdentify,
            ..Default::default()
        };

        let context = config.context(true).unwrap();
        assert!(context.consent);
        assert!(context.enabled);
        assert_eq!(context.meta.newsroom, newsroom);
        assert_eq!(context.meta.story, Some(story));
        assert_eq!(
            context.meta.tracking_policy,
            Some(TrackingPolicy::ConsentToIdentify)
        );
    }

    #[test]
    fn test_open_memory_store_when_not_persisting() {
        let config: Config = toml::from_str("[storage]\npersist = false\n").unwrap();
        let store = config.open_store().unwrap();
        assert!(store.get().unwrap().is_none());
    }

    #[test]
    fn test_store_path_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.db");
        let config = Config {
            storage: StorageConfig {
                persist: true,
                path: Some(path.clone()),
            },
            ..Default::default()
        };

        assert_eq!(config.store_path(), path);
        let store = config.open_store().unwrap();
        store
            .set(&crate::types::DeferredIdentity::anonymous_traits("u1"))
            .unwrap();
        assert!(path.exists());
    }
}
