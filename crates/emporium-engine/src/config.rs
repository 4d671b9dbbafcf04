//! Process configuration.
//!
//! The canonical file is `emporium-config.yaml` in the working directory.
//! Every section and field has a default, so a missing file or a partial
//! one is fine. Environment variables override the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `UPDATE_PASSWORD` | `server.update_password` |
//! | `EMPORIUM_PORT` | `server.port` |
//! | `EMPORIUM_ADMIN_IDS` | `server.admin_ids` (comma-separated) |
//! | `EMPORIUM_CONFIG_DIR` | `game.config_dir` |
//! | `EMPORIUM_EVENT_CHANCE` | `game.event_chance_percent` |
//! | `EMPORIUM_DB_PATH` | `store.path` |
//! | `EMPORIUM_LOG_JSON` | `logging.json` |

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },

    /// An environment override has an unusable value.
    #[error("invalid value {value:?} for {var}: {reason}")]
    Env {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EmporiumConfig {
    /// Listen address and access control.
    #[serde(default)]
    pub server: ServerSection,
    /// Catalog location and engine knobs.
    #[serde(default)]
    pub game: GameSection,
    /// Wall-clock scheduler worker.
    #[serde(default)]
    pub scheduler: SchedulerSection,
    /// Document store persistence.
    #[serde(default)]
    pub store: StoreSection,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingSection,
}

/// `server` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSection {
    /// Bind host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret for mutating commands.
    #[serde(default)]
    pub update_password: String,
    /// Client ids allowed to run session administration commands.
    #[serde(default)]
    pub admin_ids: Vec<String>,
}

/// `game` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GameSection {
    /// Directory holding the catalog JSON files.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,
    /// Chance, in percent, of a random event starting on a quiet turn.
    #[serde(default = "default_event_chance")]
    pub event_chance_percent: u32,
    /// Fixed RNG seed for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// `scheduler` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerSection {
    /// Poll interval of the wall-clock worker.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// `store` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreSection {
    /// Snapshot file. A `.backup.json` sibling is kept during writes.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// `logging` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingSection {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8000
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("config")
}

const fn default_event_chance() -> u32 {
    25
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/emporium.json")
}

fn default_level() -> String {
    String::from("info")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            update_password: String::new(),
            admin_ids: Vec::new(),
        }
    }
}

impl Default for GameSection {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            event_chance_percent: default_event_chance(),
            seed: None,
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl EmporiumConfig {
    /// Load `path` if it exists, otherwise defaults, then apply the
    /// process environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::parse(&std::fs::read_to_string(path)?)?
        } else {
            Self::default()
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Parse YAML without looking at the environment.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply overrides read through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = lookup("UPDATE_PASSWORD") {
            self.server.update_password = val;
        }
        if let Some(val) = lookup("EMPORIUM_PORT") {
            self.server.port = parse_env("EMPORIUM_PORT", val)?;
        }
        if let Some(val) = lookup("EMPORIUM_ADMIN_IDS") {
            self.server.admin_ids = val
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_owned)
                .collect();
        }
        if let Some(val) = lookup("EMPORIUM_CONFIG_DIR") {
            self.game.config_dir = PathBuf::from(val);
        }
        if let Some(val) = lookup("EMPORIUM_EVENT_CHANCE") {
            let chance: u32 = parse_env("EMPORIUM_EVENT_CHANCE", val)?;
            self.game.event_chance_percent = chance.min(100);
        }
        if let Some(val) = lookup("EMPORIUM_DB_PATH") {
            self.store.path = PathBuf::from(val);
        }
        if let Some(val) = lookup("EMPORIUM_LOG_JSON") {
            self.logging.json = matches!(val.trim(), "1" | "true" | "yes");
        }
        Ok(())
    }
}

fn parse_env<T>(var: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var,
        reason: e.to_string(),
        value,
    })
}
