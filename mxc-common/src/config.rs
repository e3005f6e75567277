//! Configuration loading and resolution
//!
//! Every setting follows the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MXC_*`)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops startup: it is logged as a
//! warning and the remaining tiers are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const ENV_CONFIG: &str = "MXC_CONFIG";
pub const ENV_BIND: &str = "MXC_BIND";
pub const ENV_DATABASE: &str = "MXC_DATABASE";
pub const ENV_BITRIX_WEBHOOK_URL: &str = "MXC_BITRIX_WEBHOOK_URL";
pub const ENV_SCAN_COOLDOWN_MS: &str = "MXC_SCAN_COOLDOWN_MS";
pub const ENV_METRICS_PATH: &str = "MXC_METRICS_PATH";
pub const ENV_LOG_LEVEL: &str = "MXC_LOG_LEVEL";

/// Default scan cooldown for identical codes
pub const DEFAULT_SCAN_COOLDOWN_MS: u64 = 3000;

/// Default timeout for a single Bitrix24 REST call
pub const DEFAULT_BITRIX_TIMEOUT_SECS: u64 = 15;

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_folder: PathBuf,
    pub bind: String,
    pub log_level: String,
    pub scan_cooldown_ms: u64,
    pub bitrix_timeout_secs: u64,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let data_folder = dirs::data_local_dir()
            .map(|d| d.join("maxcheckin"))
            .unwrap_or_else(|| PathBuf::from("./maxcheckin_data"));

        Self {
            data_folder,
            bind: "127.0.0.1:5780".to_string(),
            log_level: "info".to_string(),
            scan_cooldown_ms: DEFAULT_SCAN_COOLDOWN_MS,
            bitrix_timeout_secs: DEFAULT_BITRIX_TIMEOUT_SECS,
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_folder.join("maxcheckin.db")
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.data_folder.join("screensaver_metrics.json")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub bind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BitrixSection {
    /// Inbound webhook base, e.g. `https://agency.bitrix24.com.br/rest/1/abc123`
    pub webhook_url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CheckinSection {
    pub scan_cooldown_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScreensaverSection {
    pub metrics_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: Option<String>,
}

/// On-disk TOML configuration. Every key is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerSection,
    pub database: DatabaseSection,
    pub bitrix: BitrixSection,
    pub checkin: CheckinSection,
    pub screensaver: ScreensaverSection,
    pub logging: LoggingConfig,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub database: Option<PathBuf>,
    pub bitrix_webhook_url: Option<String>,
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: String,
    pub database_path: PathBuf,
    pub bitrix_webhook_url: Option<String>,
    pub bitrix_timeout_secs: u64,
    pub scan_cooldown_ms: u64,
    pub metrics_path: PathBuf,
    pub log_level: String,
}

/// Resolves [`AppConfig`] from the four configuration tiers
pub struct ConfigResolver {
    cli: CliOverrides,
    defaults: CompiledDefaults,
}

impl ConfigResolver {
    pub fn new(cli: CliOverrides) -> Self {
        Self {
            cli,
            defaults: CompiledDefaults::for_current_platform(),
        }
    }

    pub fn with_defaults(cli: CliOverrides, defaults: CompiledDefaults) -> Self {
        Self { cli, defaults }
    }

    /// Locate the TOML file: `--config`, then `MXC_CONFIG`, then the
    /// user config dir, then `/etc/maxcheckin/config.toml`
    pub fn config_file_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli.config_path {
            return Some(path.clone());
        }
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            return Some(PathBuf::from(path));
        }

        let user_config = dirs::config_dir().map(|d| d.join("maxcheckin").join("config.toml"));
        if let Some(path) = user_config {
            if path.exists() {
                return Some(path);
            }
        }

        let system_config = PathBuf::from("/etc/maxcheckin/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
        None
    }

    /// Load the TOML tier, degrading to an empty config on any failure
    pub fn load_toml(&self) -> TomlConfig {
        let Some(path) = self.config_file_path() else {
            info!("No config file found, using environment and defaults");
            return TomlConfig::default();
        };

        match read_toml_config(&path) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                TomlConfig::default()
            }
        }
    }

    pub fn resolve(&self) -> AppConfig {
        let toml = self.load_toml();
        self.resolve_with(&toml)
    }

    /// Resolve against an already-loaded TOML tier
    pub fn resolve_with(&self, toml: &TomlConfig) -> AppConfig {
        let bind = self
            .cli
            .bind
            .clone()
            .or_else(|| env_string(ENV_BIND))
            .or_else(|| toml.server.bind.clone())
            .unwrap_or_else(|| self.defaults.bind.clone());

        let database_path = self
            .cli
            .database
            .clone()
            .or_else(|| env_string(ENV_DATABASE).map(PathBuf::from))
            .or_else(|| toml.database.path.clone())
            .unwrap_or_else(|| self.defaults.database_path());

        let bitrix_webhook_url = self
            .cli
            .bitrix_webhook_url
            .clone()
            .or_else(|| env_string(ENV_BITRIX_WEBHOOK_URL))
            .or_else(|| toml.bitrix.webhook_url.clone())
            .filter(|url| !url.trim().is_empty());

        let scan_cooldown_ms = env_parsed::<u64>(ENV_SCAN_COOLDOWN_MS)
            .or(toml.checkin.scan_cooldown_ms)
            .unwrap_or(self.defaults.scan_cooldown_ms);

        let metrics_path = env_string(ENV_METRICS_PATH)
            .map(PathBuf::from)
            .or_else(|| toml.screensaver.metrics_path.clone())
            .unwrap_or_else(|| self.defaults.metrics_path());

        let log_level = env_string(ENV_LOG_LEVEL)
            .or_else(|| toml.logging.level.clone())
            .unwrap_or_else(|| self.defaults.log_level.clone());

        AppConfig {
            bind,
            database_path,
            bitrix_webhook_url,
            bitrix_timeout_secs: toml
                .bitrix
                .timeout_secs
                .unwrap_or(self.defaults.bitrix_timeout_secs),
            scan_cooldown_ms,
            metrics_path,
            log_level,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
