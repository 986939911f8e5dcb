pub mod env;

use crate::error::config::ConfigError;
use crate::retry::BackoffPolicy;
use crate::retry::backoff_policy::{ACCOUNT_BASE, ACCOUNT_CAP, LOCATION_CAP, LOCATION_SCALE};
use crate::retry::fetch_cache::DEFAULT_TTL;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{LevelFilter, info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_DIR_NAME: &str = "vpn-bridge";
const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_IPC_PORT: u16 = 19876;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcConfig {
    #[serde(default = "default_ipc_port")]
    pub port: u16,
    /// Generated at start-up when absent.
    pub auth_token: Option<String>,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            port: default_ipc_port(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_location_scale_ms")]
    pub location_scale_ms: u64,
    #[serde(default = "default_location_cap_ms")]
    pub location_cap_ms: u64,
    #[serde(default = "default_account_base_ms")]
    pub account_base_ms: u64,
    #[serde(default = "default_account_cap_ms")]
    pub account_cap_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            location_scale_ms: default_location_scale_ms(),
            location_cap_ms: default_location_cap_ms(),
            account_base_ms: default_account_base_ms(),
            account_cap_ms: default_account_cap_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl RetryConfig {
    pub fn location_backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.location_scale_ms),
            Duration::from_millis(self.location_cap_ms),
        )
    }

    pub fn account_backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.account_base_ms),
            Duration::from_millis(self.account_cap_ms),
        )
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub ipc: IpcConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    /// `log::LevelFilter` name; the build default applies when absent.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            ipc: IpcConfig::default(),
            retry: RetryConfig::default(),
            log_level: None,
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_ipc_port() -> u16 {
    DEFAULT_IPC_PORT
}
fn default_location_scale_ms() -> u64 {
    LOCATION_SCALE.as_millis() as u64
}
fn default_location_cap_ms() -> u64 {
    LOCATION_CAP.as_millis() as u64
}
fn default_account_base_ms() -> u64 {
    ACCOUNT_BASE.as_millis() as u64
}
fn default_account_cap_ms() -> u64 {
    ACCOUNT_CAP.as_millis() as u64
}
fn default_cache_ttl_secs() -> u64 {
    DEFAULT_TTL.as_secs()
}

// ============================================
// IMPLEMENTATION
// ============================================

/// `{platform config dir}/vpn-bridge`.
///
/// # Errors
///
/// [`ConfigError::DirectoryNotFound`] on platforms without a config directory.
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| ConfigError::DirectoryNotFound {
            location: ErrorLocation::from(Location::caller()),
        })
}

impl BridgeConfig {
    /// Load config from {config_dir}/config.json.
    ///
    /// # Returns
    ///
    /// Returns `Ok(BridgeConfig)` if loaded successfully or defaults if file missing.
    /// Returns `Err(ConfigError)` if file exists but is corrupted/invalid.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: BridgeConfig = serde_json::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config JSON: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Load, then apply `.env` and environment overrides, then validate again.
    pub fn load_with_env(config_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(config_dir)?;
        env::try_load_dotenv();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to {config_dir}/config.json using atomic write.
    ///
    /// Uses temp file + rename for atomicity (no corruption on crash).
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Overlay values from `lookup` (normally the process environment).
    ///
    /// # Errors
    ///
    /// [`ConfigError::EnvOverride`] if a variable is set but unparseable.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(env::IPC_PORT_VAR) {
            self.ipc.port = port.trim().parse().map_err(|e| ConfigError::EnvOverride {
                location: ErrorLocation::from(Location::caller()),
                variable: env::IPC_PORT_VAR.to_string(),
                reason: format!("{e}"),
            })?;
            info!("IPC port overridden from {}", env::IPC_PORT_VAR);
        }

        if let Some(token) = lookup(env::IPC_TOKEN_VAR) {
            self.ipc.auth_token = Some(token);
            info!("IPC auth token overridden from {}", env::IPC_TOKEN_VAR);
        }

        if let Some(level) = lookup(env::LOG_LEVEL_VAR) {
            self.log_level = Some(level.trim().to_string());
        }

        Ok(())
    }

    /// Parsed `log_level`, if set.
    pub fn log_level_filter(&self) -> Option<LevelFilter> {
        self.log_level
            .as_deref()
            .and_then(|level| LevelFilter::from_str(level).ok())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::validation(format!(
                "Invalid version: {} (expected 1-{})",
                self.version, CONFIG_VERSION
            )));
        }

        if self.ipc.port == 0 {
            return Err(ConfigError::validation("ipc.port cannot be 0"));
        }

        if let Some(ref token) = self.ipc.auth_token {
            if token.is_empty() {
                return Err(ConfigError::validation(
                    "ipc.auth_token cannot be empty string",
                ));
            }
        }

        let retry = &self.retry;
        if retry.location_scale_ms == 0 || retry.location_cap_ms < retry.location_scale_ms {
            return Err(ConfigError::validation(format!(
                "Invalid location backoff: scale {}ms, cap {}ms",
                retry.location_scale_ms, retry.location_cap_ms
            )));
        }
        if retry.account_base_ms == 0 || retry.account_cap_ms < retry.account_base_ms {
            return Err(ConfigError::validation(format!(
                "Invalid account backoff: base {}ms, cap {}ms",
                retry.account_base_ms, retry.account_cap_ms
            )));
        }
        if retry.cache_ttl_secs == 0 {
            return Err(ConfigError::validation("retry.cache_ttl_secs cannot be 0"));
        }

        if let Some(ref level) = self.log_level {
            if LevelFilter::from_str(level).is_err() {
                return Err(ConfigError::validation(format!(
                    "Invalid log level: {level}"
                )));
            }
        }

        Ok(())
    }
}
