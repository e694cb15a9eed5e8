//! Configuration loading and resolution
//!
//! Bootstrap configuration is read from a TOML file. Every field has a
//! compiled default, so a missing or partial file never prevents startup.
//!
//! Resolution priority for the config file location:
//! 1. Command-line argument (highest priority)
//! 2. `BACKPACK_CONFIG` environment variable
//! 3. `~/.config/backpack/backpack-draft.toml` (if present)
//! 4. Compiled defaults (fallback)
//!
//! After loading, `BACKPACK_API_URL` and `BACKPACK_API_TOKEN` override the
//! corresponding `[api]` values.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "BACKPACK_CONFIG";
/// Environment variable overriding `[api] base_url`
pub const ENV_API_URL: &str = "BACKPACK_API_URL";
/// Environment variable overriding `[api] token`
pub const ENV_API_TOKEN: &str = "BACKPACK_API_TOKEN";

const CONFIG_DIR_NAME: &str = "backpack";
const CONFIG_FILE_NAME: &str = "backpack-draft.toml";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Backend API connection
    #[serde(default)]
    pub api: ApiConfig,

    /// Item status polling
    #[serde(default)]
    pub polling: PollingConfig,

    /// Draft editing behaviour
    #[serde(default)]
    pub drafts: DraftSettings,

    /// Commit behaviour
    #[serde(default)]
    pub commit: CommitSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the backend (without the `/api` prefix)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent as `Authorization` header (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Status polling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between status queries for one item
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    /// Consecutive failed queries tolerated before an item is marked failed
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Draft editing settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DraftSettings {
    /// Where manually added learning goals are inserted
    #[serde(default)]
    pub goal_insert: GoalInsertPolicy,
}

/// Commit settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitSettings {
    /// What to do when linking or goal persistence partially fails
    #[serde(default)]
    pub policy: CommitPolicy,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Placement of a manually added learning goal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalInsertPolicy {
    /// New goal becomes the last entry
    #[default]
    Append,
    /// New goal becomes the first entry
    Prepend,
}

/// Behaviour on partial commit failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Keep the created module, report failed sub-steps
    #[default]
    BestEffort,
    /// Delete the created module and keep the draft for another attempt
    Compensate,
}

fn default_base_url() -> String {
    "http://localhost:5055".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl TomlConfig {
    /// Apply `BACKPACK_API_URL` / `BACKPACK_API_TOKEN` overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_API_URL) {
            if !url.trim().is_empty() {
                debug!(base_url = %url, "API base URL overridden from environment");
                self.api.base_url = url;
            }
        }
        if let Ok(token) = std::env::var(ENV_API_TOKEN) {
            if !token.trim().is_empty() {
                self.api.token = Some(token);
            }
        }
    }

    /// Reject values the workflow cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::Config("api.base_url must not be empty".to_string()));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "api.base_url must be an http(s) URL: {}",
                self.api.base_url
            )));
        }
        if self.polling.interval_ms == 0 {
            return Err(Error::Config("polling.interval_ms must be greater than 0".to_string()));
        }
        if self.polling.max_attempts == 0 {
            return Err(Error::Config("polling.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Default config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Resolve which config file to read, if any
///
/// An explicitly named file (CLI or environment) is returned even when it
/// does not exist so the caller can report it; the platform default is only
/// returned when present.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform default
    default_config_path().filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load configuration with graceful degradation
///
/// A missing file is not fatal: a warning is logged and compiled defaults are
/// used. A file that exists but fails to parse is an error. Environment
/// overrides are applied last and the result is validated.
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Configuration loaded from {}", path.display());
            config
        }
        Some(path) => {
            warn!("Config file not found: {} (using defaults)", path.display());
            TomlConfig::default()
        }
        None => {
            debug!("No config file found, using compiled defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Write a config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
