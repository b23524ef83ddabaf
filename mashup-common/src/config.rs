//! Configuration loading and resolution
//!
//! Bootstrap configuration comes from a TOML file; secrets and the database path
//! may be overridden from the environment. Priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "MASHUP_CONFIG";
/// Environment variable overriding the SQLite database path
pub const DATABASE_PATH_ENV: &str = "MASHUP_DATABASE";
/// Environment variable overriding the Spotify client id
pub const SPOTIFY_CLIENT_ID_ENV: &str = "MASHUP_SPOTIFY_CLIENT_ID";
/// Environment variable overriding the Spotify client secret
pub const SPOTIFY_CLIENT_SECRET_ENV: &str = "MASHUP_SPOTIFY_CLIENT_SECRET";

const DEFAULT_API_BASE_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Path to SQLite database file
    ///
    /// If not specified, falls back to the platform data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Acoustic-data service connection settings
    #[serde(default)]
    pub spotify: SpotifyConfig,

    /// Section fetch batching (third-party quota guard)
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Spotify Web API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    /// OAuth client id (client-credentials flow)
    #[serde(default)]
    pub client_id: Option<String>,

    /// OAuth client secret
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Base URL for Web API requests
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Token endpoint for the client-credentials flow
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Upper bound on requests per second across all calls
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Per-request transport timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_base_url: default_api_base_url(),
            token_url: default_token_url(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Batching policy for section fetches
///
/// At most `request_amount` fetches are outstanding at once, and
/// `request_interval_ms` elapses between consecutive batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_request_amount")]
    pub request_amount: usize,

    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
}

impl BatchConfig {
    pub fn new(request_amount: usize, request_interval: Duration) -> Self {
        Self {
            request_amount,
            request_interval_ms: request_interval.as_millis() as u64,
        }
    }

    /// Delay inserted between batches
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            request_amount: default_request_amount(),
            request_interval_ms: default_request_interval_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_token_url() -> String {
    DEFAULT_TOKEN_URL.to_string()
}

fn default_requests_per_second() -> u32 {
    10
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_request_amount() -> usize {
    5
}

fn default_request_interval_ms() -> u64 {
    1000
}

impl TomlConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch.request_amount == 0 {
            return Err(Error::Config(
                "batch.request_amount must be at least 1".to_string(),
            ));
        }
        if self.spotify.requests_per_second == 0 {
            return Err(Error::Config(
                "spotify.requests_per_second must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply environment overrides for secrets and the database path
    pub fn apply_env_overrides(&mut self) {
        if let Some(id) = non_empty_env(SPOTIFY_CLIENT_ID_ENV) {
            debug!("Spotify client id loaded from environment");
            self.spotify.client_id = Some(id);
        }
        if let Some(secret) = non_empty_env(SPOTIFY_CLIENT_SECRET_ENV) {
            debug!("Spotify client secret loaded from environment");
            self.spotify.client_secret = Some(secret);
        }
        if let Some(path) = non_empty_env(DATABASE_PATH_ENV) {
            self.database_path = Some(PathBuf::from(path));
        }
    }

    /// Effective database path (configured value or platform default)
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(default_database_path)
    }

    /// Client credentials, if both halves are configured
    pub fn spotify_credentials(&self) -> Result<(String, String)> {
        match (&self.spotify.client_id, &self.spotify.client_secret) {
            (Some(id), Some(secret)) if is_valid_key(id) && is_valid_key(secret) => {
                Ok((id.clone(), secret.clone()))
            }
            _ => Err(Error::Config(format!(
                "Spotify credentials not configured. Set {} and {} or add \
                 client_id/client_secret under [spotify] in the config file",
                SPOTIFY_CLIENT_ID_ENV, SPOTIFY_CLIENT_SECRET_ENV
            ))),
        }
    }
}

/// Validate a credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_valid_key(v))
}

/// Parse a TOML config file and validate it
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Locate the config file: CLI argument → environment → platform default
///
/// Returns `None` when no explicit path is given and the default file does not exist.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Some(path) = non_empty_env(CONFIG_PATH_ENV) {
        return Some(PathBuf::from(path));
    }

    default_config_path().filter(|p| p.exists())
}

/// Load configuration following the priority order in the module docs
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_arg) {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)?
        }
        None => {
            info!("No config file found, using built-in defaults");
            TomlConfig::default()
        }
    };

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Platform config file location (`<config dir>/mashup/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mashup").join("config.toml"))
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mashup").join("mashup.db"))
        .unwrap_or_else(|| PathBuf::from("./mashup_data/mashup.db"))
}
