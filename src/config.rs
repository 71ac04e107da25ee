//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub face: FaceConfig,

    #[serde(default)]
    pub ui: UiConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// REST backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/api/v1".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Session / token configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Interval of the background token refresh
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 {
    55 * 60 // tokens live for an hour
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

/// Face capture loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FaceConfig {
    #[serde(default = "default_capture_interval")]
    pub capture_interval_ms: u64,

    /// Delay before the next tick after a failed detection
    #[serde(default = "default_error_backoff")]
    pub error_backoff_ms: u64,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_capture_interval() -> u64 {
    500
}

fn default_error_backoff() -> u64 {
    1000
}

fn default_min_confidence() -> f64 {
    0.7
}

impl Default for FaceConfig {
    fn default() -> Self {
        Self {
            capture_interval_ms: default_capture_interval(),
            error_backoff_ms: default_error_backoff(),
            min_confidence: default_min_confidence(),
        }
    }
}

/// Global chrome configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_app_title")]
    pub app_title: String,

    #[serde(default = "default_max_toasts")]
    pub max_visible_toasts: usize,

    #[serde(default = "default_theme")]
    pub default_theme: String,
}

fn default_app_title() -> String {
    "BFP Sorsogon Attendance".to_string()
}

fn default_max_toasts() -> usize {
    3
}

fn default_theme() -> String {
    "light".to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            app_title: default_app_title(),
            max_visible_toasts: default_max_toasts(),
            default_theme: default_theme(),
        }
    }
}

/// What the router does with a fragment that matches no registered route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownRoutePolicy {
    /// Render the not-found view
    #[default]
    NotFound,
    /// Silently navigate to the default route
    RedirectToDefault,
}

/// Router configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RouterConfig {
    #[serde(default = "default_route")]
    pub default_route: String,

    #[serde(default)]
    pub unknown_route: UnknownRoutePolicy,
}

fn default_route() -> String {
    "/login".to_string()
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            default_route: default_route(),
            unknown_route: UnknownRoutePolicy::default(),
        }
    }
}

/// Persisted client state configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// JSON file holding tokens, theme and settings
    #[serde(default = "default_state_file")]
    pub state_file: String,

    #[serde(default = "default_token_key")]
    pub token_key: String,

    #[serde(default = "default_refresh_token_key")]
    pub refresh_token_key: String,

    #[serde(default = "default_remember_email_key")]
    pub remember_email_key: String,

    #[serde(default = "default_theme_key")]
    pub theme_key: String,

    #[serde(default = "default_settings_key")]
    pub settings_key: String,

    /// Where exported report files are written
    #[serde(default = "default_download_dir")]
    pub download_dir: String,
}

fn default_state_file() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("rollcall").join("state.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./rollcall_state.json".to_string())
}

fn default_token_key() -> String {
    "bfp_token".to_string()
}

fn default_refresh_token_key() -> String {
    "bfp_refresh_token".to_string()
}

fn default_remember_email_key() -> String {
    "remember_email".to_string()
}

fn default_theme_key() -> String {
    "theme".to_string()
}

fn default_download_dir() -> String {
    dirs::download_dir()
        .map(|p| p.join("rollcall").to_string_lossy().to_string())
        .unwrap_or_else(|| "./downloads".to_string())
}

fn default_settings_key() -> String {
    "bfp_settings".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            token_key: default_token_key(),
            refresh_token_key: default_refresh_token_key(),
            remember_email_key: default_remember_email_key(),
            theme_key: default_theme_key(),
            settings_key: default_settings_key(),
            download_dir: default_download_dir(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rollcall").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ROLLCALL_API_URL") {
            self.api.base_url = url;
        }
        if let Ok(timeout) = std::env::var("ROLLCALL_API_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.api.request_timeout_secs = secs;
            }
        }

        if let Ok(path) = std::env::var("ROLLCALL_STATE_FILE") {
            self.storage.state_file = path;
        }

        if let Ok(level) = std::env::var("ROLLCALL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ROLLCALL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Rollcall Configuration
#
# Environment variables override these settings:
# - ROLLCALL_API_URL
# - ROLLCALL_API_TIMEOUT_SECS
# - ROLLCALL_STATE_FILE
# - ROLLCALL_LOG_LEVEL
# - ROLLCALL_LOG_FORMAT

[api]
# Attendance backend base URL
base_url = "http://127.0.0.1:5000/api/v1"

# Client-side request timeout in seconds
request_timeout_secs = 30

[auth]
# Background token refresh interval (seconds)
refresh_interval_secs = 3300

[face]
# Delay between captured frames (ms)
capture_interval_ms = 500

# Delay after a failed detection tick (ms)
error_backoff_ms = 1000

# Minimum confidence for a recognized face to count as a match
min_confidence = 0.7

[ui]
app_title = "BFP Sorsogon Attendance"

# Toasts visible at once; the rest wait in line
max_visible_toasts = 3

# light or dark
default_theme = "light"

[router]
default_route = "/login"

# not_found: render the not-found view
# redirect_to_default: silently go to default_route
unknown_route = "not_found"

[storage]
# state_file = "~/.local/share/rollcall/state.json"
token_key = "bfp_token"
refresh_token_key = "bfp_refresh_token"
remember_email_key = "remember_email"
theme_key = "theme"
settings_key = "bfp_settings"
# download_dir = "~/Downloads/rollcall"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
