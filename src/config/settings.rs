//! Server settings and configuration loading.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading or validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML configuration.
    #[error("Failed to parse TOML configuration: {0}")]
    TomlParseError(#[from] toml::de::Error),

    /// Failed to parse JSON configuration.
    #[error("Failed to parse JSON configuration: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Unsupported file format.
    #[error("Unsupported configuration file format: {0}")]
    UnsupportedFormat(String),
}

/// Main server configuration.
///
/// # Configuration Precedence
///
/// Settings are applied in the following order (later sources override
/// earlier):
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables (`COBROWSE_*`)
/// 4. CLI arguments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address to bind the server on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Port the server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Rendering viewport width in pixels.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Rendering viewport height in pixels.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Seconds between reaper sweeps of empty rooms.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,

    /// Bound on how long a page navigation may take, in milliseconds.
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
}

// Default value functions for serde
fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_viewport_width() -> u32 {
    1280
}

fn default_viewport_height() -> u32 {
    720
}

fn default_reap_interval_secs() -> u64 {
    60
}

fn default_navigation_timeout_ms() -> u64 {
    30_000
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: default_port(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            reap_interval_secs: default_reap_interval_secs(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
        }
    }
}

impl ServerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads settings from a configuration file.
    ///
    /// Supports both TOML and JSON formats, detected by file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "toml" => Ok(toml::from_str(&content)?),
            "json" => Ok(serde_json::from_str(&content)?),
            ext => Err(ConfigError::UnsupportedFormat(ext.to_string())),
        }
    }

    /// Applies environment variable overrides to current settings.
    ///
    /// Variables are prefixed with `COBROWSE_`, e.g. `COBROWSE_PORT`,
    /// `COBROWSE_REAP_INTERVAL_SECS`.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("COBROWSE_BIND_ADDR") {
            self.bind_addr = val;
        }

        if let Ok(val) = env::var("COBROWSE_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }

        if let Ok(val) = env::var("COBROWSE_VIEWPORT_WIDTH") {
            if let Ok(width) = val.parse() {
                self.viewport_width = width;
            }
        }

        if let Ok(val) = env::var("COBROWSE_VIEWPORT_HEIGHT") {
            if let Ok(height) = val.parse() {
                self.viewport_height = height;
            }
        }

        if let Ok(val) = env::var("COBROWSE_REAP_INTERVAL_SECS") {
            if let Ok(secs) = val.parse() {
                self.reap_interval_secs = secs;
            }
        }

        if let Ok(val) = env::var("COBROWSE_NAVIGATION_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                self.navigation_timeout_ms = ms;
            }
        }
    }

    /// Merges current settings with environment variable overrides.
    pub fn merge_with_env(mut self) -> Self {
        self.apply_env_overrides();
        self
    }

    /// Merges settings with parsed CLI arguments.
    pub fn merge_with_args(mut self, args: &CliArgs) -> Self {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(width) = args.width {
            self.viewport_width = width;
        }
        if let Some(height) = args.height {
            self.viewport_height = height;
        }
        if let Some(secs) = args.reap_interval_secs {
            self.reap_interval_secs = secs;
        }
        if let Some(ms) = args.navigation_timeout_ms {
            self.navigation_timeout_ms = ms;
        }
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ValidationError(
                "Port cannot be 0".to_string(),
            ));
        }
        if self.viewport_width == 0 || self.viewport_height == 0 {
            return Err(ConfigError::ValidationError(
                "Viewport dimensions cannot be 0".to_string(),
            ));
        }
        if self.reap_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "Reap interval cannot be 0".to_string(),
            ));
        }
        if self.navigation_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "Navigation timeout cannot be 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parsed CLI arguments, applied as the last override layer.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_file: Option<PathBuf>,
    pub port: Option<u16>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub reap_interval_secs: Option<u64>,
    pub navigation_timeout_ms: Option<u64>,
}

impl CliArgs {
    /// Loads settings applying the full precedence chain.
    pub fn load_settings(&self) -> Result<ServerSettings, ConfigError> {
        let settings = match &self.config_file {
            Some(path) => ServerSettings::from_file(path)?,
            None => ServerSettings::default(),
        };

        let settings = settings.merge_with_env().merge_with_args(self);
        settings.validate()?;
        Ok(settings)
    }
}
