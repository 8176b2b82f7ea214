//! Configuration management for mongo-exporter
//!
//! Configuration is loaded from a TOML file and then overridden by
//! command-line arguments. Precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values
//!
//! A missing configuration file is not an error; defaults are used.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::export::ExportOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Connection configuration
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Export engine configuration
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection-related configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Connect and server-selection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Application name reported to the server
    #[serde(default = "default_app_name")]
    pub app_name: String,
}

/// Export engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Documents pulled from the cursor per round-trip
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Maximum number of collections exported at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-operation deadline in seconds (0 disables it)
    #[serde(default)]
    pub operation_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_timeout() -> u64 {
    30
}

fn default_app_name() -> String {
    "mongo-exporter".to_string()
}

fn default_batch_size() -> u32 {
    crate::export::DEFAULT_BATCH_SIZE
}

fn default_concurrency() -> usize {
    crate::export::DEFAULT_CONCURRENCY
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            app_name: default_app_name(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            operation_timeout: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to defaults
    ///
    /// # Arguments
    /// * `path` - Explicit config path, or `None` for [`Config::default_path`]
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded (and validated) configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mongo-exporter")
            .join("config.toml")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.export.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "export.batch_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.export.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "export.concurrency".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        if self.connection.timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connection.timeout".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl ConnectionConfig {
    /// Connect and server selection timeout as a Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl ExportConfig {
    /// Engine options derived from this configuration
    pub fn to_options(&self) -> ExportOptions {
        ExportOptions {
            batch_size: self.batch_size,
            concurrency: self.concurrency,
            operation_timeout: (self.operation_timeout > 0)
                .then(|| Duration::from_secs(self.operation_timeout)),
        }
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
