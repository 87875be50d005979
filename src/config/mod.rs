//! Configuration management for mongowire
//!
//! This module handles loading, parsing, and saving configuration:
//! - Identity inputs for ObjectId generation
//! - Transport settings (address, timeouts, frame size limit)
//! - Logging settings
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::wire::HEADER_LEN;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// ObjectId identity inputs
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Explicit identity inputs for ObjectId generation
///
/// Unset fields fall back to a hostname-derived machine id and the current
/// process id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// 24-bit machine id
    #[serde(default)]
    pub machine_id: Option<u32>,

    /// 16-bit process id
    #[serde(default)]
    pub process_id: Option<u16>,
}

/// Transport-related configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Server host name or address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Per-read/write timeout in seconds
    #[serde(default = "default_io_timeout")]
    pub io_timeout: u64,

    /// Largest accepted inbound message in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    27017
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_io_timeout() -> u64 {
    30
}

fn default_max_message_size() -> usize {
    48 * 1024 * 1024
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            connect_timeout: default_connect_timeout(),
            io_timeout: default_io_timeout(),
            max_message_size: default_max_message_size(),
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
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Explicit file, or `None` for [`Config::default_path`]
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration; defaults when the default
    ///   file does not exist, `FileNotFound` when an explicit one does not
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path(), false),
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - `~/.mongowire/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".mongowire")
            .join("config.toml")
    }

    /// Save configuration to a file, creating parent directories
    ///
    /// # Arguments
    /// * `path` - Path where to save the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Success or error
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Render configuration as TOML text
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, `InvalidValue` naming the first bad field
    pub fn validate(&self) -> Result<()> {
        if self.transport.port == 0 {
            return Err(invalid("transport.port", self.transport.port));
        }
        if self.transport.host.trim().is_empty() {
            return Err(invalid("transport.host", &self.transport.host));
        }
        if self.transport.max_message_size < HEADER_LEN {
            return Err(invalid("transport.max_message_size", self.transport.max_message_size));
        }
        if self.transport.max_message_size > i32::MAX as usize {
            return Err(invalid("transport.max_message_size", self.transport.max_message_size));
        }
        if let Some(machine_id) = self.identity.machine_id
            && machine_id >= 1 << 24
        {
            return Err(invalid("identity.machine_id", machine_id));
        }
        Ok(())
    }

    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        self.transport.connect_timeout()
    }
}

impl TransportConfig {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout)
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

fn invalid(field: &str, value: impl ToString) -> crate::error::WireError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport.address(), "localhost:27017");
        assert_eq!(config.identity, IdentityConfig::default());
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeouts() {
        let config = Config::default();
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.transport.io_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = Config::from_toml(
            r#"
            [identity]
            machine_id = 42

            [transport]
            port = 27018
            "#,
        )
        .unwrap();
        assert_eq!(config.identity.machine_id, Some(42));
        assert_eq!(config.identity.process_id, None);
        assert_eq!(config.transport.port, 27018);
        assert_eq!(config.transport.host, "localhost");
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_invalid_toml() {
        let err = Config::from_toml("[transport]\nport = \"nope\"").unwrap_err();
        assert!(matches!(err, crate::error::WireError::Config(ConfigError::InvalidFormat(_))));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.transport.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.transport.max_message_size = 8;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.identity.machine_id = Some(1 << 24);
        match config.validate().unwrap_err() {
            crate::error::WireError::Config(ConfigError::InvalidValue { field, .. }) => {
                assert_eq!(field, "identity.machine_id");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("mongowire-config-{}", std::process::id()));
        let path = dir.join("nested").join("config.toml");

        let mut config = Config::default();
        config.identity.process_id = Some(77);
        config.logging.level = LogLevel::Debug;
        config.save(&path).unwrap();

        let loaded = Config::load_from_file(Some(&path)).unwrap();
        assert_eq!(loaded, config);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_explicit_missing_file() {
        let path = std::env::temp_dir().join("mongowire-definitely-missing.toml");
        let err = Config::load_from_file(Some(&path)).unwrap_err();
        assert!(matches!(err, crate::error::WireError::Config(ConfigError::FileNotFound(_))));
    }
}
