use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::types::Config;

/// Largest accepted read size for intercepted pipes.
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },
}

impl Config {
    /// Returns the path to the configuration file.
    ///
    /// Uses `~/.config/latelog/config.toml` on Unix,
    /// or equivalent on other platforms via `dirs::config_dir()`.
    /// Falls back to current directory if config_dir is unavailable.
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        config_dir.join("latelog").join("config.toml")
    }

    /// Loads configuration from the default config file.
    ///
    /// A missing file yields `Config::default()`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();

        if !path.exists() {
            return Ok(Config::default());
        }

        Self::load_from(&path)
    }

    /// Loads and validates configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// Checks:
    /// - At least one stream is captured
    /// - The read buffer size is between 1 byte and 1 MiB
    /// - The log path is not empty
    /// - The log level is known
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.capture.stdout && !self.capture.stderr {
            return Err(ConfigError::ValidationError {
                message: "At least one of stdout or stderr must be captured".to_string(),
            });
        }

        let size = self.capture.read_buffer_size;
        if size == 0 || size > MAX_READ_BUFFER_SIZE {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "read_buffer_size must be between 1 and {} bytes, got {}",
                    MAX_READ_BUFFER_SIZE, size
                ),
            });
        }

        if self.log.path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError {
                message: "Log path must not be empty".to_string(),
            });
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "Unknown log level '{}', expected one of: {}",
                    self.logging.level,
                    LEVELS.join(", ")
                ),
            });
        }

        Ok(())
    }
}
