use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::sink::{SinkOptions, DEFAULT_READ_BUFFER_SIZE};

/// Root configuration container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which standard streams are intercepted and how they are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Capture stdout (default: true).
    #[serde(default = "default_true")]
    pub stdout: bool,
    /// Capture stderr (default: true).
    #[serde(default = "default_true")]
    pub stderr: bool,
    /// Bytes per read from the intercepted pipe (default: 8192).
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

/// The log file captured output ends up in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Path of the log file (default: "latelog.log").
    #[serde(default = "default_log_path")]
    pub path: PathBuf,
    /// Append instead of truncating (default: false).
    #[serde(default)]
    pub append: bool,
    /// Hold an exclusive lock on the file while writing (default: true).
    #[serde(default = "default_true")]
    pub lock: bool,
}

/// Diagnostics emitted by latelog itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level used when RUST_LOG is unset (default: "info").
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_true() -> bool {
    true
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_log_path() -> PathBuf {
    PathBuf::from("latelog.log")
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stderr: true,
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            append: false,
            lock: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl CaptureConfig {
    pub fn sink_options(&self, label: &str) -> SinkOptions {
        SinkOptions {
            label: label.to_string(),
            read_buffer_size: self.read_buffer_size,
        }
    }
}
