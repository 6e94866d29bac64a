pub mod loader;
pub mod types;

pub use loader::{ConfigError, MAX_READ_BUFFER_SIZE};
pub use types::{CaptureConfig, Config, LogConfig, LoggingConfig};
