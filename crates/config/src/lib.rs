//! INI configuration loading and logging setup.

pub mod config_file;
pub mod error;
pub mod logs;

pub use config_file::{load, ParsedConfig};
pub use error::ConfigError;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
