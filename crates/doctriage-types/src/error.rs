//! Configuration error types.

use thiserror::Error;

/// Errors produced while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Convenience alias for results in this crate.
pub type Result<T> = std::result::Result<T, ConfigError>;
