use std::io;

use thiserror::Error;

/// Configuration error type.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a settings file.
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to parse TOML.
    #[error("Failed to parse config file at {path}: {source}")]
    ParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or inconsistent.
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The platform has no per-user configuration directory.
    #[error("Could not determine the user configuration directory")]
    NoConfigDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
