//! Configuration error types.

use std::path::PathBuf;

use arbor_core::Snowflake;
use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// A file or environment value could not be extracted into the schema.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {message}")]
    ValidationError { message: String },

    /// Missing required field.
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// The same user is listed as a developer more than once.
    #[error("Duplicate developer id: {0}")]
    DuplicateDeveloper(Snowflake),

    /// A level or filter directive `tracing` does not understand.
    #[error("Invalid log level '{value}' for '{target}'")]
    InvalidLogLevel { target: String, value: String },
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    pub fn invalid_log_level(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidLogLevel {
            target: target.into(),
            value: value.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
