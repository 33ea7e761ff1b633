//! Configuration for the Arbor runtime.
//!
//! Typed settings for logging, the engine and command registration, loaded
//! from TOML/YAML files and `ARBOR_*` environment variables.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    ArborConfig, CommandsConfig, FrameworkConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
