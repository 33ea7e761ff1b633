//! Runtime error types.

use arbor_framework::RouterError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A handler definition could not be linked.
    #[error("Failed to link handler: {0}")]
    Router(#[from] RouterError),

    /// A required collaborator was not supplied to the builder.
    #[error("Missing collaborator: {0}")]
    MissingCollaborator(&'static str),

    #[error("Runtime is already running")]
    AlreadyRunning,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
