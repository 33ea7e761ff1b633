//! Error types for calls into external collaborators.
//!
//! Engine-level errors (routing, handler failures) live in arbor-framework.

use thiserror::Error;

/// Errors returned by the platform-facing collaborators: the reply channel,
/// the schema transport and on-demand entity fetches.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The collaborator is not connected.
    #[error("not connected")]
    NotConnected,

    /// The requested entity does not exist upstream.
    #[error("{entity} '{id}' not found")]
    NotFound {
        /// Entity kind, e.g. "member".
        entity: &'static str,
        /// The requested id.
        id: String,
    },

    /// The platform rejected the request.
    #[error("request failed with status {status}: {message}")]
    Request {
        /// Status code returned by the platform.
        status: u16,
        /// Error message returned by the platform.
        message: String,
    },

    /// The request was rate limited.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested back-off in milliseconds.
        retry_after_ms: u64,
    },

    /// The interaction was already acknowledged.
    #[error("interaction already acknowledged")]
    AlreadyAcknowledged,

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates a not-found error.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates a generic error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

/// Result type for collaborator calls.
pub type ApiResult<T> = Result<T, ApiError>;
