//! Error types for the Arbor framework.

use thiserror::Error;
use tower::BoxError;

use arbor_core::ApiError;

/// Returned by a bus subscriber that does not handle the event it was given.
///
/// The bus recognises this error and skips the subscriber without logging
/// anything. All other errors are treated as genuine failures.
#[derive(Debug, Clone, Error)]
#[error("event skipped by subscriber")]
pub struct EventSkipped;

/// Errors raised while registering definitions with the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The definition has neither a command schema nor component prefixes.
    #[error("definition registers no routing keys")]
    EmptyDefinition,

    /// Two definitions claim the same routing key.
    #[error("routing key '{path}' is already linked")]
    DuplicateRoute {
        /// The contested key.
        path: String,
    },

    /// A command definition was linked without a `callback`.
    #[error("command '{path}' has no callback")]
    MissingCallback {
        /// Root command name.
        path: String,
    },

    /// The merged schema no longer deserializes.
    #[error("merged schema for '{name}' is invalid: {source}")]
    InvalidSchema {
        /// Root command name.
        name: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for router registration.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors reported to the operator error sink.
#[derive(Debug, Error)]
pub enum FrameworkError {
    /// No options or handler are linked for a routing key.
    #[error("no linked definition found for path: {path}")]
    MissingRoute {
        /// The routing key.
        path: String,
    },

    /// The linked handler lacks the callback this event needs.
    #[error("handler for '{path}' has no {capability} callback")]
    MissingCapability {
        /// The routing key.
        path: String,
        /// `component`, `modal` or `autocomplete`.
        capability: &'static str,
    },

    /// A handler declares an empty set of allowed channel types.
    #[error("handler for '{path}' allows no channel types")]
    ChannelTypesUnconfigured {
        /// The routing key.
        path: String,
    },

    /// A component or modal interaction arrived without a custom id.
    #[error("interaction '{interaction_id}' was missing a custom id")]
    MissingCustomId {
        /// The interaction id.
        interaction_id: String,
    },

    /// Guild, member or channel records were not in the cache.
    #[error("cache data for interaction '{interaction_id}' was missing: {detail}")]
    ContextUnavailable {
        /// The interaction id.
        interaction_id: String,
        /// Requested and resolved ids.
        detail: String,
    },

    /// A subscriber returned an error.
    #[error("subscriber for '{event}' failed ({correlation_id}): {source}")]
    HandlerFailed {
        /// Event name.
        event: String,
        /// Id logged alongside the failure.
        correlation_id: String,
        /// Underlying error.
        #[source]
        source: BoxError,
    },

    /// A subscriber exceeded the bus timeout.
    #[error("subscriber for '{event}' timed out after {timeout_ms}ms ({correlation_id})")]
    HandlerTimeout {
        /// Event name.
        event: String,
        /// Id logged alongside the failure.
        correlation_id: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// A subscriber panicked.
    #[error("subscriber for '{event}' panicked ({correlation_id}): {message}")]
    HandlerPanicked {
        /// Event name.
        event: String,
        /// Id logged alongside the failure.
        correlation_id: String,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// Replying to an interaction failed.
    #[error("failed to reply to interaction '{interaction_id}': {source}")]
    ReplyFailed {
        /// The interaction id.
        interaction_id: String,
        /// Underlying error.
        #[source]
        source: ApiError,
    },
}

/// Result type returned by user handlers.
pub type HandlerResult = Result<(), BoxError>;
