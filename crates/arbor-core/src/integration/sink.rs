//! Operator error sink.

use std::error::Error as StdError;
use std::sync::Arc;

use tracing::error;

/// Receives errors that operators should see.
///
/// `report` is fire-and-forget: implementations must not block, and callers
/// never wait on the outcome.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &(dyn StdError + Send + Sync), context: Option<&str>);
}

/// A boxed, shareable error sink.
pub type BoxedErrorSink = Arc<dyn ErrorSink>;

/// An [`ErrorSink`] that writes every report as an `ERROR` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, err: &(dyn StdError + Send + Sync), context: Option<&str>) {
        match context {
            Some(context) => error!(error = %err, context, "Reported error"),
            None => error!(error = %err, "Reported error"),
        }
    }
}

impl<F> ErrorSink for F
where
    F: Fn(&(dyn StdError + Send + Sync), Option<&str>) + Send + Sync,
{
    fn report(&self, err: &(dyn StdError + Send + Sync), context: Option<&str>) {
        (self)(err, context)
    }
}
