//! Integration layer - interfaces to the collaborators the engine consumes.
//!
//! - Entity cache ([`EntityCache`], with [`MemoryCache`])
//! - Operator error sink ([`ErrorSink`])
//! - Reply channel, schema transport and event source

pub mod cache;
pub mod sink;
pub mod transport;

pub use cache::{BoxedEntityCache, EntityCache, MemoryCache};
pub use sink::{BoxedErrorSink, ErrorSink, TracingErrorSink};
pub use transport::{
    BoxedResponder, BoxedSchemaTransport, CommandScope, EventSource, Responder, SchemaTransport,
};
