//! # Arbor Core
//!
//! Shared vocabulary of the Arbor interaction engine.
//!
//! ## Foundation Layer
//!
//! Records and identifiers:
//! - **Ids and permissions**: [`Snowflake`], [`Permission`], [`Permissions`]
//! - **Entities**: [`Guild`], [`Member`], [`Role`], [`Channel`], [`Overwrite`]
//! - **Interactions**: [`Interaction`], [`CommandDataOption`], [`ModalComponent`]
//! - **Schemas**: [`CommandSchema`], [`CommandOption`]
//! - **Events**: [`Event`], [`GatewayEvent`]
//! - **Replies**: [`Rejection`], [`AutocompleteChoice`]
//!
//! ## Integration Layer
//!
//! Interfaces the engine consumes but never implements itself:
//! - [`EntityCache`] (with the in-memory [`MemoryCache`])
//! - [`ErrorSink`] (with [`TracingErrorSink`])
//! - [`Responder`], [`SchemaTransport`], [`EventSource`]
//!
//! ```text
//! ┌──────────────┐     ┌───────────┐     ┌──────────┐
//! │ EventSource  │────▶│  Engine   │────▶│ Responder│
//! └──────────────┘     │ (arbor-   │     └──────────┘
//!                      │ framework)│────▶ ErrorSink
//!   EntityCache ──────▶└───────────┘────▶ SchemaTransport
//! ```

pub mod error;
pub mod foundation;
pub mod integration;

pub use error::{ApiError, ApiResult};
pub use foundation::{
    AutocompleteChoice, Channel, ChannelType, CommandDataOption, CommandOption, CommandSchema,
    Event, GatewayEvent, Guild, INTERACTION_CREATE, Interaction, InteractionData,
    InteractionKind, Member, ModalComponent, OptionType, Overwrite, OverwriteKind, Permission,
    PermissionScope, Permissions, PrincipalKind, READY, Ready, Rejection, RejectionCategory,
    RejectionCause, Role, Snowflake, UnknownPermission,
};
pub use integration::{
    BoxedEntityCache, BoxedErrorSink, BoxedResponder, BoxedSchemaTransport, CommandScope,
    EntityCache, ErrorSink, EventSource, MemoryCache, Responder, SchemaTransport,
    TracingErrorSink,
};
