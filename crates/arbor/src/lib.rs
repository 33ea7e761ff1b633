//! # Arbor
//!
//! Interaction routing, authorization and ephemeral component state for chat
//! bots.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────┐     ┌──────────────────────────────────────┐
//! │ EventSource │────▶│ EventBus │────▶│ Pipeline (INTERACTION_CREATE)        │──▶ callbacks
//! └─────────────┘     │          │     │  kind → route → guards → state       │──▶ Responder
//!                     │          │────▶│ Readiness hook (READY)               │──▶ SchemaTransport
//!                     └──────────┘     └──────────────────────────────────────┘
//! ```
//!
//! - **Router**: command paths and custom-id prefixes linked to handlers, with
//!   partial command schemas merged per root command
//! - **Pipeline**: channel type, guild, developer and permission guards in a
//!   fixed order, then state lookup for components and modals
//! - **State store**: per-user payloads behind component custom ids, dropped
//!   after a TTL
//! - **Runtime**: configuration, logging and the event loop
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use arbor::prelude::*;
//!
//! let handler = LinkedHandler::command(|ctx: CommandContext| async move {
//!     info!(user = %ctx.user_id(), "pong");
//!     Ok(())
//! });
//!
//! let runtime = ArborRuntime::builder()
//!     .cache(cache)
//!     .responder(responder)
//!     .transport(transport)
//!     .link(
//!         LinkDefinition::command(CommandSchema::new("ping", "Ping"), handler)
//!             .options(HandlerOptions::in_channels(&[ChannelType::GuildText])),
//!     )
//!     .build()?;
//!
//! runtime.run(events).await?;
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use arbor_core as core;
pub use arbor_framework as framework;
pub use arbor_runtime as runtime;

/// Commonly used types for building handlers and wiring the runtime.
pub mod prelude {
    pub use arbor_runtime::{ArborConfig, ArborRuntime, ConfigLoader};

    pub use arbor_framework::{
        AutocompleteContext, AutocompleteResponse, CommandContext, ComponentContext,
        ComponentOptions, GuildRequirement, HandlerOptions, HandlerResult, LinkDefinition,
        LinkedHandler, MakeOptions, Router, StateStore, component_custom_id,
    };

    pub use arbor_core::{
        AutocompleteChoice, ChannelType, CommandOption, CommandSchema, CommandScope,
        EntityCache, ErrorSink, EventSource, GatewayEvent, Interaction, OptionType, Permission,
        Permissions, Rejection, Responder, SchemaTransport, Snowflake,
    };

    pub use arbor_runtime::prelude::*;
}
