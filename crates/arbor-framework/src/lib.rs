//! # Arbor Framework
//!
//! The routing, authorization and ephemeral-state engine.
//!
//! This layer provides:
//! - [`ExpiringMap`] and the [`StateStore`] built on it, for correlating
//!   component clicks with the command that produced them
//! - [`PermissionResolver`] for guild- and channel-level permission masks
//! - [`Router`], mapping command paths and custom-id prefixes to
//!   [`LinkedHandler`]s and merging partial command schemas
//! - [`Pipeline`], the fixed guard chain every interaction goes through
//! - [`EventBus`], which fans gateway events out to subscribers and contains
//!   their failures
//!
//! Collaborators (cache, responder, error sink) come from `arbor-core` and are
//! injected at construction.

pub mod bus;
pub mod error;
pub mod handler;
pub mod permissions;
pub mod pipeline;
pub mod router;
pub mod store;

pub use bus::{BoxedSubscriber, EventBus};
pub use error::{EventSkipped, FrameworkError, HandlerResult, RouterError, RouterResult};
pub use handler::{
    AutocompleteContext, AutocompleteResponse, BoxFuture, CommandContext, ComponentContext,
    ComponentOptions, GuildContext, GuildRequirement, HandlerOptions, LinkedHandler,
};
pub use permissions::{ChannelOverwriteContext, PermissionResolver};
pub use pipeline::{InteractionToggles, Pipeline, PipelineConfig, PipelineOutcome};
pub use router::{LinkDefinition, Route, Router, component_custom_id, split_custom_id};
pub use store::{
    DEFAULT_STATE_TTL, ExpiringMap, ExpiringSet, MakeOptions, StateEntry, StatePacket, StateStore,
};
