//! Foundation layer - records and identifiers shared by every other layer.
//!
//! - Platform ids and permission bitmasks
//! - Cached entities (guilds, members, roles, channels)
//! - Interaction payloads and command schemas
//! - Gateway events and rejection payloads

pub mod entity;
pub mod event;
pub mod id;
pub mod interaction;
pub mod permission;
pub mod response;
pub mod schema;

pub use entity::{Channel, ChannelType, Guild, Member, Overwrite, OverwriteKind, Role};
pub use event::{Event, GatewayEvent, INTERACTION_CREATE, READY, Ready};
pub use id::Snowflake;
pub use interaction::{
    CommandDataOption, Interaction, InteractionData, InteractionKind, ModalComponent,
};
pub use permission::{Permission, Permissions, UnknownPermission};
pub use response::{
    AutocompleteChoice, PermissionScope, PrincipalKind, Rejection, RejectionCategory,
    RejectionCause,
};
pub use schema::{CommandOption, CommandSchema, OptionType};
