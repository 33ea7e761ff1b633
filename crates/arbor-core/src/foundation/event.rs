//! Gateway events as seen by the dispatch bus.
//!
//! - [`Event`] - anything the bus can route by name
//! - [`GatewayEvent`] - the events the engine itself consumes
//!
//! The wire format of the gateway is the event source's concern; by the time
//! an event reaches the bus it is already one of these values.

use serde_json::Value;

use super::id::Snowflake;
use super::interaction::Interaction;

/// Name under which interactions are dispatched.
pub const INTERACTION_CREATE: &str = "INTERACTION_CREATE";
/// Name under which the readiness signal is dispatched.
pub const READY: &str = "READY";

/// Base trait for events carried by the dispatch bus.
pub trait Event: Send + Sync + 'static {
    /// Name used to select subscribers.
    fn event_name(&self) -> &str;
}

/// Payload of the readiness signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Ready {
    /// The bot's own user id. Used to look up the bot member for permission checks.
    pub bot_id: Snowflake,
    /// Guilds the bot is present in at startup.
    pub guild_ids: Vec<Snowflake>,
}

/// An event delivered by the gateway.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Ready(Ready),
    InteractionCreate(Interaction),
    /// Any event the engine does not interpret. Still dispatched by name.
    Other { name: String, payload: Value },
}

impl GatewayEvent {
    /// The interaction carried by this event, if any.
    pub fn as_interaction(&self) -> Option<&Interaction> {
        match self {
            Self::InteractionCreate(interaction) => Some(interaction),
            _ => None,
        }
    }
}

impl Event for GatewayEvent {
    fn event_name(&self) -> &str {
        match self {
            Self::Ready(_) => READY,
            Self::InteractionCreate(_) => INTERACTION_CREATE,
            Self::Other { name, .. } => name,
        }
    }
}

impl From<Interaction> for GatewayEvent {
    fn from(interaction: Interaction) -> Self {
        Self::InteractionCreate(interaction)
    }
}
