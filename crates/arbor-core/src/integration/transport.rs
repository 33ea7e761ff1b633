//! Outbound collaborators: schema upsert, interaction replies and the
//! inbound event source.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ApiResult;
use crate::foundation::{
    AutocompleteChoice, CommandSchema, GatewayEvent, Interaction, Rejection, Snowflake,
};

/// Where command schemas are registered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandScope {
    /// Registered once for every guild and DM.
    #[default]
    Global,
    /// Registered separately in each listed guild.
    Guilds { ids: Vec<Snowflake> },
}

/// Pushes merged command schemas to the platform.
#[async_trait]
pub trait SchemaTransport: Send + Sync {
    async fn upsert(&self, scope: &CommandScope, schemas: &[CommandSchema]) -> ApiResult<()>;
}

/// Answers interactions on behalf of the engine.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Sends a private rejection reply.
    async fn reject(&self, interaction: &Interaction, rejection: &Rejection) -> ApiResult<()>;

    /// Answers an autocomplete request.
    async fn autocomplete(
        &self,
        interaction: &Interaction,
        choices: &[AutocompleteChoice],
    ) -> ApiResult<()>;
}

pub type BoxedSchemaTransport = Arc<dyn SchemaTransport>;
pub type BoxedResponder = Arc<dyn Responder>;

/// A source of gateway events, one per occurrence.
///
/// Returns `None` once the source is exhausted.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Option<GatewayEvent>;
}

#[async_trait]
impl EventSource for mpsc::Receiver<GatewayEvent> {
    async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.recv().await
    }
}

#[async_trait]
impl EventSource for mpsc::UnboundedReceiver<GatewayEvent> {
    async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.recv().await
    }
}

#[async_trait]
impl EventSource for BoxStream<'static, GatewayEvent> {
    async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.next().await
    }
}
