//! The command and component registry.
//!
//! A [`Router`] is filled during startup with [`Router::link`] and then frozen
//! behind an `Arc`. Lookups are plain map reads keyed by the routing key.
//!
//! # Keys
//!
//! - a command schema contributes its root name and every subcommand group
//!   and subcommand below it (`"mod"`, `"mod.config"`, `"mod.config.set"`)
//! - every accepted custom-id prefix in
//!   [`ComponentOptions`](crate::handler::ComponentOptions) is a key too
//!
//! Leaf keys belong to one definition. Root and group keys are shared: the
//! first definition to reach them owns them, so several partial definitions
//! can each contribute a subcommand group under the same root.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut router = Router::new();
//! router.link(
//!     LinkDefinition::command(
//!         CommandSchema::new("mod", "Moderation").option(CommandOption::subcommand("ban", "Ban")),
//!         LinkedHandler::command(ban),
//!     )
//!     .options(HandlerOptions::in_channels(&[ChannelType::GuildText])),
//! )?;
//! let router = Arc::new(router);
//! ```

mod merge;
mod paths;

pub use merge::merge_values;
pub use paths::{
    CUSTOM_ID_SEPARATOR, RouteKey, component_custom_id, join_path, route_keys, split_custom_id,
};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use arbor_core::CommandSchema;

use crate::error::{RouterError, RouterResult};
use crate::handler::{HandlerOptions, LinkedHandler};

/// One registration: an optional command schema, its options and its
/// callbacks.
#[derive(Debug, Clone)]
pub struct LinkDefinition {
    pub schema: Option<CommandSchema>,
    pub options: HandlerOptions,
    pub handler: LinkedHandler,
}

impl LinkDefinition {
    /// A command definition. Component prefixes may be added via
    /// [`options`](Self::options).
    pub fn command(schema: CommandSchema, handler: LinkedHandler) -> Self {
        Self {
            schema: Some(schema),
            options: HandlerOptions::default(),
            handler,
        }
    }

    /// A component-only definition, routed by the prefixes in `options`.
    pub fn component(handler: LinkedHandler) -> Self {
        Self {
            schema: None,
            options: HandlerOptions::default(),
            handler,
        }
    }

    pub fn options(mut self, options: HandlerOptions) -> Self {
        self.options = options;
        self
    }
}

/// What a routing key resolves to.
#[derive(Debug, Clone)]
pub struct Route {
    pub options: Arc<HandlerOptions>,
    pub handler: Arc<LinkedHandler>,
}

#[derive(Debug, Clone)]
struct MergedSchema {
    value: Value,
    schema: CommandSchema,
}

/// Maps routing keys to linked definitions and accumulates command schemas.
#[derive(Debug, Default)]
pub struct Router {
    routes: HashMap<String, Route>,
    schemas: BTreeMap<String, MergedSchema>,
}

impl Router {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `definition` under every key it contributes.
    ///
    /// Either every key is registered or, on error, none is.
    pub fn link(&mut self, definition: LinkDefinition) -> RouterResult<()> {
        let LinkDefinition {
            schema,
            options,
            handler,
        } = definition;

        let mut keys = schema.as_ref().map(route_keys).unwrap_or_default();
        if let Some(components) = &options.components {
            keys.extend(
                components
                    .accepted_base_custom_ids
                    .iter()
                    .map(|prefix| RouteKey {
                        path: prefix.clone(),
                        leaf: true,
                    }),
            );
        }
        if keys.is_empty() {
            return Err(RouterError::EmptyDefinition);
        }
        if let Some(schema) = &schema
            && !handler.has_callback()
        {
            return Err(RouterError::MissingCallback {
                path: schema.name.clone(),
            });
        }

        for (index, key) in keys.iter().enumerate() {
            let repeated = keys[..index].iter().any(|other| other.path == key.path);
            if key.leaf && (repeated || self.routes.contains_key(&key.path)) {
                return Err(RouterError::DuplicateRoute {
                    path: key.path.clone(),
                });
            }
        }

        let merged = match &schema {
            Some(schema) => Some(self.merged_schema(schema)?),
            None => None,
        };

        let route = Route {
            options: Arc::new(options),
            handler: Arc::new(handler),
        };
        for key in keys {
            if self.routes.contains_key(&key.path) {
                trace!(path = %key.path, "Shared routing key already linked");
                continue;
            }
            trace!(path = %key.path, leaf = key.leaf, "Routing key linked");
            self.routes.insert(key.path, route.clone());
        }
        if let Some(merged) = merged {
            debug!(command = %merged.schema.name, "Command schema merged");
            self.schemas.insert(merged.schema.name.clone(), merged);
        }

        Ok(())
    }

    /// Merges `schema` with what is already registered under its name,
    /// without storing the result.
    fn merged_schema(&self, schema: &CommandSchema) -> RouterResult<MergedSchema> {
        let invalid = |source| RouterError::InvalidSchema {
            name: schema.name.clone(),
            source,
        };

        let incoming = serde_json::to_value(schema).map_err(invalid)?;
        let value = match self.schemas.get(&schema.name) {
            Some(existing) => {
                let mut value = existing.value.clone();
                merge_values(&mut value, incoming);
                value
            }
            None => incoming,
        };
        let schema = serde_json::from_value(value.clone()).map_err(invalid)?;
        Ok(MergedSchema { value, schema })
    }

    /// The route registered under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - A routing key: `name`, `name sub`, `name group sub` or a
    ///   component prefix.
    ///
    /// # Returns
    ///
    /// The handler and options for the key, or `None` if nothing was linked
    /// under it.
    pub fn route(&self, path: &str) -> Option<&Route> {
        self.routes.get(path)
    }

    /// The callbacks linked under `path`, shared with the router.
    pub fn lookup(&self, path: &str) -> Option<Arc<LinkedHandler>> {
        self.routes.get(path).map(|route| Arc::clone(&route.handler))
    }

    /// The guard options linked under `path`, shared with the router.
    pub fn options(&self, path: &str) -> Option<Arc<HandlerOptions>> {
        self.routes.get(path).map(|route| Arc::clone(&route.options))
    }

    /// Whether anything is linked under `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Every registered key, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// The merged schemas, ordered by command name.
    pub fn schemas(&self) -> Vec<CommandSchema> {
        self.schemas
            .values()
            .map(|merged| merged.schema.clone())
            .collect()
    }

    /// The merged schema for `name` as raw JSON.
    pub fn schema_value(&self, name: &str) -> Option<&Value> {
        self.schemas.get(name).map(|merged| &merged.value)
    }

    /// Number of routing keys.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
