//! Handler bundles and the options that guard them.
//!
//! A [`LinkedHandler`] groups the callbacks for one routing key:
//!
//! - `callback` runs for chat-input commands
//! - `component` runs for buttons and selects (and modals without a `modal`)
//! - `modal` runs for modal submissions
//! - `autocomplete` produces suggestions for a focused option
//!
//! Callbacks are plain async closures. They are type-erased on registration
//! and shared behind `Arc`s, so one bundle can serve many keys.
//!
//! ```rust,ignore
//! let handler = LinkedHandler::command(|ctx: CommandContext| async move {
//!     let id = ctx.state_store().make("confirm", ctx.args.clone(), MakeOptions::owned_by(ctx.user_id()));
//!     // send a button carrying `component_custom_id("confirm", &id)` ...
//!     Ok(())
//! })
//! .component(|ctx: ComponentContext| async move {
//!     let args = ctx.state::<serde_json::Value>();
//!     Ok(())
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower::BoxError;

use arbor_core::{
    AutocompleteChoice, Channel, ChannelType, CommandDataOption, Guild, Interaction, Member,
    Permission, Snowflake,
};

use crate::error::HandlerResult;
use crate::store::{StatePacket, StateStore};

/// A type alias for a boxed, pinned future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ============================================================================
// HandlerOptions
// ============================================================================

/// Permission sets enforced when a handler requires guild context.
///
/// Empty sets are skipped entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuildRequirement {
    pub user_guild_permissions: Vec<Permission>,
    pub user_channel_permissions: Vec<Permission>,
    pub bot_guild_permissions: Vec<Permission>,
    pub bot_channel_permissions: Vec<Permission>,
}

impl GuildRequirement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_guild(mut self, permissions: &[Permission]) -> Self {
        self.user_guild_permissions = permissions.to_vec();
        self
    }

    pub fn user_channel(mut self, permissions: &[Permission]) -> Self {
        self.user_channel_permissions = permissions.to_vec();
        self
    }

    pub fn bot_guild(mut self, permissions: &[Permission]) -> Self {
        self.bot_guild_permissions = permissions.to_vec();
        self
    }

    pub fn bot_channel(mut self, permissions: &[Permission]) -> Self {
        self.bot_channel_permissions = permissions.to_vec();
        self
    }
}

/// Component routing options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentOptions {
    /// Custom-id prefixes that route to this handler.
    pub accepted_base_custom_ids: Vec<String>,
    /// Reject with "expired" when no state entry resolves.
    pub require_state_packet: bool,
    /// Refuse state entries that were made without an owner.
    pub restrict_to_author: bool,
}

impl Default for ComponentOptions {
    fn default() -> Self {
        Self {
            accepted_base_custom_ids: Vec::new(),
            require_state_packet: true,
            restrict_to_author: false,
        }
    }
}

impl ComponentOptions {
    /// Accepts the given prefixes with the default flags.
    pub fn accepting<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted_base_custom_ids: prefixes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn require_state_packet(mut self, required: bool) -> Self {
        self.require_state_packet = required;
        self
    }

    pub fn restrict_to_author(mut self, restrict: bool) -> Self {
        self.restrict_to_author = restrict;
        self
    }
}

/// Declarative guards for one routing key.
///
/// An empty `channel_types` set is a configuration error: every interaction
/// routed here is rejected as misconfigured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerOptions {
    /// `Some` when guild context is required.
    pub guild: Option<GuildRequirement>,
    pub developer_required: bool,
    pub channel_types: Vec<ChannelType>,
    pub components: Option<ComponentOptions>,
}

impl HandlerOptions {
    /// Allows the given channel types and nothing else.
    pub fn in_channels(channel_types: &[ChannelType]) -> Self {
        Self {
            channel_types: channel_types.to_vec(),
            ..Self::default()
        }
    }

    /// Requires guild context with the given permission sets.
    pub fn guild(mut self, requirement: GuildRequirement) -> Self {
        self.guild = Some(requirement);
        self
    }

    pub fn developer_only(mut self) -> Self {
        self.developer_required = true;
        self
    }

    pub fn components(mut self, components: ComponentOptions) -> Self {
        self.components = Some(components);
        self
    }

    pub fn requires_guild(&self) -> bool {
        self.guild.is_some()
    }
}

// ============================================================================
// Contexts
// ============================================================================

/// Records resolved from the cache for a guild-scoped handler.
#[derive(Debug, Clone)]
pub struct GuildContext {
    pub guild: Arc<Guild>,
    pub member: Arc<Member>,
    pub channel: Arc<Channel>,
    pub bot_member: Arc<Member>,
}

/// Passed to `callback`.
#[derive(Clone)]
pub struct CommandContext {
    pub interaction: Arc<Interaction>,
    /// Dot-joined routing key that matched.
    pub path: String,
    pub guild: Option<GuildContext>,
    /// Options keyed by name, nested under subcommand and group names.
    pub args: Value,
    pub(crate) store: Arc<StateStore>,
}

impl CommandContext {
    pub fn user_id(&self) -> Snowflake {
        self.interaction.user_id
    }

    /// The store used to mint correlation ids for follow-up components.
    pub fn state_store(&self) -> &StateStore {
        &self.store
    }
}

/// Passed to `component` and `modal`.
#[derive(Clone)]
pub struct ComponentContext {
    pub interaction: Arc<Interaction>,
    /// Routing key the custom id resolved to.
    pub base_custom_id: String,
    pub state_packet: Option<StatePacket>,
    /// Text input values keyed by custom id, for modal submissions.
    pub parsed_modal: Option<HashMap<String, String>>,
    pub guild: Option<GuildContext>,
    pub(crate) store: Arc<StateStore>,
}

impl ComponentContext {
    pub fn user_id(&self) -> Snowflake {
        self.interaction.user_id
    }

    /// The stored payload, if present and of type `T`.
    pub fn state<T: std::any::Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.state_packet.as_ref().and_then(StatePacket::downcast)
    }

    pub fn state_store(&self) -> &StateStore {
        &self.store
    }
}

/// Passed to `autocomplete`.
#[derive(Debug, Clone)]
pub struct AutocompleteContext {
    pub interaction: Arc<Interaction>,
    pub path: String,
    /// The option the user is typing into.
    pub focused: CommandDataOption,
}

impl AutocompleteContext {
    /// The focused option's current input as text.
    pub fn input(&self) -> String {
        match &self.focused.value {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// Suggestions produced by an `autocomplete` callback, before ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutocompleteResponse {
    pub results: Vec<AutocompleteChoice>,
    /// Upper bound on choices shown, capped at the platform limit.
    pub per_page: Option<usize>,
    /// Pass results through unfiltered when the input is empty.
    pub allow_empty_search: bool,
}

impl AutocompleteResponse {
    pub fn new(results: Vec<AutocompleteChoice>) -> Self {
        Self {
            results,
            ..Self::default()
        }
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn allow_empty_search(mut self, allow: bool) -> Self {
        self.allow_empty_search = allow;
        self
    }
}

// ============================================================================
// LinkedHandler
// ============================================================================

pub type CommandFn = Arc<dyn Fn(CommandContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
pub type ComponentFn =
    Arc<dyn Fn(ComponentContext) -> BoxFuture<'static, HandlerResult> + Send + Sync>;
pub type AutocompleteFn = Arc<
    dyn Fn(AutocompleteContext) -> BoxFuture<'static, Result<Option<AutocompleteResponse>, BoxError>>
        + Send
        + Sync,
>;

fn erase<C, F, Fut, R>(f: F) -> Arc<dyn Fn(C) -> BoxFuture<'static, R> + Send + Sync>
where
    C: 'static,
    F: Fn(C) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

/// The callback bundle for one routing key. Immutable once linked.
#[derive(Clone, Default)]
pub struct LinkedHandler {
    pub(crate) callback: Option<CommandFn>,
    pub(crate) component: Option<ComponentFn>,
    pub(crate) modal: Option<ComponentFn>,
    pub(crate) autocomplete: Option<AutocompleteFn>,
}

impl LinkedHandler {
    /// A bundle whose command `callback` is `f`.
    pub fn command<F, Fut>(f: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self {
            callback: Some(erase(f)),
            ..Self::default()
        }
    }

    /// A component-only bundle.
    pub fn component_only<F, Fut>(f: F) -> Self
    where
        F: Fn(ComponentContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::default().component(f)
    }

    pub fn component<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ComponentContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.component = Some(erase(f));
        self
    }

    pub fn modal<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ComponentContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.modal = Some(erase(f));
        self
    }

    pub fn autocomplete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(AutocompleteContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<AutocompleteResponse>, BoxError>> + Send + 'static,
    {
        self.autocomplete = Some(erase(f));
        self
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub fn has_component(&self) -> bool {
        self.component.is_some()
    }

    pub fn has_modal(&self) -> bool {
        self.modal.is_some()
    }

    pub fn has_autocomplete(&self) -> bool {
        self.autocomplete.is_some()
    }
}

impl std::fmt::Debug for LinkedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkedHandler")
            .field("callback", &self.has_callback())
            .field("component", &self.has_component())
            .field("modal", &self.has_modal())
            .field("autocomplete", &self.has_autocomplete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_deserialize_permission_names() {
        let options: HandlerOptions = serde_json::from_value(serde_json::json!({
            "guild": { "user_guild_permissions": ["MANAGE_GUILD"] },
            "channel_types": [0, 5],
            "components": { "accepted_base_custom_ids": ["confirm"] }
        }))
        .unwrap();

        assert!(options.requires_guild());
        assert_eq!(
            options.guild.unwrap().user_guild_permissions,
            vec![Permission::ManageGuild]
        );
        assert_eq!(
            options.channel_types,
            vec![ChannelType::GuildText, ChannelType::GuildAnnouncement]
        );
        let components = options.components.unwrap();
        assert!(components.require_state_packet);
        assert!(!components.restrict_to_author);
    }

    #[test]
    fn test_builder_sets_capabilities() {
        let handler = LinkedHandler::command(|_ctx| async { Ok(()) })
            .modal(|_ctx| async { Ok(()) });

        assert!(handler.has_callback());
        assert!(handler.has_modal());
        assert!(!handler.has_component());
        assert!(!handler.has_autocomplete());
    }
}
