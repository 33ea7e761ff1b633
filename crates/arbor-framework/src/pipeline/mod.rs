//! The interaction pipeline.
//!
//! [`Pipeline::process`] takes one interaction from the gateway and either
//! invokes the matching callback or answers with a [`Rejection`]. Guards run
//! in a fixed order and the first failure short-circuits:
//!
//! 1. interaction kind (disabled kinds and pings are discarded)
//! 2. routing key (command path or component custom id)
//! 3. linked options and the callback this kind needs
//! 4. channel type → guild required → developer only
//! 5. guild, member, channel and bot member from the entity cache
//! 6. permissions: user-guild, user-channel, bot-guild, bot-channel
//! 7. state packet (components and modals)
//!
//! Configuration and cache failures are reported to the [`ErrorSink`] once.
//! Authorization and expired-state rejections are only logged at debug.
//! Autocomplete requests skip the guards and never produce a rejection card.
//!
//! Callback errors are returned to the caller. Inside the runtime that caller
//! is the [`EventBus`](crate::bus::EventBus), which logs them with a
//! correlation id.
//!
//! [`ErrorSink`]: arbor_core::ErrorSink

mod autocomplete;
mod extract;
mod reject;

pub use autocomplete::{
    MAX_CHOICES, MAX_MATCHES, NO_RESULTS, PLACEHOLDER_VALUE, TOO_MANY_RESULTS, rank_choices,
};
pub use extract::{command_path, focused_option, parse_args, parse_modal};
pub use reject::correlation_id;

use std::collections::HashSet;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tower::{BoxError, Service};
use tracing::{Instrument, Level, debug, error, span, trace, warn};
use uuid::Uuid;

use arbor_core::{
    ApiError, AutocompleteChoice, BoxedEntityCache, BoxedErrorSink, BoxedResponder, GatewayEvent,
    Interaction, InteractionKind, PermissionScope, PrincipalKind, Rejection, RejectionCategory,
    Snowflake, TracingErrorSink,
};

use crate::error::{EventSkipped, FrameworkError};
use crate::handler::{
    AutocompleteContext, BoxFuture, CommandContext, ComponentContext, GuildContext,
    GuildRequirement, HandlerOptions,
};
use crate::permissions::PermissionResolver;
use crate::router::{Route, Router, split_custom_id};
use crate::store::StateStore;

// ============================================================================
// Configuration
// ============================================================================

/// Which interaction kinds the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionToggles {
    pub commands: bool,
    pub components: bool,
    pub modals: bool,
    pub autocomplete: bool,
}

impl Default for InteractionToggles {
    fn default() -> Self {
        Self {
            commands: true,
            components: true,
            modals: true,
            autocomplete: true,
        }
    }
}

impl InteractionToggles {
    pub fn accepts(&self, kind: InteractionKind) -> bool {
        match kind {
            InteractionKind::Ping => false,
            InteractionKind::ApplicationCommand => self.commands,
            InteractionKind::MessageComponent => self.components,
            InteractionKind::ModalSubmit => self.modals,
            InteractionKind::ApplicationCommandAutocomplete => self.autocomplete,
        }
    }
}

/// Static pipeline settings.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// The bot's own user id. Also learned from the `READY` event.
    pub bot_id: Option<Snowflake>,
    /// Users allowed through developer-only handlers.
    pub developers: HashSet<Snowflake>,
    pub interactions: InteractionToggles,
}

/// How an interaction left the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Not ours to handle; nothing was sent.
    Discarded,
    Rejected(Rejection),
    /// A command, component or modal callback completed.
    Handled,
    /// These choices were sent.
    Autocompleted(Vec<AutocompleteChoice>),
}

// ============================================================================
// Guard failures
// ============================================================================

struct GuardError {
    rejection: Rejection,
    /// Reported to the error sink when set.
    incident: Option<FrameworkError>,
}

impl GuardError {
    fn incident(rejection: Rejection, incident: FrameworkError) -> Self {
        Self {
            rejection,
            incident: Some(incident),
        }
    }
}

impl From<Rejection> for GuardError {
    fn from(rejection: Rejection) -> Self {
        Self {
            rejection,
            incident: None,
        }
    }
}

type GuardResult<T> = Result<T, GuardError>;

fn cached(id: Option<Snowflake>) -> String {
    id.map_or_else(|| "none".to_string(), |id| id.to_string())
}

// ============================================================================
// Pipeline
// ============================================================================

/// Routes interactions through the guard chain to linked callbacks.
///
/// Cheap to clone; every clone shares the same router, store and
/// collaborators.
#[derive(Clone)]
pub struct Pipeline {
    router: Arc<Router>,
    cache: BoxedEntityCache,
    responder: BoxedResponder,
    sink: BoxedErrorSink,
    state: Arc<StateStore>,
    resolver: PermissionResolver,
    bot_id: Arc<RwLock<Option<Snowflake>>>,
    developers: Arc<HashSet<Snowflake>>,
    interactions: InteractionToggles,
}

impl Pipeline {
    /// A pipeline with a tracing error sink, a default state store and the
    /// default configuration.
    pub fn new(router: Arc<Router>, cache: BoxedEntityCache, responder: BoxedResponder) -> Self {
        Self {
            router,
            cache,
            responder,
            sink: Arc::new(TracingErrorSink),
            state: Arc::new(StateStore::default()),
            resolver: PermissionResolver::new(),
            bot_id: Arc::new(RwLock::new(None)),
            developers: Arc::new(HashSet::new()),
            interactions: InteractionToggles::default(),
        }
    }

    pub fn with_sink(mut self, sink: BoxedErrorSink) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_state(mut self, state: Arc<StateStore>) -> Self {
        self.state = state;
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.bot_id = Arc::new(RwLock::new(config.bot_id));
        self.developers = Arc::new(config.developers);
        self.interactions = config.interactions;
        self
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }

    pub fn bot_id(&self) -> Option<Snowflake> {
        *self.bot_id.read()
    }

    /// Shared by every clone.
    pub fn set_bot_id(&self, bot_id: Snowflake) {
        *self.bot_id.write() = Some(bot_id);
    }

    /// Runs one interaction to completion.
    ///
    /// `Err` is only returned when the invoked callback fails.
    pub async fn process(&self, interaction: Arc<Interaction>) -> Result<PipelineOutcome, BoxError> {
        let span = span!(
            Level::DEBUG,
            "interaction",
            interaction_id = %interaction.id,
            kind = interaction.kind.as_str()
        );

        async move {
            if !self.interactions.accepts(interaction.kind) {
                trace!("Interaction kind not accepted");
                return Ok(PipelineOutcome::Discarded);
            }

            match interaction.kind {
                InteractionKind::ApplicationCommand => self.run_command(interaction).await,
                InteractionKind::MessageComponent | InteractionKind::ModalSubmit => {
                    self.run_component(interaction).await
                }
                InteractionKind::ApplicationCommandAutocomplete => {
                    self.run_autocomplete(interaction).await
                }
                InteractionKind::Ping => Ok(PipelineOutcome::Discarded),
            }
        }
        .instrument(span)
        .await
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn run_command(&self, interaction: Arc<Interaction>) -> Result<PipelineOutcome, BoxError> {
        let Some(path) = command_path(&interaction) else {
            trace!("Command without a name");
            return Ok(PipelineOutcome::Discarded);
        };

        let route = match self.route(&path) {
            Ok(route) => route,
            Err(guard) => return self.reject(&interaction, guard).await,
        };
        let Some(callback) = route.handler.callback.clone() else {
            return self
                .reject(&interaction, Self::capability_missing(&path, "callback"))
                .await;
        };
        let guild = match self.authorize(&interaction, &path, &route.options).await {
            Ok(guild) => guild,
            Err(guard) => return self.reject(&interaction, guard).await,
        };

        debug!(path = %path, "Dispatching command");
        let ctx = CommandContext {
            args: parse_args(&interaction.data.options),
            interaction,
            path,
            guild,
            store: Arc::clone(&self.state),
        };
        callback(ctx).await?;
        Ok(PipelineOutcome::Handled)
    }

    // ------------------------------------------------------------------------
    // Components and modals
    // ------------------------------------------------------------------------

    async fn run_component(&self, interaction: Arc<Interaction>) -> Result<PipelineOutcome, BoxError> {
        let Some(custom_id) = interaction.custom_id() else {
            warn!("Component interaction without a custom id");
            self.sink.report(
                &FrameworkError::MissingCustomId {
                    interaction_id: interaction.id.to_string(),
                },
                None,
            );
            return Ok(PipelineOutcome::Discarded);
        };

        let (key, storage_id) = match self.component_key(custom_id) {
            Ok(found) => found,
            Err(guard) => return self.reject(&interaction, guard).await,
        };
        let route = match self.route(&key) {
            Ok(route) => route,
            Err(guard) => return self.reject(&interaction, guard).await,
        };

        let modal = interaction.kind == InteractionKind::ModalSubmit;
        let callback = if modal {
            route
                .handler
                .modal
                .clone()
                .or_else(|| route.handler.component.clone())
        } else {
            route.handler.component.clone()
        };
        let Some(callback) = callback else {
            let capability = if modal { "modal" } else { "component" };
            return self
                .reject(&interaction, Self::capability_missing(&key, capability))
                .await;
        };

        let guild = match self.authorize(&interaction, &key, &route.options).await {
            Ok(guild) => guild,
            Err(guard) => return self.reject(&interaction, guard).await,
        };

        let components = route.options.components.clone().unwrap_or_default();
        // Owned entries resolve only for their owner. `restrict_to_author`
        // additionally turns away entries made without one.
        let state_packet = storage_id.as_deref().and_then(|id| {
            let entry = self.state.entry(id)?;
            if components.restrict_to_author && entry.owner.is_none() {
                debug!(storage_id = id, "Unowned state entry on an author-only route");
                return None;
            }
            self.state.retrieve(id, interaction.user_id)
        });
        if components.require_state_packet && state_packet.is_none() {
            return self
                .reject(&interaction, reject::expired_state().into())
                .await;
        }

        debug!(custom_id = %key, stateful = state_packet.is_some(), "Dispatching component");
        let ctx = ComponentContext {
            parsed_modal: modal.then(|| parse_modal(&interaction.data.components)),
            interaction,
            base_custom_id: key,
            state_packet,
            guild,
            store: Arc::clone(&self.state),
        };
        callback(ctx).await?;
        Ok(PipelineOutcome::Handled)
    }

    /// Maps a custom id to its routing key and storage id.
    ///
    /// `prefix` and `prefix:<storage id>` route by prefix. A bare storage id
    /// routes by the group its state entry was made under.
    fn component_key(&self, custom_id: &str) -> GuardResult<(String, Option<String>)> {
        let (base, storage_id) = split_custom_id(custom_id);
        if self.router.contains(base) {
            return Ok((base.to_string(), storage_id.map(str::to_string)));
        }
        if let Some(entry) = self.state.entry(custom_id) {
            return Ok((entry.group_id, Some(custom_id.to_string())));
        }
        if Uuid::try_parse(custom_id).is_ok() {
            debug!(custom_id, "State entry for bare custom id is gone");
            return Err(reject::expired_state().into());
        }
        Err(GuardError::incident(
            reject::options_missing(base),
            FrameworkError::MissingRoute {
                path: base.to_string(),
            },
        ))
    }

    // ------------------------------------------------------------------------
    // Autocomplete
    // ------------------------------------------------------------------------

    async fn run_autocomplete(
        &self,
        interaction: Arc<Interaction>,
    ) -> Result<PipelineOutcome, BoxError> {
        let Some(path) = command_path(&interaction) else {
            return Ok(PipelineOutcome::Discarded);
        };

        let generate = match self.router.route(&path) {
            Some(route) => route.handler.autocomplete.clone().ok_or_else(|| {
                FrameworkError::MissingCapability {
                    path: path.clone(),
                    capability: "autocomplete",
                }
            }),
            None => Err(FrameworkError::MissingRoute { path: path.clone() }),
        };
        let generate = match generate {
            Ok(generate) => generate,
            Err(incident) => {
                warn!(path = %path, error = %incident, "Autocomplete not routable");
                self.sink.report(&incident, None);
                return self.send_choices(&interaction, Vec::new()).await;
            }
        };

        let Some(focused) = focused_option(&interaction.data.options).cloned() else {
            trace!(path = %path, "Autocomplete without a focused option");
            return Ok(PipelineOutcome::Discarded);
        };

        let ctx = AutocompleteContext {
            interaction: Arc::clone(&interaction),
            path: path.clone(),
            focused,
        };
        let input = ctx.input();
        match generate(ctx).await {
            Ok(Some(response)) => {
                let choices = rank_choices(&input, response);
                self.send_choices(&interaction, choices).await
            }
            Ok(None) => Ok(PipelineOutcome::Discarded),
            Err(err) => {
                error!(path = %path, error = %err, "Autocomplete callback failed");
                self.send_choices(&interaction, Vec::new()).await
            }
        }
    }

    async fn send_choices(
        &self,
        interaction: &Interaction,
        choices: Vec<AutocompleteChoice>,
    ) -> Result<PipelineOutcome, BoxError> {
        if let Err(source) = self.responder.autocomplete(interaction, &choices).await {
            self.reply_failed(interaction, source);
        }
        Ok(PipelineOutcome::Autocompleted(choices))
    }

    // ------------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------------

    fn route(&self, path: &str) -> GuardResult<Route> {
        self.router.route(path).cloned().ok_or_else(|| {
            GuardError::incident(
                reject::options_missing(path),
                FrameworkError::MissingRoute {
                    path: path.to_string(),
                },
            )
        })
    }

    fn capability_missing(path: &str, capability: &'static str) -> GuardError {
        GuardError::incident(
            reject::handler_missing(path),
            FrameworkError::MissingCapability {
                path: path.to_string(),
                capability,
            },
        )
    }

    async fn authorize(
        &self,
        interaction: &Interaction,
        path: &str,
        options: &HandlerOptions,
    ) -> GuardResult<Option<GuildContext>> {
        if options.channel_types.is_empty() {
            return Err(GuardError::incident(
                reject::channel_types_unconfigured(),
                FrameworkError::ChannelTypesUnconfigured {
                    path: path.to_string(),
                },
            ));
        }
        if !interaction
            .channel_type
            .is_some_and(|kind| options.channel_types.contains(&kind))
        {
            return Err(reject::channel_type_mismatch(interaction.channel_type).into());
        }

        let required = match &options.guild {
            Some(requirement) => match interaction.guild_id {
                Some(guild_id) => Some((guild_id, requirement)),
                None => return Err(reject::guild_required().into()),
            },
            None => None,
        };

        if options.developer_required && !self.developers.contains(&interaction.user_id) {
            return Err(reject::developer_required().into());
        }

        let Some((guild_id, requirement)) = required else {
            return Ok(None);
        };
        let context = self.resolve_guild(interaction, guild_id).await?;
        self.check_permissions(&context, requirement)?;
        Ok(Some(context))
    }

    async fn resolve_guild(
        &self,
        interaction: &Interaction,
        guild_id: Snowflake,
    ) -> GuardResult<GuildContext> {
        let user_id = interaction.user_id;
        let unavailable = |detail: String, rejection: Rejection| {
            GuardError::incident(
                rejection,
                FrameworkError::ContextUnavailable {
                    interaction_id: interaction.id.to_string(),
                    detail,
                },
            )
        };

        let Some(channel_id) = interaction.channel_id else {
            return Err(unavailable(
                format!("GID:{guild_id}, UID:{user_id}, CID:none"),
                reject::guild_data_missing(),
            ));
        };

        let (guild, member, channel) = tokio::join!(
            self.cache.guild(guild_id),
            self.cache.member(user_id, guild_id),
            self.cache.channel(channel_id),
        );
        let (guild, member, channel) = match (guild, member, channel) {
            (Some(guild), Some(member), Some(channel)) => (guild, member, channel),
            (guild, member, channel) => {
                return Err(unavailable(
                    format!(
                        "GID:{guild_id}/CA{}, UID:{user_id}/CA{}, CID:{channel_id}/CA{}",
                        cached(guild.map(|guild| guild.id)),
                        cached(member.map(|member| member.user_id)),
                        cached(channel.map(|channel| channel.id)),
                    ),
                    reject::guild_data_missing(),
                ));
            }
        };

        let Some(bot_id) = self.bot_id() else {
            return Err(unavailable(
                format!("GID:{guild_id}, bot user id unknown"),
                reject::bot_member_missing(),
            ));
        };
        let bot_member = match self.cache.member(bot_id, guild_id).await {
            Some(member) => Some(member),
            None => {
                if let Err(err) = self.cache.fetch_member(guild_id, bot_id).await {
                    debug!(guild_id = %guild_id, error = %err, "Bot member fetch failed");
                }
                self.cache.member(bot_id, guild_id).await
            }
        };
        let Some(bot_member) = bot_member else {
            return Err(unavailable(
                format!(
                    "GID:{guild_id}/CA{}, UID:{bot_id}/CAnone, CID:{channel_id}/CA{}",
                    guild.id, channel.id
                ),
                reject::bot_member_missing(),
            ));
        };

        Ok(GuildContext {
            guild,
            member,
            channel,
            bot_member,
        })
    }

    fn check_permissions(
        &self,
        context: &GuildContext,
        requirement: &GuildRequirement,
    ) -> GuardResult<()> {
        let checks = [
            (
                PrincipalKind::User,
                PermissionScope::Guild,
                &requirement.user_guild_permissions,
                &context.member,
            ),
            (
                PrincipalKind::User,
                PermissionScope::Channel,
                &requirement.user_channel_permissions,
                &context.member,
            ),
            (
                PrincipalKind::Bot,
                PermissionScope::Guild,
                &requirement.bot_guild_permissions,
                &context.bot_member,
            ),
            (
                PrincipalKind::Bot,
                PermissionScope::Channel,
                &requirement.bot_channel_permissions,
                &context.bot_member,
            ),
        ];

        for (principal, scope, required, member) in checks {
            if required.is_empty() {
                continue;
            }
            let missing = match scope {
                PermissionScope::Guild => {
                    self.resolver
                        .missing_guild_permissions(&context.guild, member, required)
                }
                PermissionScope::Channel => self.resolver.missing_channel_permissions(
                    &context.guild,
                    context.channel.id,
                    member,
                    required,
                ),
            };
            if !missing.is_empty() {
                return Err(reject::missing_permissions(principal, scope, required, missing).into());
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------------

    async fn reject(
        &self,
        interaction: &Interaction,
        guard: GuardError,
    ) -> Result<PipelineOutcome, BoxError> {
        let GuardError { rejection, incident } = guard;
        let code = rejection.cause.code();

        match rejection.category() {
            RejectionCategory::Configuration | RejectionCategory::Upstream => error!(
                code,
                correlation_id = %rejection.correlation_id,
                user_id = %interaction.user_id,
                "Interaction rejected"
            ),
            RejectionCategory::Authorization | RejectionCategory::ExpiredState => debug!(
                code,
                correlation_id = %rejection.correlation_id,
                user_id = %interaction.user_id,
                "Interaction rejected"
            ),
        }
        if let Some(incident) = incident {
            let context = format!("Support ID: {}", rejection.correlation_id);
            self.sink.report(&incident, Some(&context));
        }

        if let Err(source) = self.responder.reject(interaction, &rejection).await {
            self.reply_failed(interaction, source);
        }
        Ok(PipelineOutcome::Rejected(rejection))
    }

    fn reply_failed(&self, interaction: &Interaction, source: ApiError) {
        let err = FrameworkError::ReplyFailed {
            interaction_id: interaction.id.to_string(),
            source,
        };
        warn!(error = %err, "Reply failed");
        self.sink.report(&err, None);
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("routes", &self.router.len())
            .field("bot_id", &self.bot_id())
            .field("developers", &self.developers.len())
            .field("interactions", &self.interactions)
            .finish_non_exhaustive()
    }
}

/// Subscribes the pipeline to `INTERACTION_CREATE` on the event bus.
/// Other gateway events are skipped.
impl Service<Arc<GatewayEvent>> for Pipeline {
    type Response = ();
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<(), BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: Arc<GatewayEvent>) -> Self::Future {
        let pipeline = self.clone();
        Box::pin(async move {
            let Some(interaction) = event.as_interaction() else {
                return Err(EventSkipped.into());
            };
            pipeline.process(Arc::new(interaction.clone())).await?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;

    use arbor_core::{
        ApiResult, Channel, ChannelType, CommandDataOption, CommandOption, CommandSchema, Guild,
        Member, MemoryCache, OptionType, Permission, Permissions, RejectionCause, Responder, Role,
    };

    use crate::handler::{AutocompleteResponse, ComponentOptions, LinkedHandler};
    use crate::router::{LinkDefinition, component_custom_id};
    use crate::store::MakeOptions;

    const GUILD: Snowflake = Snowflake(100);
    const CHANNEL: Snowflake = Snowflake(200);
    const USER: Snowflake = Snowflake(300);
    const BOT: Snowflake = Snowflake(400);
    const OWNER: Snowflake = Snowflake(500);
    const MOD_ROLE: Snowflake = Snowflake(600);

    #[derive(Default)]
    struct RecordingResponder {
        rejections: Mutex<Vec<Rejection>>,
        choices: Mutex<Vec<Vec<AutocompleteChoice>>>,
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn reject(&self, _interaction: &Interaction, rejection: &Rejection) -> ApiResult<()> {
            self.rejections.lock().push(rejection.clone());
            Ok(())
        }

        async fn autocomplete(
            &self,
            _interaction: &Interaction,
            choices: &[AutocompleteChoice],
        ) -> ApiResult<()> {
            self.choices.lock().push(choices.to_vec());
            Ok(())
        }
    }

    struct Harness {
        pipeline: Pipeline,
        cache: Arc<MemoryCache>,
        responder: Arc<RecordingResponder>,
        reports: Arc<Mutex<Vec<String>>>,
    }

    impl Harness {
        fn new(definitions: Vec<LinkDefinition>) -> Self {
            let mut router = Router::new();
            for definition in definitions {
                router.link(definition).unwrap();
            }

            let cache = Arc::new(MemoryCache::new());
            let responder = Arc::new(RecordingResponder::default());
            let reports = Arc::new(Mutex::new(Vec::new()));
            let sink_reports = Arc::clone(&reports);
            let sink = move |err: &(dyn std::error::Error + Send + Sync), _context: Option<&str>| {
                sink_reports.lock().push(err.to_string());
            };

            let pipeline = Pipeline::new(Arc::new(router), cache.clone(), responder.clone())
                .with_sink(Arc::new(sink))
                .with_config(PipelineConfig {
                    bot_id: Some(BOT),
                    developers: HashSet::from([OWNER]),
                    interactions: InteractionToggles::default(),
                });

            Self {
                pipeline,
                cache,
                responder,
                reports,
            }
        }

        fn seed_guild(&self, everyone: Permissions) {
            let channel = Channel {
                id: CHANNEL,
                guild_id: Some(GUILD),
                kind: ChannelType::GuildText,
                parent_id: None,
                overwrites: Vec::new(),
            };
            self.cache.insert_guild(
                Guild::new(GUILD, OWNER)
                    .with_role(Role {
                        id: GUILD,
                        position: 0,
                        permissions: everyone,
                    })
                    .with_role(Role {
                        id: MOD_ROLE,
                        position: 1,
                        permissions: Permissions::from_flags(&[Permission::BanMembers]),
                    })
                    .with_channel(channel),
            );
            self.cache.insert_member(Member {
                user_id: USER,
                guild_id: GUILD,
                roles: Vec::new(),
            });
        }

        fn rejection(&self) -> Rejection {
            self.responder.rejections.lock()[0].clone()
        }
    }

    fn counting(calls: &Arc<AtomicUsize>) -> LinkedHandler {
        let calls = Arc::clone(calls);
        LinkedHandler::command(move |_ctx| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn ping_check() -> Interaction {
        Interaction::command(
            Snowflake(1),
            USER,
            "ping",
            vec![CommandDataOption::nested(OptionType::SubCommand, "check", vec![])],
        )
        .in_channel(CHANNEL, ChannelType::GuildText)
    }

    fn ping_schema() -> CommandSchema {
        CommandSchema::new("ping", "Ping").option(CommandOption::subcommand("check", "Check"))
    }

    fn text_only() -> HandlerOptions {
        HandlerOptions::in_channels(&[ChannelType::GuildText])
    }

    #[tokio::test]
    async fn test_missing_route_is_a_configuration_rejection() {
        let harness = Harness::new(Vec::new());

        let outcome = harness.pipeline.process(Arc::new(ping_check())).await.unwrap();

        assert!(matches!(outcome, PipelineOutcome::Rejected(_)));
        let rejection = harness.rejection();
        assert_eq!(
            rejection.cause,
            RejectionCause::LinkedOptionsMissing {
                path: "ping.check".into()
            }
        );
        assert_eq!(rejection.category(), RejectionCategory::Configuration);
        assert_eq!(harness.reports.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_guild_required_without_guild_skips_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![
            LinkDefinition::command(ping_schema(), counting(&calls))
                .options(text_only().guild(
                    GuildRequirement::new().user_guild(&[Permission::ManageGuild]),
                )),
        ]);

        harness.pipeline.process(Arc::new(ping_check())).await.unwrap();

        assert_eq!(harness.rejection().cause, RejectionCause::GuildRequired);
        assert_eq!(harness.cache.lookup_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(harness.reports.lock().is_empty());
    }

    #[tokio::test]
    async fn test_command_runs_with_args() {
        let seen = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&seen);
        let handler = LinkedHandler::command(move |ctx: CommandContext| {
            let recorded = Arc::clone(&recorded);
            async move {
                *recorded.lock() = Some((ctx.path.clone(), ctx.args.clone()));
                Ok(())
            }
        });
        let harness = Harness::new(vec![
            LinkDefinition::command(
                CommandSchema::new("echo", "Echo")
                    .option(CommandOption::new(OptionType::String, "text", "Text")),
                handler,
            )
            .options(text_only()),
        ]);

        let interaction = Interaction::command(
            Snowflake(1),
            USER,
            "echo",
            vec![CommandDataOption::value(OptionType::String, "text", json!("hi"))],
        )
        .in_channel(CHANNEL, ChannelType::GuildText);
        let outcome = harness.pipeline.process(Arc::new(interaction)).await.unwrap();

        assert_eq!(outcome, PipelineOutcome::Handled);
        assert_eq!(
            seen.lock().clone(),
            Some(("echo".to_string(), json!({ "text": "hi" })))
        );
    }

    #[tokio::test]
    async fn test_channel_type_guards() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![
            LinkDefinition::command(ping_schema(), counting(&calls)),
        ]);
        harness.pipeline.process(Arc::new(ping_check())).await.unwrap();
        assert_eq!(harness.rejection().cause, RejectionCause::ChannelTypesUnconfigured);
        assert_eq!(harness.reports.lock().len(), 1);

        let harness = Harness::new(vec![
            LinkDefinition::command(ping_schema(), counting(&calls)).options(text_only()),
        ]);
        let dm = ping_check().in_channel(CHANNEL, ChannelType::Dm);
        harness.pipeline.process(Arc::new(dm)).await.unwrap();
        assert_eq!(
            harness.rejection().cause,
            RejectionCause::ChannelTypeMismatch {
                channel_type: Some(ChannelType::Dm)
            }
        );
        assert!(harness.reports.lock().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_developer_only() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![
            LinkDefinition::command(ping_schema(), counting(&calls))
                .options(text_only().developer_only()),
        ]);

        harness.pipeline.process(Arc::new(ping_check())).await.unwrap();
        assert_eq!(harness.rejection().cause, RejectionCause::DeveloperRequired);

        let mut by_owner = ping_check();
        by_owner.user_id = OWNER;
        let outcome = harness.pipeline.process(Arc::new(by_owner)).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Handled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_miss_reports_upstream_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![
            LinkDefinition::command(ping_schema(), counting(&calls))
                .options(text_only().guild(GuildRequirement::new())),
        ]);

        harness
            .pipeline
            .process(Arc::new(ping_check().in_guild(GUILD)))
            .await
            .unwrap();

        let rejection = harness.rejection();
        assert_eq!(rejection.cause, RejectionCause::GuildDataMissing);
        assert_eq!(rejection.category(), RejectionCategory::Upstream);
        let reports = harness.reports.lock();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].contains("GID:100/CAnone"));
    }

    #[tokio::test]
    async fn test_bot_member_is_fetched_once_on_miss() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![
            LinkDefinition::command(ping_schema(), counting(&calls))
                .options(text_only().guild(GuildRequirement::new())),
        ]);
        harness.seed_guild(Permissions::NONE);

        harness
            .pipeline
            .process(Arc::new(ping_check().in_guild(GUILD)))
            .await
            .unwrap();
        assert_eq!(harness.rejection().cause, RejectionCause::BotMemberMissing);

        harness.cache.stage_remote_member(Member {
            user_id: BOT,
            guild_id: GUILD,
            roles: Vec::new(),
        });
        let outcome = harness
            .pipeline
            .process(Arc::new(ping_check().in_guild(GUILD)))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::Handled);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permission_checks_run_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let requirement = GuildRequirement::new()
            .user_guild(&[Permission::BanMembers])
            .bot_channel(&[Permission::ViewChannel, Permission::SendMessages]);
        let harness = Harness::new(vec![
            LinkDefinition::command(ping_schema(), counting(&calls))
                .options(text_only().guild(requirement)),
        ]);
        harness.seed_guild(Permissions::from_flags(&[Permission::ViewChannel]));
        harness.cache.insert_member(Member {
            user_id: BOT,
            guild_id: GUILD,
            roles: Vec::new(),
        });
        let interaction = Arc::new(ping_check().in_guild(GUILD));

        harness.pipeline.process(Arc::clone(&interaction)).await.unwrap();
        assert_eq!(
            harness.rejection().cause,
            RejectionCause::MissingPermissions {
                principal: PrincipalKind::User,
                scope: PermissionScope::Guild,
                required: vec![Permission::BanMembers],
                missing: vec![Permission::BanMembers],
            }
        );

        harness.cache.insert_member(Member {
            user_id: USER,
            guild_id: GUILD,
            roles: vec![MOD_ROLE],
        });
        harness.pipeline.process(interaction).await.unwrap();
        let rejection = harness.responder.rejections.lock()[1].clone();
        assert_eq!(rejection.description, "Bot is missing: SEND_MESSAGES");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(harness.reports.lock().is_empty());
    }

    fn component(custom_id: &str) -> Interaction {
        let mut interaction = Interaction::new(Snowflake(2), InteractionKind::MessageComponent, USER)
            .in_channel(CHANNEL, ChannelType::GuildText);
        interaction.data.custom_id = Some(custom_id.to_string());
        interaction
    }

    fn confirm_handler(seen: &Arc<Mutex<Vec<Option<String>>>>) -> LinkedHandler {
        let seen = Arc::clone(seen);
        LinkedHandler::component_only(move |ctx: ComponentContext| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock()
                    .push(ctx.state::<String>().map(|value| value.as_str().to_string()));
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_component_state_resolution() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let harness = Harness::new(vec![
            LinkDefinition::component(confirm_handler(&seen)).options(
                text_only().components(
                    ComponentOptions::accepting(["confirm"]).restrict_to_author(true),
                ),
            ),
        ]);
        let store = harness.pipeline.state();
        let id = store.make("confirm", "payload".to_string(), MakeOptions::owned_by(USER));

        let prefixed = harness
            .pipeline
            .process(Arc::new(component(&component_custom_id("confirm", &id))))
            .await
            .unwrap();
        let bare = harness.pipeline.process(Arc::new(component(&id))).await.unwrap();
        assert_eq!(prefixed, PipelineOutcome::Handled);
        assert_eq!(bare, PipelineOutcome::Handled);
        assert_eq!(
            *seen.lock(),
            vec![Some("payload".to_string()), Some("payload".to_string())]
        );

        let mut stranger = component(&id);
        stranger.user_id = Snowflake(999);
        harness.pipeline.process(Arc::new(stranger)).await.unwrap();
        assert_eq!(harness.rejection().cause, RejectionCause::ExpiredState);

        store.delete(&id);
        harness.pipeline.process(Arc::new(component(&id))).await.unwrap();
        let rejections = harness.responder.rejections.lock();
        assert_eq!(rejections[1].cause, RejectionCause::ExpiredState);
        assert_eq!(rejections[1].category(), RejectionCategory::ExpiredState);
        assert!(harness.reports.lock().is_empty());
    }

    #[tokio::test]
    async fn test_owned_state_stays_with_its_owner() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let harness = Harness::new(vec![
            LinkDefinition::component(confirm_handler(&seen))
                .options(text_only().components(ComponentOptions::accepting(["confirm"]))),
        ]);
        let store = harness.pipeline.state();
        let id = store.make("confirm", "secret".to_string(), MakeOptions::owned_by(USER));
        let custom_id = component_custom_id("confirm", &id);

        let mut stranger = component(&custom_id);
        stranger.user_id = Snowflake(999);
        harness.pipeline.process(Arc::new(stranger)).await.unwrap();
        assert_eq!(harness.rejection().cause, RejectionCause::ExpiredState);
        assert!(seen.lock().is_empty());

        let outcome = harness.pipeline.process(Arc::new(component(&custom_id))).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Handled);
        assert_eq!(*seen.lock(), vec![Some("secret".to_string())]);
    }

    #[tokio::test]
    async fn test_unowned_state_on_author_only_route() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let harness = Harness::new(vec![
            LinkDefinition::component(confirm_handler(&seen)).options(text_only().components(
                ComponentOptions::accepting(["confirm"]).restrict_to_author(true),
            )),
        ]);
        let store = harness.pipeline.state();
        let id = store.make("confirm", "shared".to_string(), MakeOptions::default());

        harness
            .pipeline
            .process(Arc::new(component(&component_custom_id("confirm", &id))))
            .await
            .unwrap();
        assert_eq!(harness.rejection().cause, RejectionCause::ExpiredState);
        assert!(seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unowned_state_is_shared() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let harness = Harness::new(vec![
            LinkDefinition::component(confirm_handler(&seen))
                .options(text_only().components(ComponentOptions::accepting(["confirm"]))),
        ]);
        let store = harness.pipeline.state();
        let id = store.make("confirm", "shared".to_string(), MakeOptions::default());

        let mut stranger = component(&component_custom_id("confirm", &id));
        stranger.user_id = Snowflake(999);
        let outcome = harness.pipeline.process(Arc::new(stranger)).await.unwrap();

        assert_eq!(outcome, PipelineOutcome::Handled);
        assert_eq!(*seen.lock(), vec![Some("shared".to_string())]);
    }

    #[tokio::test]
    async fn test_static_component_without_state() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let harness = Harness::new(vec![
            LinkDefinition::component(confirm_handler(&seen)).options(text_only().components(
                ComponentOptions::accepting(["refresh"]).require_state_packet(false),
            )),
        ]);

        let outcome = harness.pipeline.process(Arc::new(component("refresh"))).await.unwrap();

        assert_eq!(outcome, PipelineOutcome::Handled);
        assert_eq!(*seen.lock(), vec![None]);
    }

    #[tokio::test]
    async fn test_component_routing_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = Harness::new(vec![
            LinkDefinition::command(ping_schema(), counting(&calls)).options(
                text_only().components(ComponentOptions::accepting(["ping-again"])),
            ),
        ]);

        harness
            .pipeline
            .process(Arc::new(component("ping-again")))
            .await
            .unwrap();
        assert_eq!(
            harness.rejection().cause,
            RejectionCause::LinkedHandlerMissing {
                path: "ping-again".into()
            }
        );

        harness.pipeline.process(Arc::new(component("unknown"))).await.unwrap();
        assert_eq!(
            harness.responder.rejections.lock()[1].cause,
            RejectionCause::LinkedOptionsMissing {
                path: "unknown".into()
            }
        );

        let mut no_id = component("x");
        no_id.data.custom_id = None;
        let outcome = harness.pipeline.process(Arc::new(no_id)).await.unwrap();
        assert_eq!(outcome, PipelineOutcome::Discarded);
        assert_eq!(harness.reports.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_modal_values_reach_the_modal_callback() {
        let values = Arc::new(Mutex::new(None));
        let recorded = Arc::clone(&values);
        let handler = LinkedHandler::default().modal(move |ctx: ComponentContext| {
            let recorded = Arc::clone(&recorded);
            async move {
                *recorded.lock() = ctx.parsed_modal.clone();
                Ok(())
            }
        });
        let harness = Harness::new(vec![
            LinkDefinition::component(handler).options(text_only().components(
                ComponentOptions::accepting(["feedback"]).require_state_packet(false),
            )),
        ]);

        let mut interaction = component("feedback");
        interaction.kind = InteractionKind::ModalSubmit;
        interaction.data.components = serde_json::from_value(json!([
            { "type": 1, "components": [{ "type": 4, "custom_id": "body", "value": "great" }] }
        ]))
        .unwrap();
        harness.pipeline.process(Arc::new(interaction)).await.unwrap();

        let values = values.lock().clone().unwrap();
        assert_eq!(values["body"], "great");
    }

    fn autocomplete_request(input: &str) -> Interaction {
        let mut interaction =
            Interaction::new(Snowflake(3), InteractionKind::ApplicationCommandAutocomplete, USER);
        interaction.data.name = Some("tag".into());
        interaction.data.options = vec![
            CommandDataOption::value(OptionType::String, "name", json!(input)).focused(),
        ];
        interaction
    }

    #[tokio::test]
    async fn test_autocomplete_ranks_choices() {
        let handler = LinkedHandler::command(|_ctx| async { Ok(()) }).autocomplete(
            |_ctx: AutocompleteContext| async {
                Ok(Some(AutocompleteResponse::new(vec![
                    AutocompleteChoice::new("rules", "1"),
                    AutocompleteChoice::new("rust", "2"),
                    AutocompleteChoice::new("faq", "3"),
                ])))
            },
        );
        let harness = Harness::new(vec![LinkDefinition::command(
            CommandSchema::new("tag", "Tags"),
            handler,
        )]);

        let outcome = harness
            .pipeline
            .process(Arc::new(autocomplete_request("ru")))
            .await
            .unwrap();

        let expected = vec![
            AutocompleteChoice::new("rules", "1"),
            AutocompleteChoice::new("rust", "2"),
        ];
        assert_eq!(outcome, PipelineOutcome::Autocompleted(expected.clone()));
        assert_eq!(harness.responder.choices.lock()[0], expected);
        assert!(harness.responder.rejections.lock().is_empty());
    }

    #[tokio::test]
    async fn test_autocomplete_failures_send_no_choices() {
        let harness = Harness::new(vec![LinkDefinition::command(
            CommandSchema::new("tag", "Tags"),
            LinkedHandler::command(|_ctx| async { Ok(()) }),
        )]);

        let outcome = harness
            .pipeline
            .process(Arc::new(autocomplete_request("x")))
            .await
            .unwrap();

        assert_eq!(outcome, PipelineOutcome::Autocompleted(Vec::new()));
        assert_eq!(harness.reports.lock().len(), 1);
        assert!(harness.responder.rejections.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_kinds_are_discarded() {
        let harness = Harness::new(Vec::new());
        let pipeline = harness.pipeline.clone().with_config(PipelineConfig {
            interactions: InteractionToggles {
                commands: false,
                ..InteractionToggles::default()
            },
            ..PipelineConfig::default()
        });

        let outcome = pipeline.process(Arc::new(ping_check())).await.unwrap();

        assert_eq!(outcome, PipelineOutcome::Discarded);
        assert!(harness.responder.rejections.lock().is_empty());
    }

    #[tokio::test]
    async fn test_callback_errors_propagate() {
        let harness = Harness::new(vec![
            LinkDefinition::command(
                ping_schema(),
                LinkedHandler::command(|_ctx| async { Err(BoxError::from("boom")) }),
            )
            .options(text_only()),
        ]);

        let err = harness
            .pipeline
            .process(Arc::new(ping_check()))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "boom");
    }
}
