//! Runtime orchestration.
//!
//! [`ArborRuntime`] wires an [`EventSource`] to the dispatch bus, subscribes
//! the interaction pipeline to `INTERACTION_CREATE` and pushes the merged
//! command schemas when `READY` first arrives.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use arbor_runtime::ArborRuntime;
//!
//! let runtime = ArborRuntime::builder()
//!     .config_file("arbor.toml")
//!     .cache(cache)
//!     .responder(responder)
//!     .transport(transport)
//!     .link(LinkDefinition::command(schema, handler))
//!     .build()?;
//!
//! runtime.run(gateway_events).await?;
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::signal;
use tracing::{debug, error, info, warn};

use arbor_core::{
    BoxedEntityCache, BoxedErrorSink, BoxedResponder, BoxedSchemaTransport, EventSource,
    GatewayEvent, INTERACTION_CREATE, READY, TracingErrorSink,
};
use arbor_framework::{
    EventBus, EventSkipped, HandlerResult, LinkDefinition, Pipeline, Router, StateStore,
};

use crate::config::{ArborConfig, CommandsConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// The Arbor runtime.
pub struct ArborRuntime {
    config: ArborConfig,
    pipeline: Pipeline,
    bus: EventBus<GatewayEvent>,
    running: AtomicBool,
}

impl ArborRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &ArborConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn router(&self) -> &Arc<Router> {
        self.pipeline.router()
    }

    pub fn state(&self) -> &Arc<StateStore> {
        self.pipeline.state()
    }

    pub fn bus(&self) -> &EventBus<GatewayEvent> {
        &self.bus
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Dispatches events from `source` until it ends or Ctrl+C/SIGTERM
    /// arrives.
    pub async fn run<S: EventSource>(&self, source: S) -> RuntimeResult<()> {
        self.run_until(source, wait_for_shutdown()).await
    }

    /// Dispatches events from `source` until it ends or `shutdown` resolves.
    ///
    /// Subscribers still running at that point are awaited, then every state
    /// entry is dropped.
    pub async fn run_until<S, F>(&self, mut source: S, shutdown: F) -> RuntimeResult<()>
    where
        S: EventSource,
        F: Future<Output = ()>,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyRunning);
        }
        info!(
            routes = self.router().len(),
            schemas = self.router().schemas().len(),
            "Arbor runtime started"
        );

        let mut in_flight = FuturesUnordered::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                event = source.next_event() => match event {
                    Some(event) => in_flight.extend(self.bus.emit(event)),
                    None => {
                        info!("Event source closed");
                        break;
                    }
                },
                Some(_) = in_flight.next(), if !in_flight.is_empty() => {}
            }
        }

        if !in_flight.is_empty() {
            debug!(pending = in_flight.len(), "Waiting for in-flight subscribers");
        }
        while in_flight.next().await.is_some() {}

        self.stop();
        Ok(())
    }

    fn stop(&self) {
        let dropped = self.state().len();
        self.state().clear();
        self.running.store(false, Ordering::SeqCst);
        info!(state_entries = dropped, "Arbor runtime stopped");
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// Readiness
// =============================================================================

/// Learns the bot id from `READY` and upserts the merged schemas the first
/// time it succeeds.
fn subscribe_ready(
    bus: &mut EventBus<GatewayEvent>,
    pipeline: Pipeline,
    transport: BoxedSchemaTransport,
    commands: CommandsConfig,
) {
    let upserted = Arc::new(AtomicBool::new(false));

    bus.on_fn(READY, move |event: Arc<GatewayEvent>| {
        let pipeline = pipeline.clone();
        let transport = Arc::clone(&transport);
        let commands = commands.clone();
        let upserted = Arc::clone(&upserted);
        async move {
            let GatewayEvent::Ready(ready) = &*event else {
                return HandlerResult::Err(EventSkipped.into());
            };
            pipeline.set_bot_id(ready.bot_id);
            debug!(bot_id = %ready.bot_id, guilds = ready.guild_ids.len(), "Ready");

            if !commands.upsert_on_ready || upserted.swap(true, Ordering::SeqCst) {
                return Ok(());
            }

            let schemas = pipeline.router().schemas();
            match transport.upsert(&commands.scope, &schemas).await {
                Ok(()) => info!(count = schemas.len(), "Command schemas upserted"),
                Err(e) => {
                    upserted.store(false, Ordering::SeqCst);
                    error!(error = %e, "Failed to upsert command schemas");
                }
            }
            Ok(())
        }
    });
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for an [`ArborRuntime`].
///
/// The cache, responder and schema transport are required. Configuration is
/// loaded through a [`ConfigLoader`] unless given directly with
/// [`config`](Self::config).
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<ArborConfig>,
    init_logging: bool,
    cache: Option<BoxedEntityCache>,
    responder: Option<BoxedResponder>,
    transport: Option<BoxedSchemaTransport>,
    sink: Option<BoxedErrorSink>,
    router: Router,
    definitions: Vec<LinkDefinition>,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            init_logging: true,
            cache: None,
            responder: None,
            transport: None,
            sink: None,
            router: Router::new(),
            definitions: Vec::new(),
        }
    }

    /// Uses `config` as is, skipping files and environment variables.
    pub fn config(mut self, config: ArborConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically.
    pub fn merge(mut self, config: ArborConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Leaves the global subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn cache(mut self, cache: BoxedEntityCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn responder(mut self, responder: BoxedResponder) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn transport(mut self, transport: BoxedSchemaTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Defaults to [`TracingErrorSink`].
    pub fn sink(mut self, sink: BoxedErrorSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Starts from an already linked router.
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Queues a definition. Linking happens in [`build`](Self::build).
    pub fn link(mut self, definition: LinkDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn build(self) -> RuntimeResult<ArborRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let cache = self
            .cache
            .ok_or(RuntimeError::MissingCollaborator("entity cache"))?;
        let responder = self
            .responder
            .ok_or(RuntimeError::MissingCollaborator("responder"))?;
        let transport = self
            .transport
            .ok_or(RuntimeError::MissingCollaborator("schema transport"))?;
        let sink = self.sink.unwrap_or_else(|| Arc::new(TracingErrorSink));

        let mut router = self.router;
        for definition in self.definitions {
            router.link(definition)?;
        }

        let state = Arc::new(StateStore::new(config.framework.state_ttl()));
        let pipeline = Pipeline::new(Arc::new(router), cache, responder)
            .with_sink(Arc::clone(&sink))
            .with_state(state)
            .with_config(config.framework.pipeline_config());

        let mut bus = EventBus::new().with_sink(sink);
        if let Some(timeout) = config.framework.handler_timeout() {
            bus = bus.with_timeout(timeout);
        }
        bus.on(INTERACTION_CREATE, pipeline.clone());
        subscribe_ready(&mut bus, pipeline.clone(), transport, config.commands.clone());

        info!(
            log_level = %config.logging.level,
            state_ttl_ms = config.framework.state_ttl_ms,
            routes = pipeline.router().len(),
            "Runtime initialized from configuration"
        );

        Ok(ArborRuntime {
            config,
            pipeline,
            bus,
            running: AtomicBool::new(false),
        })
    }
}
