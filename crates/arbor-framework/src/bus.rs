//! The event dispatch bus.
//!
//! Subscribers are tower services keyed by event name. [`EventBus::emit`]
//! runs every subscriber for the event in its own task, so a slow or failing
//! subscriber never holds up the others.
//!
//! Failures stop at this boundary: errors, panics and timeouts are logged
//! with the event name and a correlation id and reported to the error sink.
//! A subscriber that returns [`EventSkipped`] is passed over silently.
//!
//! ```rust,ignore
//! let mut bus = EventBus::new();
//! bus.on(INTERACTION_CREATE, pipeline.clone());
//! bus.on_fn(READY, |event: Arc<GatewayEvent>| async move { Ok(()) });
//! bus.emit(event);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tokio::task::JoinHandle;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service, ServiceExt, service_fn};
use tracing::{Instrument, Level, error, span, trace};

use arbor_core::{BoxedErrorSink, Event, TracingErrorSink};

use crate::error::{EventSkipped, FrameworkError};
use crate::pipeline::correlation_id;

/// A type-erased subscriber.
pub type BoxedSubscriber<E> = BoxCloneSyncService<Arc<E>, (), BoxError>;

/// Fans events out to the subscribers registered for their name.
pub struct EventBus<E: Event> {
    subscribers: HashMap<String, Vec<BoxedSubscriber<E>>>,
    timeout: Option<Duration>,
    sink: BoxedErrorSink,
}

impl<E: Event> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Event> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
            timeout: None,
            sink: Arc::new(TracingErrorSink),
        }
    }

    /// Fails subscribers that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_sink(mut self, sink: BoxedErrorSink) -> Self {
        self.sink = sink;
        self
    }

    /// Subscribes `service` to `event_name`.
    pub fn on<S>(&mut self, event_name: impl Into<String>, service: S)
    where
        S: Service<Arc<E>, Response = (), Error = BoxError> + Clone + Send + Sync + 'static,
        S::Future: Send + 'static,
    {
        let event_name = event_name.into();
        trace!(event_name = %event_name, "Subscriber registered");
        self.subscribers
            .entry(event_name)
            .or_default()
            .push(BoxCloneSyncService::new(service));
    }

    /// Subscribes an async closure to `event_name`.
    pub fn on_fn<F, Fut>(&mut self, event_name: impl Into<String>, f: F)
    where
        F: Fn(Arc<E>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on(event_name, service_fn(f));
    }

    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.subscribers.get(event_name).map_or(0, Vec::len)
    }

    /// Spawns one task per subscriber and returns their handles.
    ///
    /// Must be called within a Tokio runtime.
    pub fn emit(&self, event: E) -> Vec<JoinHandle<()>> {
        let event = Arc::new(event);
        let Some(subscribers) = self.subscribers.get(event.event_name()) else {
            trace!(event_name = event.event_name(), "No subscribers");
            return Vec::new();
        };

        subscribers
            .iter()
            .cloned()
            .map(|subscriber| {
                tokio::spawn(deliver(
                    subscriber,
                    Arc::clone(&event),
                    self.timeout,
                    Arc::clone(&self.sink),
                ))
            })
            .collect()
    }

    /// Like [`emit`](Self::emit), but waits for every subscriber to finish.
    pub async fn emit_and_wait(&self, event: E) {
        join_all(self.emit(event)).await;
    }
}

impl<E: Event> std::fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .subscribers
            .iter()
            .map(|(name, subscribers)| (name.as_str(), subscribers.len()))
            .collect();
        f.debug_struct("EventBus")
            .field("subscribers", &counts)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

async fn deliver<E: Event>(
    subscriber: BoxedSubscriber<E>,
    event: Arc<E>,
    timeout: Option<Duration>,
    sink: BoxedErrorSink,
) {
    let event_name = event.event_name().to_string();
    let correlation_id = correlation_id();
    let span = span!(
        Level::DEBUG,
        "dispatch",
        event_name = %event_name,
        correlation_id = %correlation_id
    );

    async move {
        let call = AssertUnwindSafe(subscriber.oneshot(event)).catch_unwind();

        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| limit),
            None => Ok(call.await),
        };

        let failure = match outcome {
            Ok(Ok(Ok(()))) => return,
            Ok(Ok(Err(err))) if err.is::<EventSkipped>() => {
                trace!("Subscriber skipped event");
                return;
            }
            Ok(Ok(Err(source))) => FrameworkError::HandlerFailed {
                event: event_name,
                correlation_id: correlation_id.clone(),
                source,
            },
            Ok(Err(payload)) => FrameworkError::HandlerPanicked {
                event: event_name,
                correlation_id: correlation_id.clone(),
                message: panic_message(&*payload),
            },
            Err(limit) => FrameworkError::HandlerTimeout {
                event: event_name,
                correlation_id: correlation_id.clone(),
                timeout_ms: limit.as_millis() as u64,
            },
        };

        error!(error = %failure, "Subscriber failed");
        sink.report(&failure, Some(&correlation_id));
    }
    .instrument(span)
    .await
}
