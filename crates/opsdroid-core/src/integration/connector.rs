//! Connector capability.
//!
//! A [`Connector`] wraps one external messaging service. It owns exactly one
//! transport session and follows a three-step lifecycle:
//!
//! 1. [`connect`](Connector::connect) establishes the session. Push-style
//!    connectors register their webhook routes here through the
//!    [`ConnectorContext`].
//! 2. [`listen`](Connector::listen) runs until the shutdown token fires or the
//!    session closes, emitting normalized events into an [`EventSink`].
//! 3. [`disconnect`](Connector::disconnect) releases the session.
//!
//! The dispatcher is agnostic to the transport strategy: a polling loop and a
//! webhook inbox look identical from the outside.
//!
//! ```rust,ignore
//! #[async_trait]
//! impl Connector for ShellConnector {
//!     fn name(&self) -> &str { "shell" }
//!
//!     async fn connect(&self, _ctx: &ConnectorContext) -> ConnectResult<()> { Ok(()) }
//!
//!     async fn listen(&self, sink: EventSink, shutdown: CancellationToken) -> ConnectorResult<()> {
//!         loop {
//!             tokio::select! {
//!                 () = shutdown.cancelled() => return Ok(()),
//!                 line = self.next_line() => {
//!                     sink.emit(Event::message(line).user("user").build()).await?;
//!                 }
//!             }
//!         }
//!     }
//!
//!     async fn deliver(&self, event: &Event) -> SendResult<()> { ... }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::foundation::error::{
    ConnectResult, ConnectorError, ConnectorResult, SendError, SendResult,
};
use crate::foundation::event::Event;
use crate::integration::webhook::WebhookCapability;

/// The lifecycle state of a connector session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectorState {
    /// No session.
    #[default]
    Disconnected,
    /// `connect()` is in progress.
    Connecting,
    /// The session is up and the listen loop is (or is about to be) running.
    Connected,
    /// `connect()` failed; the connector is out of service.
    Error,
}

impl std::fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Capabilities the runtime offers to connectors while they connect.
#[derive(Clone, Default)]
pub struct ConnectorContext {
    webhooks: Option<Arc<dyn WebhookCapability>>,
}

impl ConnectorContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the runtime's webhook capability.
    pub fn with_webhooks(mut self, webhooks: Arc<dyn WebhookCapability>) -> Self {
        self.webhooks = Some(webhooks);
        self
    }

    /// Returns the webhook capability, if the runtime serves HTTP.
    pub fn webhooks(&self) -> Option<&Arc<dyn WebhookCapability>> {
        self.webhooks.as_ref()
    }
}

impl std::fmt::Debug for ConnectorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorContext")
            .field("has_webhooks", &self.webhooks.is_some())
            .finish()
    }
}

/// The write half of the dispatcher's event channel, bound to one connector.
///
/// Events emitted through the same sink are dispatched in emission order.
#[derive(Debug, Clone)]
pub struct EventSink {
    connector: String,
    tx: mpsc::Sender<Event>,
}

impl EventSink {
    /// Creates a sink for `connector` writing into `tx`.
    pub fn new(connector: impl Into<String>, tx: mpsc::Sender<Event>) -> Self {
        Self {
            connector: connector.into(),
            tx,
        }
    }

    /// Returns the connector this sink belongs to.
    pub fn connector(&self) -> &str {
        &self.connector
    }

    /// Pushes an event to the dispatcher.
    ///
    /// Events without an originating connector are attributed to this sink's
    /// connector. Suspends while the channel is full.
    pub async fn emit(&self, event: Event) -> ConnectorResult<()> {
        let event = if event.connector().is_none() {
            event.with_origin(&self.connector)
        } else {
            event
        };
        self.tx
            .send(event)
            .await
            .map_err(|_| ConnectorError::SinkClosed)
    }

    /// Returns true once the dispatcher stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The connector capability consumed by the dispatcher.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Returns the unique connector name.
    fn name(&self) -> &str;

    /// Returns the target used when an outbound event names none.
    fn default_target(&self) -> Option<&str> {
        None
    }

    /// Establishes the underlying session.
    async fn connect(&self, ctx: &ConnectorContext) -> ConnectResult<()>;

    /// Produces events until `shutdown` fires or the session closes.
    ///
    /// Implementations must observe `shutdown` at every suspension point.
    async fn listen(&self, sink: EventSink, shutdown: CancellationToken) -> ConnectorResult<()>;

    /// Releases the underlying session.
    async fn disconnect(&self) -> ConnectorResult<()> {
        Ok(())
    }

    /// Delivers an already-addressed event to the platform.
    ///
    /// Connectors return [`SendError::Unsupported`] for event kinds they can
    /// not deliver.
    async fn deliver(&self, event: &Event) -> SendResult<()>;

    /// Sends an event, resolving its target first.
    ///
    /// The explicit `target` wins, then the event's own target, then
    /// [`default_target`](Connector::default_target).
    async fn send(&self, event: &Event, target: Option<&str>) -> SendResult<()> {
        let resolved = target
            .or(event.target())
            .or(self.default_target())
            .ok_or(SendError::NoTarget)?;

        if event.target() == Some(resolved) {
            self.deliver(event).await
        } else {
            self.deliver(&event.retarget(resolved)).await
        }
    }
}

/// A shared connector trait object.
pub type BoxedConnector = Arc<dyn Connector>;

/// A connector that can be built from configuration.
///
/// The runtime looks up the `module` key of each `connectors.<name>` entry,
/// deserializes the remaining settings into [`Config`](Self::Config) and calls
/// [`from_config`](Self::from_config):
///
/// ```toml
/// [connectors.ops]
/// module = "rest"     # <- returned by ConfigurableConnector::module()
/// api_url = "https://chat.example.com/api"
/// ```
pub trait ConfigurableConnector: Connector {
    /// The settings type for this connector.
    type Config: DeserializeOwned + Default;

    /// Returns the module key used in configuration.
    fn module() -> &'static str
    where
        Self: Sized;

    /// Creates a connector named `name` from its settings.
    fn from_config(name: &str, config: Self::Config) -> anyhow::Result<Arc<Self>>
    where
        Self: Sized;
}

/// A connector together with its lifecycle state, owned by the dispatcher.
pub struct ManagedConnector {
    connector: BoxedConnector,
    state: RwLock<ConnectorState>,
}

impl ManagedConnector {
    /// Wraps a connector in the `Disconnected` state.
    pub fn new(connector: BoxedConnector) -> Self {
        Self {
            connector,
            state: RwLock::new(ConnectorState::Disconnected),
        }
    }

    /// Returns the connector name.
    pub fn name(&self) -> &str {
        self.connector.name()
    }

    /// Returns the wrapped connector.
    pub fn connector(&self) -> &BoxedConnector {
        &self.connector
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectorState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: ConnectorState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            trace!(connector = %self.name(), from = %previous, to = %state, "Connector state changed");
        }
    }
}

impl std::fmt::Debug for ManagedConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedConnector")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

/// Builds the error a connector returns for an event kind it can not send.
pub fn unsupported(connector: &dyn Connector, event: &Event) -> SendError {
    SendError::Unsupported {
        connector: connector.name().to_string(),
        kind: event.kind().name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::event::EventKind;
    use parking_lot::Mutex;
    use tokio_test::{assert_err, assert_ok};

    struct RecordingConnector {
        default_target: Option<String>,
        delivered: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl Connector for RecordingConnector {
        fn name(&self) -> &str {
            "recording"
        }

        fn default_target(&self) -> Option<&str> {
            self.default_target.as_deref()
        }

        async fn connect(&self, _ctx: &ConnectorContext) -> ConnectResult<()> {
            Ok(())
        }

        async fn listen(
            &self,
            _sink: EventSink,
            shutdown: CancellationToken,
        ) -> ConnectorResult<()> {
            shutdown.cancelled().await;
            Ok(())
        }

        async fn deliver(&self, event: &Event) -> SendResult<()> {
            match event.kind() {
                EventKind::Message { .. } => {
                    self.delivered.lock().push(event.clone());
                    Ok(())
                }
                _ => Err(unsupported(self, event)),
            }
        }
    }

    fn connector(default_target: Option<&str>) -> RecordingConnector {
        RecordingConnector {
            default_target: default_target.map(str::to_string),
            delivered: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_send_uses_default_target() {
        let c = connector(Some("#general"));
        assert_ok!(c.send(&Event::message("hi").build(), None).await);

        assert_eq!(c.delivered.lock()[0].target(), Some("#general"));
    }

    #[tokio::test]
    async fn test_explicit_target_wins() {
        let c = connector(Some("#general"));
        let event = Event::message("hi").target("#ops").build();
        c.send(&event, Some("#random")).await.unwrap();

        assert_eq!(c.delivered.lock()[0].target(), Some("#random"));
    }

    #[tokio::test]
    async fn test_send_without_any_target_fails() {
        let c = connector(None);
        let err = assert_err!(c.send(&Event::message("hi").build(), None).await);
        assert!(matches!(err, SendError::NoTarget));
    }

    #[tokio::test]
    async fn test_unsupported_kind() {
        let c = connector(Some("#general"));
        let err = c
            .send(&Event::reaction("+1").build(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Unsupported { kind: "reaction", .. }));
    }

    #[tokio::test]
    async fn test_sink_attributes_origin() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new("shell", tx);

        sink.emit(Event::message("a").build()).await.unwrap();
        sink.emit(Event::message("b").connector("other").build())
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().connector(), Some("shell"));
        assert_eq!(rx.recv().await.unwrap().connector(), Some("other"));

        drop(rx);
        assert!(sink.is_closed());
        assert!(matches!(
            sink.emit(Event::message("c").build()).await,
            Err(ConnectorError::SinkClosed)
        ));
    }
}
