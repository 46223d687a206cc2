//! Push-style webhook connector.
//!
//! While connecting, the connector registers one route on the runtime's web
//! server (`POST /connector/{name}` unless configured otherwise). Each request
//! body
//!
//! ```json
//! { "user": "alice", "target": "#ops", "text": "ping" }
//! ```
//!
//! becomes a message event. Replies are posted as JSON to `reply_url`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opsdroid_core::prelude::*;
use opsdroid_transport::ApiClient;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::WebhookConfig;

const INBOX_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
struct InboundMessage {
    text: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

struct Registration {
    webhooks: Arc<dyn WebhookCapability>,
    inbox: Option<mpsc::Receiver<Event>>,
}

/// A connector fed by HTTP callbacks.
pub struct WebhookConnector {
    name: String,
    path: String,
    config: WebhookConfig,
    client: Option<ApiClient>,
    registration: Mutex<Option<Registration>>,
}

impl WebhookConnector {
    /// Creates a connector named `name`.
    pub fn new(name: impl Into<String>, config: WebhookConfig) -> anyhow::Result<Self> {
        let name = name.into();
        let path = match &config.path {
            Some(path) if path.starts_with('/') => path.clone(),
            Some(path) => format!("/{path}"),
            None => format!("/connector/{name}"),
        };

        let client = config
            .reply_url
            .as_ref()
            .map(|url| ApiClient::new(url, Duration::from_millis(config.timeout_ms)))
            .transpose()?;

        Ok(Self {
            name,
            path,
            config,
            client,
            registration: Mutex::new(None),
        })
    }

    /// Returns the route this connector registers.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn handler(&self, inbox: mpsc::Sender<Event>) -> WebhookHandler {
        let connector = self.name.clone();
        let secret = self.config.secret.clone();

        webhook_handler(move |request: WebhookRequest| {
            let connector = connector.clone();
            let secret = secret.clone();
            let inbox = inbox.clone();
            async move {
                if let Some(secret) = secret {
                    let expected = format!("Bearer {secret}");
                    if request.header("authorization") != Some(expected.as_str()) {
                        return WebhookResponse::with_status(401, json!({ "error": "unauthorized" }));
                    }
                }

                let message: InboundMessage = match request.json() {
                    Ok(message) => message,
                    Err(e) => {
                        debug!(connector = %connector, error = %e, "Rejected webhook payload");
                        return WebhookResponse::with_status(400, json!({ "error": e.to_string() }));
                    }
                };

                let raw: Value = request.json().unwrap_or(Value::Null);
                let mut event = Event::message(message.text).connector(&connector).raw(raw);
                if let Some(user) = message.user {
                    event = event.user(user);
                }
                if let Some(target) = message.target {
                    event = event.target(target);
                }
                let event = event.build();
                let id = event.id();

                match inbox.send(event).await {
                    Ok(()) => WebhookResponse::ok(json!({ "ok": true, "id": id.to_string() })),
                    Err(_) => WebhookResponse::with_status(
                        503,
                        json!({ "error": "connector is not listening" }),
                    ),
                }
            }
        })
    }
}

#[async_trait]
impl Connector for WebhookConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_target(&self) -> Option<&str> {
        self.config.default_target.as_deref()
    }

    async fn connect(&self, ctx: &ConnectorContext) -> ConnectResult<()> {
        let webhooks = ctx
            .webhooks()
            .cloned()
            .ok_or_else(|| ConnectError::transport("webhook connector requires the web server"))?;

        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        webhooks
            .register(&self.path, self.handler(tx))
            .map_err(|e| ConnectError::transport(e.to_string()))?;

        info!(connector = %self.name, path = %self.path, "Webhook registered");
        *self.registration.lock() = Some(Registration {
            webhooks,
            inbox: Some(rx),
        });
        Ok(())
    }

    async fn listen(&self, sink: EventSink, shutdown: CancellationToken) -> ConnectorResult<()> {
        let mut inbox = self
            .registration
            .lock()
            .as_mut()
            .and_then(|r| r.inbox.take())
            .ok_or_else(|| ConnectorError::SessionClosed("webhook is not registered".to_string()))?;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => return Ok(()),
                event = inbox.recv() => match event {
                    Some(event) => sink.emit(event).await?,
                    None => {
                        return Err(ConnectorError::SessionClosed("webhook route removed".to_string()));
                    }
                },
            }
        }
    }

    async fn disconnect(&self) -> ConnectorResult<()> {
        if let Some(registration) = self.registration.lock().take()
            && !registration.webhooks.unregister(&self.path)
        {
            warn!(connector = %self.name, path = %self.path, "Webhook was already removed");
        }
        Ok(())
    }

    async fn deliver(&self, event: &Event) -> SendResult<()> {
        let Some(client) = &self.client else {
            return Err(unsupported(self, event));
        };
        let target = event.target().ok_or(SendError::NoTarget)?;
        let in_reply_to = event.linked_event().map(|id| id.to_string());

        let body = match event.kind() {
            EventKind::Message { text } => {
                json!({ "target": target, "text": text, "in_reply_to": in_reply_to })
            }
            EventKind::Reaction { emoji } => {
                json!({ "target": target, "reaction": emoji, "in_reply_to": in_reply_to })
            }
            _ => return Err(unsupported(self, event)),
        };

        let response = client
            .post_json(client.base_url(), &body)
            .await
            .map_err(|e| SendError::Transport(e.to_string()))?;
        if response.is_success() {
            Ok(())
        } else {
            Err(SendError::Rejected {
                status: response.status,
                body: response.body,
            })
        }
    }
}

impl ConfigurableConnector for WebhookConnector {
    type Config = WebhookConfig;

    fn module() -> &'static str {
        "webhook"
    }

    fn from_config(name: &str, config: WebhookConfig) -> anyhow::Result<Arc<Self>> {
        Ok(Arc::new(Self::new(name, config)?))
    }
}
