//! Webhook capability.
//!
//! Push-style connectors receive platform callbacks over HTTP. Instead of
//! running their own server they ask the runtime's web server to route a path
//! to them while connecting:
//!
//! ```rust,ignore
//! async fn connect(&self, ctx: &ConnectorContext) -> ConnectResult<()> {
//!     let webhooks = ctx
//!         .webhooks()
//!         .ok_or_else(|| ConnectError::transport("web server disabled"))?;
//!
//!     let inbox = self.inbox.clone();
//!     webhooks
//!         .register(&format!("/connector/{}", self.name), webhook_handler(move |req| {
//!             let inbox = inbox.clone();
//!             async move { inbox.push(req).await }
//!         }))
//!         .map_err(|e| ConnectError::transport(e.to_string()))
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// An HTTP request routed to a webhook.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    /// Upper-case HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    /// Request headers with lower-case names.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
}

impl WebhookRequest {
    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Returns a header value by lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// The response a webhook handler returns.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

impl WebhookResponse {
    /// A `200 OK` response.
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// A response with an explicit status.
    pub fn with_status(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

/// A type-erased webhook handler.
pub type WebhookHandler = Arc<dyn Fn(WebhookRequest) -> BoxFuture<'static, WebhookResponse> + Send + Sync>;

/// Wraps an async closure into a [`WebhookHandler`].
pub fn webhook_handler<F, Fut>(f: F) -> WebhookHandler
where
    F: Fn(WebhookRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WebhookResponse> + Send + 'static,
{
    Arc::new(move |req| Box::pin(f(req)))
}

/// Errors raised while registering a webhook route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Another handler already owns this path.
    #[error("webhook path already registered: {0}")]
    Duplicate(String),

    /// The path is reserved by the runtime.
    #[error("webhook path is reserved: {0}")]
    Reserved(String),
}

/// Route registration offered by the runtime's web server.
pub trait WebhookCapability: Send + Sync {
    /// Routes every request for `path` to `handler`.
    fn register(&self, path: &str, handler: WebhookHandler) -> Result<(), WebhookError>;

    /// Removes the route for `path`, returning true if it existed.
    fn unregister(&self, path: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_webhook_handler_wraps_closure() {
        let handler = webhook_handler(|req: WebhookRequest| async move {
            let body: Value = req.json().unwrap_or(Value::Null);
            WebhookResponse::ok(json!({ "echo": body["text"] }))
        });

        let response = handler(WebhookRequest {
            method: "POST".into(),
            path: "/connector/webhook".into(),
            body: br#"{"text":"hi"}"#.to_vec(),
            ..Default::default()
        })
        .await;

        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({ "echo": "hi" }));
    }
}
