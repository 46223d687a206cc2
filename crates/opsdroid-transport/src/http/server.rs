//! The runtime web server.
//!
//! One axum [`Router`] serves a fixed set of runtime endpoints and dispatches
//! everything else dynamically through a route table that connectors fill at
//! connect time:
//!
//! ```text
//! 127.0.0.1:8080
//! ├── GET  /                  → liveness
//! ├── GET  /stats             → dispatch statistics
//! ├── POST /connector/webhook → WebhookHandler (webhook connector)
//! └── *    /{*path}           → 404 unless registered
//! ```

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use opsdroid_core::{WebhookCapability, WebhookError, WebhookHandler, WebhookRequest};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::TransportResult;

/// Produces the JSON body of `GET /stats`.
pub type StatsProvider = Arc<dyn Fn() -> Value + Send + Sync>;

const RESERVED_PATHS: [&str; 2] = ["/", "/stats"];

// ─── Shared state ─────────────────────────────────────────────────────────────

struct SharedState {
    /// Webhook route table: path → handler.
    routes: RwLock<HashMap<String, WebhookHandler>>,
    stats: StatsProvider,
}

struct Listening {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

// ─── Server ───────────────────────────────────────────────────────────────────

/// The runtime HTTP surface.
///
/// Webhook routes survive a stop/start cycle; they are owned by the connectors
/// that registered them.
pub struct WebServer {
    state: Arc<SharedState>,
    listening: Mutex<Option<Listening>>,
}

impl WebServer {
    /// Creates a stopped server.
    pub fn new(stats: StatsProvider) -> Self {
        Self {
            state: Arc::new(SharedState {
                routes: RwLock::new(HashMap::new()),
                stats,
            }),
            listening: Mutex::new(None),
        }
    }

    /// Binds `addr` and starts serving. Returns the bound address, which
    /// differs from `addr` when port 0 was requested.
    ///
    /// Starting a running server returns its current address.
    pub async fn start(&self, addr: &str) -> TransportResult<SocketAddr> {
        if let Some(current) = self.local_addr() {
            warn!(addr = %current, "Web server is already running");
            return Ok(current);
        }

        let listener = TcpListener::bind(addr).await?;
        let actual_addr = listener.local_addr()?;
        let router = build_router(Arc::clone(&self.state));
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, router);
            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!(error = %e, "Web server error");
                    }
                }
                () = token.cancelled() => {
                    debug!(addr = %actual_addr, "Web server shutting down");
                }
            }
        });

        info!(addr = %actual_addr, "Web server listening");
        *self.listening.lock() = Some(Listening {
            addr: actual_addr,
            shutdown,
            task,
        });
        Ok(actual_addr)
    }

    /// Stops serving and releases the socket. No-op while stopped.
    pub async fn stop(&self) {
        let Some(listening) = self.listening.lock().take() else {
            return;
        };
        listening.shutdown.cancel();
        if let Err(e) = listening.task.await {
            error!(error = %e, "Web server task terminated abnormally");
        }
        info!(addr = %listening.addr, "Web server stopped");
    }

    /// Returns true while the socket is bound.
    pub fn is_running(&self) -> bool {
        self.listening.lock().is_some()
    }

    /// Returns the bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().as_ref().map(|l| l.addr)
    }

    /// Returns `http://host:port` while running.
    pub fn base_url(&self) -> Option<String> {
        self.local_addr().map(|addr| format!("http://{addr}"))
    }

    /// Returns the registered webhook paths, sorted.
    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<_> = self.state.routes.read().keys().cloned().collect();
        routes.sort();
        routes
    }

    #[cfg(test)]
    fn router(&self) -> Router {
        build_router(Arc::clone(&self.state))
    }
}

impl WebhookCapability for WebServer {
    fn register(&self, path: &str, handler: WebhookHandler) -> Result<(), WebhookError> {
        let path = normalize(path);
        if RESERVED_PATHS.contains(&path.as_str()) {
            return Err(WebhookError::Reserved(path));
        }

        let mut routes = self.state.routes.write();
        if routes.contains_key(&path) {
            return Err(WebhookError::Duplicate(path));
        }
        info!(path = %path, "Registered webhook route");
        routes.insert(path, handler);
        Ok(())
    }

    fn unregister(&self, path: &str) -> bool {
        let path = normalize(path);
        let removed = self.state.routes.write().remove(&path).is_some();
        if removed {
            info!(path = %path, "Unregistered webhook route");
        }
        removed
    }
}

impl std::fmt::Debug for WebServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebServer")
            .field("addr", &self.local_addr())
            .field("routes", &self.routes())
            .finish()
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

// ─── Router construction ──────────────────────────────────────────────────────

/// Builds the axum [`Router`].
///
/// `/` and `/stats` only answer `GET`; axum replies **405** to other methods.
/// Every other path goes through [`webhook_dispatch`].
fn build_router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/stats", get(stats))
        .route("/{*path}", any(webhook_dispatch))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({ "message": "Welcome to the opsdroid API" }))
}

async fn stats(State(state): State<Arc<SharedState>>) -> Json<Value> {
    Json((state.stats)())
}

/// Looks up the request path in the route table and delegates to the
/// registered handler, or returns **404** if none is found.
async fn webhook_dispatch(
    State(state): State<Arc<SharedState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let handler = state.routes.read().get(&path).cloned();

    let Some(handler) = handler else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no handler for path: {path}") })),
        )
            .into_response();
    };

    let headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect();

    debug!(method = %method, path = %path, len = body.len(), "Webhook request");
    let request = WebhookRequest {
        method: method.as_str().to_string(),
        path,
        query: uri.query().map(str::to_string),
        headers,
        body: body.to_vec(),
    };

    let response = handler(request).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use opsdroid_core::{WebhookResponse, webhook_handler};
    use tower::ServiceExt;

    fn server() -> WebServer {
        WebServer::new(Arc::new(|| json!({ "messages": { "messages_parsed": 3 } })))
    }

    async fn call(router: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_stats_only_answers_get() {
        let server = server();

        let (status, body) = call(server.router(), Method::GET, "/stats", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"]["messages_parsed"], 3);

        let (status, _) = call(server.router(), Method::POST, "/stats", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, body) = call(server.router(), Method::GET, "/", "").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_webhook_routes() {
        let server = server();
        server
            .register(
                "connector/hook",
                webhook_handler(|req: WebhookRequest| async move {
                    let body: Value = req.json().unwrap_or(Value::Null);
                    WebhookResponse::with_status(201, json!({ "got": body["text"], "method": req.method }))
                }),
            )
            .unwrap();

        let (status, body) =
            call(server.router(), Method::POST, "/connector/hook", r#"{"text":"hi"}"#).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({ "got": "hi", "method": "POST" }));

        let (status, _) = call(server.router(), Method::POST, "/connector/other", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        assert!(server.unregister("/connector/hook"));
        let (status, _) = call(server.router(), Method::POST, "/connector/hook", "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_reserved_paths() {
        let server = server();
        let handler = webhook_handler(|_req: WebhookRequest| async { WebhookResponse::ok(Value::Null) });

        server.register("/a", Arc::clone(&handler)).unwrap();
        assert_eq!(
            server.register("a", Arc::clone(&handler)),
            Err(WebhookError::Duplicate("/a".into()))
        );
        assert_eq!(
            server.register("/stats", handler),
            Err(WebhookError::Reserved("/stats".into()))
        );
        assert_eq!(server.routes(), vec!["/a".to_string()]);
    }

    #[tokio::test]
    async fn test_start_binds_ephemeral_port() {
        let server = server();
        let addr = server.start("127.0.0.1:0").await.unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.start("127.0.0.1:0").await.unwrap(), addr);
        assert!(server.is_running());

        server.stop().await;
        server.stop().await;
        assert!(!server.is_running());
        assert_eq!(server.base_url(), None);
    }
}
