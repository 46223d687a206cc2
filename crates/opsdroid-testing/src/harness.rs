//! A web server that pretends to be an external API.
//!
//! Tests queue the responses they expect the code under test to fetch, one
//! FIFO queue per route. Every incoming request pops the oldest response of
//! its route, and is recorded so the test can assert on what was sent:
//!
//! ```rust,ignore
//! use serde_json::json;
//! use opsdroid_testing::ExternalApiMockServer;
//!
//! let mock_api = ExternalApiMockServer::new();
//! mock_api.add_response("/auth.test", "GET", Some(json!({ "ok": true })), 200)?;
//!
//! mock_api.start().await?;
//! // ... point the code under test at mock_api.base_url() ...
//! mock_api.stop().await?;
//!
//! assert!(mock_api.called("/auth.test"));
//! ```
//!
//! A request for a route with an empty queue answers **500** with an
//! `x-mock-exhausted` header, and the exhaustion is reported again by
//! [`stop`](ExternalApiMockServer::stop) and
//! [`verify`](ExternalApiMockServer::verify) so it can not go unnoticed.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use opsdroid_core::StateError;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{HarnessError, HarnessResult};

/// Header set on responses to requests that found an empty queue.
pub const EXHAUSTED_HEADER: &str = "x-mock-exhausted";

/// Form fields decoded from a request body.
pub type Payload = BTreeMap<String, String>;

/// One request received by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Upper-case HTTP method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Raw query string.
    pub query: Option<String>,
    /// Request headers with lower-case names.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Returns a header value by lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Decodes the query string.
    pub fn query_pairs(&self) -> Payload {
        self.query
            .as_deref()
            .map(|q| decode_form(q.as_bytes()))
            .unwrap_or_default()
    }

    /// Decodes the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

#[derive(Debug)]
struct MockRoute {
    method: Method,
    queue: VecDeque<(StatusCode, Value)>,
}

#[derive(Debug, Default)]
struct MockState {
    routes: HashMap<String, MockRoute>,
    calls: HashMap<String, Vec<RecordedRequest>>,
    payloads: HashMap<String, Vec<Payload>>,
    exhausted: Vec<String>,
}

struct Listening {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

/// A mock of an external HTTP API.
///
/// Only `GET` and `POST` routes are supported. The server binds an ephemeral
/// port on `127.0.0.1` unless [`bind_to`](Self::bind_to) says otherwise.
pub struct ExternalApiMockServer {
    host: String,
    port: u16,
    state: Arc<Mutex<MockState>>,
    listening: Mutex<Option<Listening>>,
}

impl ExternalApiMockServer {
    /// Creates a stopped server with no routes.
    pub fn new() -> Self {
        Self::bind_to("127.0.0.1", 0)
    }

    /// Creates a stopped server that will listen on `host:port`.
    pub fn bind_to(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            state: Arc::new(Mutex::new(MockState::default())),
            listening: Mutex::new(None),
        }
    }

    // =========================================================================
    // Responses
    // =========================================================================

    /// Queues one response for `route`.
    ///
    /// The first response queued for a route also registers the route for
    /// `method`. `None` answers with a JSON `null` body.
    pub fn add_response(
        &self,
        route: &str,
        method: &str,
        payload: Option<Value>,
        status: u16,
    ) -> HarnessResult<()> {
        let method = parse_method(method)?;
        let status = StatusCode::from_u16(status)
            .map_err(|_| HarnessError::InvalidStatus(status))?;
        let payload = payload.unwrap_or(Value::Null);

        let mut state = self.state.lock();
        match state.routes.get_mut(route) {
            Some(existing) => {
                if existing.method != method {
                    warn!(
                        route,
                        registered = %existing.method,
                        requested = %method,
                        "Route already registered for another method"
                    );
                }
                existing.queue.push_back((status, payload));
            }
            None => {
                debug!(route, method = %method, "Registered mock route");
                state.routes.insert(
                    route.to_string(),
                    MockRoute {
                        method,
                        queue: VecDeque::from([(status, payload)]),
                    },
                );
            }
        }
        Ok(())
    }

    /// Queues a response read from a JSON file.
    pub fn add_response_file(
        &self,
        route: &str,
        method: &str,
        path: impl AsRef<Path>,
        status: u16,
    ) -> HarnessResult<()> {
        let path = path.as_ref();
        let payload_error = |reason: String| HarnessError::Payload {
            path: path.to_path_buf(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| payload_error(e.to_string()))?;
        let payload = serde_json::from_str(&text).map_err(|e| payload_error(e.to_string()))?;
        self.add_response(route, method, Some(payload), status)
    }

    /// Returns the number of responses still queued for `route`.
    pub fn pending(&self, route: &str) -> usize {
        self.state
            .lock()
            .routes
            .get(route)
            .map_or(0, |r| r.queue.len())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Binds the listener and starts serving. Returns the bound address.
    ///
    /// Starting a running server returns its current address.
    pub async fn start(&self) -> HarnessResult<SocketAddr> {
        if let Some(addr) = self.local_addr() {
            warn!(addr = %addr, "Mock API is already running");
            return Ok(addr);
        }

        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let addr = listener.local_addr()?;
        let router = build_router(Arc::clone(&self.state));
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        let task = tokio::spawn(async move {
            tokio::select! {
                result = axum::serve(listener, router) => {
                    if let Err(e) = result {
                        error!(error = %e, "Mock API server error");
                    }
                }
                () = token.cancelled() => {}
            }
        });

        info!(addr = %addr, "Mock API listening");
        *self.listening.lock() = Some(Listening {
            addr,
            shutdown,
            task,
        });
        Ok(addr)
    }

    /// Stops serving and releases the listener.
    ///
    /// Fails with [`HarnessError::Exhausted`] if any route was called with an
    /// empty queue. Stopping a stopped server only repeats that check.
    pub async fn stop(&self) -> HarnessResult<()> {
        let listening = self.listening.lock().take();
        if let Some(listening) = listening {
            listening.shutdown.cancel();
            if let Err(e) = listening.task.await {
                error!(error = %e, "Mock API task terminated abnormally");
            }
            info!(addr = %listening.addr, "Mock API stopped");
        }
        self.verify()
    }

    /// Fails with [`HarnessError::Exhausted`] naming the first route that was
    /// called with an empty queue.
    pub fn verify(&self) -> HarnessResult<()> {
        match self.state.lock().exhausted.first() {
            Some(route) => Err(HarnessError::Exhausted {
                route: route.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Starts the server, runs `body` and stops again.
    ///
    /// The server is stopped even when `body` panics; the panic is resumed
    /// afterwards. An exhaustion is reported after `body` completed.
    pub async fn serve<Fut, T>(&self, body: Fut) -> HarnessResult<T>
    where
        Fut: Future<Output = T>,
    {
        self.start().await?;
        let outcome = AssertUnwindSafe(body).catch_unwind().await;
        let stopped = self.stop().await;

        match outcome {
            Ok(value) => stopped.map(|()| value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Forgets every route, queued response and recorded call.
    ///
    /// Only valid while stopped.
    pub fn reset(&self) -> HarnessResult<()> {
        if self.is_running() {
            return Err(StateError::MustBeStopped("mock API").into());
        }
        *self.state.lock() = MockState::default();
        debug!("Mock API reset");
        Ok(())
    }

    /// Returns true while the listener is bound.
    pub fn is_running(&self) -> bool {
        self.listening.lock().is_some()
    }

    /// Returns the bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listening.lock().as_ref().map(|l| l.addr)
    }

    /// Returns `http://host:port`.
    ///
    /// Before the first start on an ephemeral port this names port 0.
    pub fn base_url(&self) -> String {
        match self.local_addr() {
            Some(addr) => format!("http://{addr}"),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }

    // =========================================================================
    // Recorded calls
    // =========================================================================

    /// Returns true if `route` received at least one request.
    pub fn called(&self, route: &str) -> bool {
        self.state.lock().calls.contains_key(route)
    }

    /// Returns how many requests `route` received.
    pub fn call_count(&self, route: &str) -> usize {
        self.state.lock().calls.get(route).map_or(0, Vec::len)
    }

    /// Returns the `idx`-th request `route` received.
    pub fn get_request(&self, route: &str, idx: usize) -> Option<RecordedRequest> {
        self.state.lock().calls.get(route)?.get(idx).cloned()
    }

    /// Returns the form data of the `idx`-th request `route` received.
    ///
    /// Requests without a form body record an empty payload.
    pub fn get_payload(&self, route: &str, idx: usize) -> Option<Payload> {
        self.state.lock().payloads.get(route)?.get(idx).cloned()
    }
}

impl Default for ExternalApiMockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExternalApiMockServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        let mut routes: Vec<_> = state.routes.keys().cloned().collect();
        routes.sort();
        f.debug_struct("ExternalApiMockServer")
            .field("addr", &self.local_addr())
            .field("routes", &routes)
            .finish()
    }
}

fn parse_method(method: &str) -> HarnessResult<Method> {
    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(Method::GET),
        "POST" => Ok(Method::POST),
        _ => Err(HarnessError::UnsupportedMethod(method.to_string())),
    }
}

fn decode_form(bytes: &[u8]) -> Payload {
    url::form_urlencoded::parse(bytes).into_owned().collect()
}

fn build_router(state: Arc<Mutex<MockState>>) -> Router {
    Router::new().fallback(handle).with_state(state)
}

/// Records the request and answers with the oldest queued response.
async fn handle(
    State(state): State<Arc<Mutex<MockState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let route = uri.path().to_string();
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"));

    let mut state = state.lock();
    let next = match state.routes.get_mut(&route) {
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("no mocked route: {route}") })),
            )
                .into_response();
        }
        Some(mock) if mock.method != method => {
            return StatusCode::METHOD_NOT_ALLOWED.into_response();
        }
        Some(mock) => mock.queue.pop_front(),
    };

    let payload = if is_form { decode_form(&body) } else { Payload::new() };
    let request = RecordedRequest {
        method: method.as_str().to_string(),
        path: route.clone(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect(),
        body: body.to_vec(),
    };
    state.calls.entry(route.clone()).or_default().push(request);
    state.payloads.entry(route.clone()).or_default().push(payload);

    match next {
        Some((status, payload)) => {
            debug!(route = %route, status = status.as_u16(), "Mock API answered");
            (status, Json(payload)).into_response()
        }
        None => {
            error!(route = %route, "Mock API has no response left for route");
            state.exhausted.push(route.clone());
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(
                    HeaderName::from_static(EXHAUSTED_HEADER),
                    HeaderValue::from_static("true"),
                )],
                Json(json!({ "error": format!("no mocked response left for {route}") })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_method_is_rejected_at_registration() {
        let mock_api = ExternalApiMockServer::new();
        let err = mock_api
            .add_response("/test", "DELETE", None, 200)
            .unwrap_err();
        assert!(matches!(err, HarnessError::UnsupportedMethod(ref m) if m == "DELETE"));
        assert_eq!(mock_api.pending("/test"), 0);
    }

    #[test]
    fn test_responses_queue_per_route() {
        let mock_api = ExternalApiMockServer::new();
        mock_api.add_response("/a", "get", None, 200).unwrap();
        mock_api.add_response("/a", "GET", Some(json!({ "n": 2 })), 201).unwrap();
        mock_api.add_response("/b", "POST", None, 200).unwrap();

        assert_eq!(mock_api.pending("/a"), 2);
        assert_eq!(mock_api.pending("/b"), 1);
        assert!(!mock_api.called("/a"));
        assert_eq!(mock_api.call_count("/a"), 0);
        assert!(mock_api.get_request("/a", 0).is_none());
    }

    #[test]
    fn test_form_decoding() {
        let payload = decode_form(b"channel=%23ops&text=hello+world");
        assert_eq!(payload["channel"], "#ops");
        assert_eq!(payload["text"], "hello world");
    }

    #[test]
    fn test_response_file() {
        let dir = std::env::temp_dir().join(format!("opsdroid-mock-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("auth.json");
        std::fs::write(&file, r#"{"ok": true, "user_id": "B1"}"#).unwrap();

        let mock_api = ExternalApiMockServer::new();
        mock_api.add_response_file("/auth.test", "GET", &file, 200).unwrap();
        assert_eq!(mock_api.pending("/auth.test"), 1);

        let err = mock_api
            .add_response_file("/auth.test", "GET", dir.join("missing.json"), 200)
            .unwrap_err();
        assert!(matches!(err, HarnessError::Payload { .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
