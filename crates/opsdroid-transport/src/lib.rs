//! # opsdroid Transport
//!
//! HTTP transport implementations for opsdroid.
//!
//! ## Features
//!
//! - `http-server`: The runtime web server ([`WebServer`]) serving the
//!   liveness and statistics endpoints and the webhook routes connectors
//!   register through [`WebhookCapability`](opsdroid_core::WebhookCapability).
//! - `http-client`: A small API client ([`ApiClient`]) for connectors that
//!   talk to HTTP platform APIs.
//! - `full`: Both.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Connector Layer    │  (rest, webhook, ...)
//! │  (uses capabilities)│
//! ├─────────────────────┤
//! │  opsdroid-core      │  (capability traits)
//! ├─────────────────────┤
//! │  opsdroid-transport │  <- This crate (implementations)
//! ├─────────────────────┤
//! │  Network (TCP/HTTP) │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use opsdroid_transport::WebServer;
//!
//! let server = Arc::new(WebServer::new(Arc::new(|| serde_json::json!({}))));
//! let addr = server.start("127.0.0.1:0").await?;
//! println!("listening on http://{addr}");
//! server.stop().await;
//! ```

pub mod error;

#[cfg(any(feature = "http-client", feature = "http-server"))]
pub mod http;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-server")]
pub use http::{StatsProvider, WebServer};

#[cfg(feature = "http-client")]
pub use http::{ApiClient, ApiResponse};
