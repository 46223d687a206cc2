//! HTTP connectors for opsdroid.
//!
//! - [`RestConnector`] (`module = "rest"`) polls a Slack-style web API.
//! - [`WebhookConnector`] (`module = "webhook"`) receives pushes through the
//!   runtime's web server.
//!
//! ```rust,ignore
//! use opsdroid_connector_http::{RestConnector, WebhookConnector};
//! use opsdroid_runtime::OpsDroid;
//!
//! let droid = OpsDroid::builder()
//!     .connector_module::<RestConnector>()
//!     .connector_module::<WebhookConnector>()
//!     .build()?;
//! ```

pub mod config;
pub mod rest;
pub mod webhook;

pub use config::{RestConfig, WebhookConfig};
pub use rest::RestConnector;
pub use webhook::WebhookConnector;
