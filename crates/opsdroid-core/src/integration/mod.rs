//! Integration layer - External system interfaces.
//!
//! This module contains the interfaces connectors implement and consume:
//! - The connector capability and its lifecycle state
//! - The webhook capability offered by the runtime's web server

pub mod connector;
pub mod webhook;

pub use connector::{
    BoxedConnector, ConfigurableConnector, Connector, ConnectorContext, ConnectorState, EventSink,
    ManagedConnector, unsupported,
};
pub use webhook::{
    WebhookCapability, WebhookError, WebhookHandler, WebhookRequest, WebhookResponse,
    webhook_handler,
};
