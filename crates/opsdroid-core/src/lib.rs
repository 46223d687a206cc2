//! # opsdroid Core
//!
//! The core engine of opsdroid: a chat-bot runtime that multiplexes several
//! messaging services into one event stream and fans events out to skills.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! Core abstractions and type system:
//! - **Events**: Immutable normalized events ([`Event`], [`EventKind`])
//! - **Errors**: The shared error taxonomy ([`ConnectError`], [`SendError`], [`StateError`])
//! - **Statistics**: Dispatch counters ([`DispatchStats`])
//!
//! ### Framework Layer
//!
//! Event processing and routing:
//! - **Matchers**: Pure predicates over events ([`Matcher`])
//! - **Skills**: Predicate and action pairs ([`Skill`], [`SkillContext`])
//! - **Registry**: Ordered skill collection ([`SkillRegistry`])
//! - **Dispatcher**: Connector lifecycle and fan-out ([`Dispatcher`])
//!
//! ### Integration Layer
//!
//! External system interfaces:
//! - **Connectors**: Messaging service sessions ([`Connector`])
//! - **Webhooks**: HTTP callback routing ([`WebhookCapability`])
//!
//! ## Hub-and-Spoke Architecture
//!
//! All events flow through the central [`Dispatcher`]:
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌───────────┐
//! │  Connector  │────▶│ Dispatcher │────▶│   Skill   │
//! │   (rest)    │     │   (Core)   │────▶│   Skill   │
//! └─────────────┘     └────────────┘────▶│   Skill   │
//!                                        └───────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use opsdroid_core::prelude::*;
//!
//! async fn ping(ctx: SkillContext) -> anyhow::Result<()> {
//!     ctx.respond("pong").await?;
//!     Ok(())
//! }
//!
//! let skills = SkillRegistry::new().with(Skill::new("ping", match_text("ping"), ping));
//! let dispatcher = Dispatcher::new(
//!     skills,
//!     vec![Arc::new(MyConnector::default())],
//!     Arc::new(DispatchStats::new()),
//!     DispatcherConfig::default(),
//! );
//!
//! dispatcher.start(ConnectorContext::new());
//! // ...
//! dispatcher.stop().await;
//! ```

// Architectural layers
pub mod foundation;
pub mod framework;
pub mod integration;

pub use framework::matcher;

// Re-export foundation types
pub use foundation::{
    ConnectError, ConnectResult, ConnectorError, ConnectorResult, DispatchActionError,
    DispatchStats, Event, EventBuilder, EventError, EventKind, FileContent, SendError,
    SendResult, SharedEvent, StateError, StatsSnapshot,
};

// Re-export framework types
pub use framework::{
    Action, ConfigurableSkill, Dispatcher, DispatcherConfig, Matcher, Skill, SkillContext,
    SkillRegistry,
};

// Re-export integration types
pub use integration::{
    BoxedConnector, ConfigurableConnector, Connector, ConnectorContext, ConnectorState, EventSink,
    ManagedConnector, WebhookCapability, WebhookError, WebhookHandler, WebhookRequest, WebhookResponse,
    unsupported, webhook_handler,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::*;
    pub use super::framework::*;
    pub use super::integration::*;
    pub use async_trait::async_trait;
    pub use tokio_util::sync::CancellationToken;
}
