//! # opsdroid
//!
//! An open source chat-bot runtime. Connectors turn messaging services into
//! one stream of normalized events; skills react to the events they match.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌──────────────────────────────┐
//! │  Connector  │────▶│            │────▶│ Skill "ping"  (own task)     │──▶ reply
//! │   (rest)    │     │ Dispatcher │────▶│ Skill "echo"  (own task)     │──▶ reply
//! │  Connector  │────▶│            │────▶│ Skill ...                    │
//! │  (webhook)  │     └────────────┘     └──────────────────────────────┘
//! └─────────────┘
//! ```
//!
//! - **Runtime** ([`OpsDroid`](prelude::OpsDroid)): loads modules from
//!   configuration and owns the `unloaded → loaded → running → stopped`
//!   lifecycle
//! - **Connectors**: one session per messaging service; a connector that fails
//!   to connect is logged and left out while the others keep running
//! - **Dispatcher**: evaluates every skill against every event and runs all
//!   matching actions concurrently; events from one connector are dispatched
//!   in order
//! - **Skills**: a matcher plus an async action
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use opsdroid::prelude::*;
//!
//! async fn hello(ctx: SkillContext) -> anyhow::Result<()> {
//!     ctx.respond("hello").await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let droid = OpsDroid::builder()
//!         .connector_module::<WebhookConnector>()
//!         .skill(Skill::new("hello", match_text("hello"), hello))
//!         .build()?;
//!
//!     droid.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `http-connectors`: the `rest` and `webhook` connectors (default)
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use opsdroid_core as core;
pub use opsdroid_runtime as runtime;
pub use opsdroid_transport as transport;

#[cfg(feature = "http-connectors")]
pub use opsdroid_connector_http as connectors;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use opsdroid::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use opsdroid_runtime::{
        ModuleConfig, ModuleRegistry, OpsDroid, OpsDroidConfig, RuntimeBuilder, RuntimeState,
    };

    // Skills - matchers, actions and their context
    pub use opsdroid_core::matcher::{
        match_always, match_connector, match_kind, match_prefix, match_regex, match_text,
    };
    pub use opsdroid_core::{ConfigurableSkill, Matcher, Skill, SkillContext};

    // Events
    pub use opsdroid_core::{Event, EventKind};

    // Connectors - for custom implementations
    pub use opsdroid_core::{
        ConfigurableConnector, ConnectError, ConnectResult, Connector, ConnectorContext,
        ConnectorError, ConnectorResult, EventSink, SendError, SendResult,
    };
    pub use opsdroid_core::prelude::{CancellationToken, async_trait};

    // Built-in modules
    pub use opsdroid_runtime::{EchoSkill, PingSkill};
    #[cfg(feature = "http-connectors")]
    pub use opsdroid_connector_http::{RestConnector, WebhookConnector};
}
