//! opsdroid Runtime - orchestration layer for the opsdroid chat-bot runtime.
//!
//! This crate provides:
//! - The [`OpsDroid`] runtime and its lifecycle (`load`, `start`, `stop`,
//!   `unload`, scoped [`OpsDroid::with_loaded`])
//! - The [`ModuleRegistry`] mapping configuration `module` keys to connector
//!   and skill constructors
//! - figment-based configuration loading ([`config`])
//! - Logging setup ([`logging`])
//! - The built-in `ping` and `echo` skills
//!
//! ```ignore
//! use opsdroid_runtime::OpsDroid;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let droid = OpsDroid::builder()
//!         .connector_module::<WebhookConnector>()
//!         .build()?;
//!
//!     // Run until Ctrl+C
//!     droid.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod registry;
pub mod runtime;
pub mod skills;

// Re-exports
pub use config::{
    ConfigError, ConfigLoader, ConfigResult, ModuleConfig, OpsDroidConfig, Profile, WebConfig,
};
pub use error::{LoadError, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use registry::ModuleRegistry;
pub use runtime::{OpsDroid, RuntimeBuilder, RuntimeState};
pub use skills::{EchoSkill, PingSkill};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
