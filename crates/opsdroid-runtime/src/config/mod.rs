//! Configuration module for the opsdroid runtime.
//!
//! This module provides figment-based configuration loading and validation
//! for logging, the web server, the dispatcher and the connector and skill
//! modules.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatcherSettings, LogFormat, LogLevel, LogOutput, LoggingConfig, ModuleConfig,
    OpsDroidConfig, SpanEventConfig, WebConfig,
};
pub use validation::validate_config;
