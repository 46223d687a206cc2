//! Runtime error types.

use opsdroid_core::StateError;
use opsdroid_transport::TransportError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while resolving `connectors` and `skills` entries.
#[derive(Error, Debug)]
pub enum LoadError {
    /// No connector module is registered under this key.
    #[error("No connector module '{module}' for connector '{name}'")]
    UnknownConnector { name: String, module: String },

    /// No skill module is registered under this key.
    #[error("No skill module '{module}' for skill '{name}'")]
    UnknownSkill { name: String, module: String },

    /// The entry's settings do not fit the module's config type.
    #[error("Invalid config for '{name}' (module '{module}'): {reason}")]
    InvalidConfig {
        name: String,
        module: String,
        reason: String,
    },

    /// The module rejected its config.
    #[error("Module '{module}' failed to build '{name}': {reason}")]
    Module {
        name: String,
        module: String,
        reason: String,
    },

    /// Two connectors share a name.
    #[error("Duplicate connector name: {0}")]
    DuplicateConnector(String),
}

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid lifecycle transition.
    #[error(transparent)]
    State(#[from] StateError),

    /// A connector or skill could not be loaded.
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    /// The web server failed to start.
    #[error("Web server error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
