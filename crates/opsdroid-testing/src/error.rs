//! Error types for the test utilities.

use std::path::PathBuf;

use opsdroid_core::StateError;
use opsdroid_transport::TransportError;
use thiserror::Error;

/// Errors raised by the mock server and the endpoint helpers.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Only `GET` and `POST` routes can be mocked or called.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Not a valid HTTP status code.
    #[error("invalid status code: {0}")]
    InvalidStatus(u16),

    /// A route was called more often than responses were queued for it.
    ///
    /// This is a defect in the test, not in the code under test.
    #[error("no mocked response left for route {route}")]
    Exhausted {
        /// The route that ran dry.
        route: String,
    },

    /// The operation is not valid in the current lifecycle state.
    #[error(transparent)]
    State(#[from] StateError),

    /// A response file could not be loaded.
    #[error("failed to load payload from {path}: {reason}")]
    Payload {
        /// The file that was read.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// A `POST` was issued without a body.
    #[error("{method} requires data")]
    MissingData {
        /// The request method.
        method: String,
    },

    /// The runtime is not serving HTTP.
    #[error("opsdroid is not serving HTTP")]
    NotServing,

    /// Binding the listener failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An HTTP call failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl HarnessError {
    /// Returns true if a mocked route ran out of responses.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Result type for the test utilities.
pub type HarnessResult<T> = Result<T, HarnessError>;
