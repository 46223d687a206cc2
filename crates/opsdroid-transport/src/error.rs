//! Transport errors.

use thiserror::Error;

/// Errors raised by the HTTP transports.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Binding or serving a socket failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request could not be sent or the response not read.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The response body was not the expected format.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
