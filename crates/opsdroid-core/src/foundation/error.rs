//! Unified error types for the opsdroid core.
//!
//! The taxonomy mirrors the recovery boundaries of the system:
//!
//! - [`ConnectError`] is recovered at the connector boundary. The failing
//!   connector is marked `Error` and the rest of the runtime keeps starting.
//! - [`DispatchActionError`] is recovered at the dispatcher boundary. It is
//!   logged with the skill identity and never cancels sibling actions.
//! - [`StateError`] is a lifecycle contract violation and is returned to the
//!   caller immediately.

use thiserror::Error;

// =============================================================================
// Connector Errors
// =============================================================================

/// Errors raised while establishing a connector session.
#[derive(Debug, Clone, Error)]
pub enum ConnectError {
    /// The platform rejected the configured credentials.
    #[error("authentication failed: {message} (response: {response})")]
    Authentication {
        /// Message reported by the platform.
        message: String,
        /// Raw platform response, kept for diagnostics.
        response: String,
    },

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectError {
    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>, response: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
            response: response.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport(reason.into())
    }

    /// Returns true if the platform rejected the credentials.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}

/// Errors raised while sending an event through a connector.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The connector has no handler for this kind of event.
    #[error("connector '{connector}' can not handle the '{kind}' event type")]
    Unsupported {
        /// Connector name.
        connector: String,
        /// Event kind name.
        kind: &'static str,
    },

    /// Neither the event nor the connector provide a target.
    #[error("no target for outbound event")]
    NoTarget,

    /// The event did not come from a running connector.
    #[error("no connector available to deliver the event")]
    NoConnector,

    /// The platform answered with a non-success response.
    #[error("platform rejected the event ({status}): {body}")]
    Rejected {
        /// HTTP-like status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors raised by a connector's listen loop or while disconnecting.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    /// The session closed underneath the listen loop.
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// The dispatcher stopped accepting events.
    #[error("event sink closed")]
    SinkClosed,

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Any other connector failure.
    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Dispatch Errors
// =============================================================================

/// A skill action failed while handling an event.
#[derive(Debug, Error)]
pub enum DispatchActionError {
    /// The action returned an error.
    #[error("skill '{skill}' failed: {source}")]
    Failed {
        /// Skill name.
        skill: String,
        /// The error returned by the action.
        #[source]
        source: anyhow::Error,
    },

    /// The action panicked.
    #[error("skill '{skill}' panicked: {message}")]
    Panicked {
        /// Skill name.
        skill: String,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// The predicate panicked; the event counts as not matched.
    #[error("matcher of skill '{skill}' panicked: {message}")]
    MatcherPanicked {
        /// Skill name.
        skill: String,
        /// Panic payload, when it was a string.
        message: String,
    },
}

// =============================================================================
// Lifecycle Errors
// =============================================================================

/// An invalid lifecycle transition was requested.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The component was already loaded.
    #[error("already loaded")]
    AlreadyLoaded,

    /// The component must be loaded first.
    #[error("not loaded")]
    NotLoaded,

    /// The operation is only valid while stopped.
    #[error("{0} must be stopped first")]
    MustBeStopped(&'static str),

    /// The operation is only valid while running.
    #[error("{0} is not running")]
    NotRunning(&'static str),
}

// =============================================================================
// Event Errors
// =============================================================================

/// Invalid event construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// A file event needs its bytes or a URL.
    #[error("either file bytes or url must be specified")]
    MissingFileSource,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for connector sessions.
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Result type for outbound sends.
pub type SendResult<T> = Result<T, SendError>;

/// Result type for listen loops and disconnects.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
