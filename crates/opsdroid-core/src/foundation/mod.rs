//! Foundation layer - Core abstractions and type system.
//!
//! This module contains the fundamental building blocks of opsdroid:
//! - Immutable normalized events
//! - The error taxonomy shared by every crate
//! - Dispatch statistics

pub mod error;
pub mod event;
pub mod stats;

pub use error::{
    ConnectError, ConnectResult, ConnectorError, ConnectorResult, DispatchActionError,
    EventError, SendError, SendResult, StateError,
};
pub use event::{Event, EventBuilder, EventKind, FileContent, SharedEvent};
pub use stats::{DispatchStats, StatsSnapshot};
