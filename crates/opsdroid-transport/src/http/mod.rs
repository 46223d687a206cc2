//! HTTP transports.
//!
//! This module provides the HTTP server and client implementations.

#[cfg(feature = "http-client")]
mod client;
#[cfg(feature = "http-client")]
pub use client::{ApiClient, ApiResponse};

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{StatsProvider, WebServer};
