//! Configuration types for the HTTP connectors.
//!
//! ```toml
//! [connectors.ops]
//! module = "rest"
//! api_url = "https://chat.example.com/api"
//! token = "xoxb-..."
//! default_target = "#general"
//! poll_interval_ms = 1000
//!
//! [connectors.hooks]
//! module = "webhook"
//! path = "/connector/hooks"
//! reply_url = "https://chat.example.com/incoming"
//! ```

use serde::{Deserialize, Serialize};

/// Settings of the `rest` connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL of the platform API.
    #[serde(default)]
    pub api_url: String,

    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,

    /// Channel used when a reply names no target.
    #[serde(default)]
    pub default_target: Option<String>,

    /// Delay between two `messages.poll` calls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            token: None,
            default_target: None,
            poll_interval_ms: default_poll_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Settings of the `webhook` connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Route to register; defaults to `/connector/{name}`.
    #[serde(default)]
    pub path: Option<String>,

    /// Shared secret expected as `Authorization: Bearer <secret>`.
    #[serde(default)]
    pub secret: Option<String>,

    /// Where replies are posted as JSON. Without it the connector can only
    /// receive.
    #[serde(default)]
    pub reply_url: Option<String>,

    /// Target used when a reply names none.
    #[serde(default)]
    pub default_target: Option<String>,

    /// Per-request timeout for replies.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            path: None,
            secret: None,
            reply_url: None,
            default_target: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}
