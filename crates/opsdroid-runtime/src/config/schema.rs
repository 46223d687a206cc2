//! Configuration schema definitions.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use opsdroid_core::DispatcherConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Root configuration structure.
///
/// ```toml
/// [web]
/// port = 8080
///
/// [connectors.ops]
/// module = "rest"
/// api_url = "https://chat.example.com/api"
/// token = "xoxb-..."
///
/// [skills.ping]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OpsDroidConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Web server settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Dispatcher tuning.
    #[serde(default)]
    pub dispatcher: DispatcherSettings,

    /// Connector entries, keyed by connector name.
    #[serde(default)]
    pub connectors: BTreeMap<String, ModuleConfig>,

    /// Skill entries, keyed by skill name.
    #[serde(default)]
    pub skills: BTreeMap<String, ModuleConfig>,
}

impl OpsDroidConfig {
    /// Adds a connector entry.
    pub fn with_connector(mut self, name: impl Into<String>, entry: ModuleConfig) -> Self {
        self.connectors.insert(name.into(), entry);
        self
    }

    /// Adds a skill entry.
    pub fn with_skill(mut self, name: impl Into<String>, entry: ModuleConfig) -> Self {
        self.skills.insert(name.into(), entry);
        self
    }
}

// =============================================================================
// Modules
// =============================================================================

/// One `connectors.<name>` or `skills.<name>` entry.
///
/// `module` selects the registered implementation; an empty module means the
/// entry name itself. Every other key is handed to the module as its settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// The module key, defaulting to the entry name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub module: String,

    /// Module-specific settings.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl ModuleConfig {
    /// Creates an entry for `module` with no settings.
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            settings: Map::new(),
        }
    }

    /// Adds one setting.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Resolves the module key for an entry called `name`.
    pub fn module_or<'a>(&'a self, name: &'a str) -> &'a str {
        if self.module.is_empty() {
            name
        } else {
            &self.module
        }
    }
}

// =============================================================================
// Web
// =============================================================================

/// Web server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Whether to serve HTTP at all.
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,

    /// Bind host.
    #[serde(default = "default_web_host")]
    pub host: String,

    /// Bind port; `0` picks an ephemeral port.
    #[serde(default = "default_web_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            host: default_web_host(),
            port: default_web_port(),
        }
    }
}

impl WebConfig {
    /// Returns `host:port`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_web_enabled() -> bool {
    true
}

fn default_web_host() -> String {
    "127.0.0.1".to_string()
}

fn default_web_port() -> u16 {
    8080
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    /// How long `stop` waits for listen loops and in-flight skills.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Capacity of the shared event channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl DispatcherSettings {
    /// Converts to the core dispatcher config.
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            grace_period: Duration::from_millis(self.grace_period_ms),
            channel_capacity: self.channel_capacity,
        }
    }
}

fn default_grace_period_ms() -> u64 {
    5000
}

fn default_channel_capacity() -> usize {
    256
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the lowercase level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `Full` otherwise.
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events get logged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Global level.
    #[serde(default)]
    pub level: LogLevel,

    /// Line format.
    #[serde(default)]
    pub format: LogFormat,

    /// Destination.
    #[serde(default)]
    pub output: LogOutput,

    /// Log file, for `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    /// Maximum log file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Number of rotated files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: u32,

    /// Per-target levels, e.g. `opsdroid_core = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,

    /// Span lifecycle events.
    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line.
    #[serde(default)]
    pub file_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file_path: None,
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            filters: HashMap::new(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
        }
    }
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_max_files() -> u32 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_module_entry_settings_are_flattened() {
        let entry: ModuleConfig = serde_json::from_value(json!({
            "module": "rest",
            "token": "secret",
            "poll_interval_ms": 250,
        }))
        .unwrap();

        assert_eq!(entry.module_or("ops"), "rest");
        assert_eq!(entry.settings["token"], "secret");
        assert!(!entry.settings.contains_key("module"));

        let bare: ModuleConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(bare.module_or("ping"), "ping");
    }

    #[test]
    fn test_defaults() {
        let config: OpsDroidConfig = serde_json::from_value(json!({})).unwrap();
        assert!(config.web.enabled);
        assert_eq!(config.web.bind_addr(), "127.0.0.1:8080");
        assert_eq!(
            config.dispatcher.to_dispatcher_config().grace_period,
            Duration::from_millis(5000)
        );
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.connectors.is_empty());
    }

    #[test]
    fn test_log_level_names() {
        let level: LogLevel = serde_json::from_value(json!("debug")).unwrap();
        assert_eq!(level.to_tracing_level(), tracing::Level::DEBUG);
        assert!(serde_json::from_value::<LogLevel>(json!("loud")).is_err());
    }
}
