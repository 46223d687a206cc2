//! In-memory log capture for assertions on emitted records.
//!
//! ```rust,ignore
//! let logs = LogCapture::new();
//! let _guard = logs.set_default();
//!
//! droid.start().await?;
//! assert!(logs.contains("authentication failed"));
//! assert_eq!(logs.last().unwrap().level, Level::ERROR);
//! ```
//!
//! [`set_default`](LogCapture::set_default) scopes the subscriber to the
//! current thread, so tests using it should run on the current-thread
//! runtime (the `#[tokio::test]` default).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

/// One captured log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    /// Record level.
    pub level: Level,
    /// Record target, usually the module path.
    pub target: String,
    /// The rendered message.
    pub message: String,
    /// Every other field, rendered with `Display` where available.
    pub fields: BTreeMap<String, String>,
}

impl CapturedRecord {
    /// Renders the record as `message key=value ...`.
    pub fn rendered(&self) -> String {
        let mut out = self.message.clone();
        for (key, value) in &self.fields {
            out.push_str(&format!(" {key}={value}"));
        }
        out
    }

    /// Returns true if the message or any field contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.rendered().contains(needle)
    }
}

/// A [`Layer`] that stores every record it sees.
#[derive(Clone)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<CapturedRecord>>>,
    max_level: Level,
}

impl LogCapture {
    /// Captures records of every level.
    pub fn new() -> Self {
        Self::with_level(Level::TRACE)
    }

    /// Captures records at `max_level` or more severe.
    pub fn with_level(max_level: Level) -> Self {
        Self {
            records: Arc::new(Mutex::new(Vec::new())),
            max_level,
        }
    }

    /// Installs this capture as the default subscriber for the current
    /// thread until the guard drops.
    pub fn set_default(&self) -> DefaultGuard {
        tracing::subscriber::set_default(Registry::default().with(self.clone()))
    }

    /// Returns every captured record in emission order.
    pub fn records(&self) -> Vec<CapturedRecord> {
        self.records.lock().clone()
    }

    /// Returns the most recent record.
    pub fn last(&self) -> Option<CapturedRecord> {
        self.records.lock().last().cloned()
    }

    /// Returns the records at exactly `level`.
    pub fn at_level(&self, level: Level) -> Vec<CapturedRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.level == level)
            .cloned()
            .collect()
    }

    /// Returns true if any record contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.records.lock().iter().any(|r| r.contains(needle))
    }

    /// Drops every captured record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl Default for LogCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LogCapture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogCapture")
            .field("records", &self.records.lock().len())
            .field("max_level", &self.max_level)
            .finish()
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > self.max_level {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.records.lock().push(CapturedRecord {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: BTreeMap<String, String>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, error, info};

    #[test]
    fn test_records_message_and_fields() {
        let logs = LogCapture::new();
        let _guard = logs.set_default();

        let reason = "bad token";
        info!(connector = "mock", "Connector connected");
        error!(connector = "mock", error = %reason, "Connector failed to connect: {reason}");

        let records = logs.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "Connector connected");
        assert_eq!(records[0].fields["connector"], "mock");

        let last = logs.last().unwrap();
        assert_eq!(last.level, Level::ERROR);
        assert_eq!(last.fields["error"], "bad token");
        assert!(last.contains("failed to connect: bad token"));
        assert_eq!(logs.at_level(Level::ERROR).len(), 1);
    }

    #[test]
    fn test_level_filter() {
        let logs = LogCapture::with_level(Level::INFO);
        let _guard = logs.set_default();

        debug!("hidden");
        info!("shown");

        assert_eq!(logs.records().len(), 1);
        assert!(!logs.contains("hidden"));
        logs.clear();
        assert!(logs.last().is_none());
    }
}
