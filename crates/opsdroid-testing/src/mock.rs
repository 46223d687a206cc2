//! Mock modules: the `mock` connector and the `hello` skill.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use opsdroid_core::matcher::match_text;
use opsdroid_core::prelude::*;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::{Notify, mpsc};
use tracing::debug;

// ============================================================================
// Mock Connector
// ============================================================================

/// A simulated authentication failure.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthFailure {
    /// The message the platform reports.
    pub message: String,
    /// The raw platform response.
    pub response: String,
}

/// Settings of the `mock` connector.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Target used when a reply names none.
    pub default_target: Option<String>,
    /// Makes every `connect` fail with an authentication error.
    pub auth_failure: Option<AuthFailure>,
}

/// An in-memory connector.
///
/// Events passed to [`inject`](Self::inject) are emitted by the listen loop
/// in order; everything the connector is asked to send is recorded.
pub struct MockConnector {
    name: String,
    config: MockConfig,
    tx: mpsc::UnboundedSender<Event>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Event>>,
    sent: Mutex<Vec<Event>>,
    sent_notify: Notify,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockConnector {
    /// Creates a connector named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, MockConfig::default())
    }

    /// Creates a connector from its settings.
    pub fn with_config(name: impl Into<String>, config: MockConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            config,
            tx,
            rx: tokio::sync::Mutex::new(rx),
            sent: Mutex::new(Vec::new()),
            sent_notify: Notify::new(),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Makes every `connect` fail with an authentication error.
    pub fn failing_auth(mut self, message: impl Into<String>, response: impl Into<String>) -> Self {
        self.config.auth_failure = Some(AuthFailure {
            message: message.into(),
            response: response.into(),
        });
        self
    }

    /// Sets the default target.
    pub fn default_target_to(mut self, target: impl Into<String>) -> Self {
        self.config.default_target = Some(target.into());
        self
    }

    /// Queues an event for the listen loop.
    pub fn inject(&self, event: Event) {
        // The receiver lives as long as `self`.
        let _ = self.tx.send(event);
    }

    /// Queues a message from `user` in `target`.
    pub fn say(&self, user: &str, target: &str, text: &str) {
        self.inject(Event::message(text).user(user).target(target).build());
    }

    /// Returns every event sent through this connector.
    pub fn sent(&self) -> Vec<Event> {
        self.sent.lock().clone()
    }

    /// Returns the texts of every message sent through this connector.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|e| e.text().map(str::to_string))
            .collect()
    }

    /// Waits until at least `count` events were sent or `timeout` elapses.
    /// Returns true if the count was reached.
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            loop {
                let notified = self.sent_notify.notified();
                if self.sent.lock().len() >= count {
                    return;
                }
                notified.await;
            }
        })
        .await
        .is_ok()
    }

    /// Returns how many times `connect` was called.
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Returns how many times `disconnect` was called.
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockConnector")
            .field("name", &self.name)
            .field("sent", &self.sent.lock().len())
            .finish()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_target(&self) -> Option<&str> {
        self.config.default_target.as_deref()
    }

    async fn connect(&self, _ctx: &ConnectorContext) -> ConnectResult<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        match &self.config.auth_failure {
            Some(failure) => Err(ConnectError::authentication(
                &failure.message,
                &failure.response,
            )),
            None => Ok(()),
        }
    }

    async fn listen(&self, sink: EventSink, shutdown: CancellationToken) -> ConnectorResult<()> {
        let mut rx = self.rx.lock().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return Ok(()),
                event = rx.recv() => match event {
                    Some(event) => sink.emit(event).await?,
                    None => return Err(ConnectorError::SessionClosed(self.name.clone())),
                },
            }
        }
    }

    async fn disconnect(&self) -> ConnectorResult<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deliver(&self, event: &Event) -> SendResult<()> {
        match event.kind() {
            EventKind::Message { .. } | EventKind::Reaction { .. } => {
                debug!(connector = %self.name, kind = event.kind().name(), "Mock connector sent event");
                self.sent.lock().push(event.clone());
                self.sent_notify.notify_waiters();
                Ok(())
            }
            _ => Err(unsupported(self, event)),
        }
    }
}

impl ConfigurableConnector for MockConnector {
    type Config = MockConfig;

    fn module() -> &'static str {
        "mock"
    }

    fn from_config(name: &str, config: MockConfig) -> anyhow::Result<Arc<Self>> {
        Ok(Arc::new(Self::with_config(name, config)))
    }
}

// ============================================================================
// Hello Skill
// ============================================================================

/// Settings of the `hello` module.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HelloConfig {}

/// Replies `hello` to `hello` or `hi`.
pub struct HelloSkill;

async fn hello(ctx: SkillContext) -> anyhow::Result<()> {
    ctx.respond("hello").await?;
    Ok(())
}

impl ConfigurableSkill for HelloSkill {
    type Config = HelloConfig;

    fn module() -> &'static str {
        "hello"
    }

    fn build(name: &str, _config: HelloConfig) -> anyhow::Result<Vec<Skill>> {
        let matcher = match_text("hello").or(match_text("hi"));
        Ok(vec![Skill::new(name, matcher, hello)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_injected_events_are_emitted_in_order() {
        let connector = Arc::new(MockConnector::new("mock"));
        connector.say("alice", "#ops", "a");
        connector.say("alice", "#ops", "b");

        let (tx, mut rx) = mpsc::channel(4);
        let shutdown = CancellationToken::new();
        let listen = tokio::spawn({
            let connector = Arc::clone(&connector);
            let shutdown = shutdown.clone();
            async move { connector.listen(EventSink::new("mock", tx), shutdown).await }
        });

        assert_eq!(rx.recv().await.unwrap().text(), Some("a"));
        let b = rx.recv().await.unwrap();
        assert_eq!(b.text(), Some("b"));
        assert_eq!(b.connector(), Some("mock"));

        shutdown.cancel();
        assert_ok!(listen.await.unwrap());
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let connector = MockConnector::new("mock").failing_auth("error", "response");
        let err = connector.connect(&ConnectorContext::new()).await.unwrap_err();
        assert!(err.is_authentication());
        assert!(err.to_string().contains("error"));
        assert!(err.to_string().contains("response"));
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_deliver_records_and_wakes() {
        let connector = MockConnector::new("mock").default_target_to("#general");
        assert!(!connector.wait_for_sent(1, Duration::from_millis(10)).await);

        connector.send(&Event::message("hi").build(), None).await.unwrap();
        assert!(connector.wait_for_sent(1, Duration::from_millis(10)).await);
        assert_eq!(connector.sent_texts(), vec!["hi".to_string()]);
        assert_eq!(connector.sent()[0].target(), Some("#general"));
    }
}
