//! Polling REST connector.
//!
//! Talks to a Slack-style web API:
//!
//! | Call | Use |
//! |------|-----|
//! | `GET auth.test` | validates the token, returns the bot's own `user_id` |
//! | `GET messages.poll?cursor=..` | returns new `messages` and the next `cursor` |
//! | `POST chat.postMessage` | sends a message (form: `channel`, `text`) |
//! | `POST reactions.add` | reacts to a message (form: `channel`, `name`, `timestamp`) |
//!
//! Every response body carries `"ok": true|false` and an `error` code on
//! failure.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use opsdroid_core::prelude::*;
use opsdroid_transport::{ApiClient, ApiResponse};
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::RestConfig;

/// How many emitted messages are remembered for reactions.
const REMEMBERED_MESSAGES: usize = 256;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlatformMessage {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    text: String,
}

/// A connector that polls a REST API for new messages.
pub struct RestConnector {
    name: String,
    config: RestConfig,
    client: ApiClient,
    bot_user: RwLock<Option<String>>,
    cursor: Mutex<Option<String>>,
    /// Event id to platform timestamp, newest last.
    recent: Mutex<VecDeque<(Uuid, String)>>,
}

impl RestConnector {
    /// Creates a connector named `name`.
    pub fn new(name: impl Into<String>, config: RestConfig) -> anyhow::Result<Self> {
        anyhow::ensure!(!config.api_url.is_empty(), "api_url is required");

        let mut client = ApiClient::new(&config.api_url, Duration::from_millis(config.timeout_ms))?;
        if let Some(token) = &config.token {
            client = client.with_token(token);
        }

        Ok(Self {
            name: name.into(),
            config,
            client,
            bot_user: RwLock::new(None),
            cursor: Mutex::new(None),
            recent: Mutex::new(VecDeque::with_capacity(REMEMBERED_MESSAGES)),
        })
    }

    /// Returns the bot's own user id, once connected.
    pub fn bot_user(&self) -> Option<String> {
        self.bot_user.read().clone()
    }

    async fn poll(&self) -> Result<Vec<(Value, PlatformMessage)>, ConnectorError> {
        let cursor = self.cursor.lock().clone();
        let query: Vec<(&str, &str)> = cursor.iter().map(|c| ("cursor", c.as_str())).collect();

        let response = self
            .client
            .get("messages.poll", &query)
            .await
            .map_err(|e| ConnectorError::Transport(e.to_string()))?;
        if !response.is_success() {
            return Err(ConnectorError::Transport(format!(
                "messages.poll returned HTTP {}",
                response.status
            )));
        }

        let body: PollResponse = serde_json::from_str(&response.body)
            .map_err(|e| ConnectorError::Other(format!("invalid messages.poll response: {e}")))?;
        if !body.ok {
            return Err(ConnectorError::Other(
                body.error.unwrap_or_else(|| "messages.poll failed".to_string()),
            ));
        }
        if body.cursor.is_some() {
            *self.cursor.lock() = body.cursor;
        }

        Ok(body
            .messages
            .into_iter()
            .filter_map(|raw| match serde_json::from_value::<PlatformMessage>(raw.clone()) {
                Ok(message) => Some((raw, message)),
                Err(e) => {
                    debug!(connector = %self.name, error = %e, "Skipping malformed message");
                    None
                }
            })
            .collect())
    }

    fn remember(&self, id: Uuid, ts: String) {
        let mut recent = self.recent.lock();
        if recent.len() == REMEMBERED_MESSAGES {
            recent.pop_front();
        }
        recent.push_back((id, ts));
    }

    fn platform_ts(&self, id: Uuid) -> Option<String> {
        self.recent
            .lock()
            .iter()
            .rev()
            .find(|(event, _)| *event == id)
            .map(|(_, ts)| ts.clone())
    }
}

#[async_trait]
impl Connector for RestConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_target(&self) -> Option<&str> {
        self.config.default_target.as_deref()
    }

    async fn connect(&self, _ctx: &ConnectorContext) -> ConnectResult<()> {
        let response = self
            .client
            .get("auth.test", &[])
            .await
            .map_err(|e| ConnectError::transport(e.to_string()))?;

        if matches!(response.status, 401 | 403) {
            return Err(ConnectError::authentication(
                format!("HTTP {}", response.status),
                response.body,
            ));
        }
        if !response.is_success() {
            return Err(ConnectError::transport(format!(
                "auth.test returned HTTP {}",
                response.status
            )));
        }

        let auth: AuthResponse = serde_json::from_str(&response.body)
            .map_err(|e| ConnectError::transport(format!("invalid auth.test response: {e}")))?;
        if !auth.ok {
            let message = auth.error.unwrap_or_else(|| "unknown_error".to_string());
            return Err(ConnectError::authentication(message, response.body));
        }

        info!(
            connector = %self.name,
            user = auth.user_id.as_deref().unwrap_or("-"),
            "Authenticated"
        );
        *self.bot_user.write() = auth.user_id;
        Ok(())
    }

    async fn listen(&self, sink: EventSink, shutdown: CancellationToken) -> ConnectorResult<()> {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                () = shutdown.cancelled() => return Ok(()),
                polled = self.poll() => polled,
            };
            let messages = match polled {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(connector = %self.name, error = %e, "Poll failed, retrying on next interval");
                    continue;
                }
            };

            let own = self.bot_user();
            for (raw, message) in messages {
                if own.is_some() && message.user == own {
                    trace!(connector = %self.name, "Skipping own message");
                    continue;
                }

                let mut event = Event::message(message.text).raw(raw);
                if let Some(user) = message.user {
                    event = event.user(user);
                }
                if let Some(channel) = message.channel {
                    event = event.target(channel);
                }
                let event = event.build();
                if let Some(ts) = message.ts {
                    self.remember(event.id(), ts);
                }
                sink.emit(event).await?;
            }
        }
    }

    async fn deliver(&self, event: &Event) -> SendResult<()> {
        let target = event.target().ok_or(SendError::NoTarget)?;

        let response = match event.kind() {
            EventKind::Message { text } => {
                self.client
                    .post_form(
                        "chat.postMessage",
                        &[("channel", target), ("text", text.as_str()), ("as_user", "true")],
                    )
                    .await
            }
            EventKind::Reaction { emoji } => {
                let ts = event
                    .linked_event()
                    .and_then(|id| self.platform_ts(id))
                    .ok_or_else(|| {
                        SendError::Transport("reaction is not linked to a known message".to_string())
                    })?;
                self.client
                    .post_form(
                        "reactions.add",
                        &[
                            ("channel", target),
                            ("name", emoji.trim_matches(':')),
                            ("timestamp", ts.as_str()),
                        ],
                    )
                    .await
            }
            _ => return Err(unsupported(self, event)),
        }
        .map_err(|e| SendError::Transport(e.to_string()))?;

        check_response(response)
    }
}

impl ConfigurableConnector for RestConnector {
    type Config = RestConfig;

    fn module() -> &'static str {
        "rest"
    }

    fn from_config(name: &str, config: RestConfig) -> anyhow::Result<Arc<Self>> {
        Ok(Arc::new(Self::new(name, config)?))
    }
}

/// Maps a non-2xx status or an `"ok": false` body to [`SendError::Rejected`].
fn check_response(response: ApiResponse) -> SendResult<()> {
    let ok = response.is_success()
        && response
            .json()
            .map(|body| body.get("ok").and_then(Value::as_bool).unwrap_or(true))
            .unwrap_or(true);

    if ok {
        Ok(())
    } else {
        Err(SendError::Rejected {
            status: response.status,
            body: response.body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_url: &str) -> RestConfig {
        RestConfig {
            api_url: api_url.to_string(),
            default_target: Some("#general".into()),
            timeout_ms: 500,
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_api_url() {
        assert!(RestConnector::new("ops", RestConfig::default()).is_err());
    }

    #[test]
    fn test_check_response() {
        let ok = ApiResponse {
            status: 200,
            body: r#"{"ok":true}"#.into(),
        };
        assert!(check_response(ok).is_ok());

        let refused = ApiResponse {
            status: 200,
            body: r#"{"ok":false,"error":"channel_not_found"}"#.into(),
        };
        assert!(matches!(
            check_response(refused),
            Err(SendError::Rejected { status: 200, ref body }) if body.contains("channel_not_found")
        ));

        let failed = ApiResponse {
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(matches!(check_response(failed), Err(SendError::Rejected { status: 502, .. })));
    }

    #[test]
    fn test_remembers_recent_messages() {
        let connector = RestConnector::new("ops", config("http://127.0.0.1:1")).unwrap();
        let first = Uuid::new_v4();
        connector.remember(first, "1.0".into());
        for i in 0..REMEMBERED_MESSAGES {
            connector.remember(Uuid::new_v4(), format!("{i}"));
        }
        assert_eq!(connector.platform_ts(first), None);
        assert_eq!(connector.recent.lock().len(), REMEMBERED_MESSAGES);
    }

    #[tokio::test]
    async fn test_unreachable_api_is_a_transport_error() {
        let connector = RestConnector::new("ops", config("http://127.0.0.1:1/api")).unwrap();
        let err = connector.connect(&ConnectorContext::new()).await.unwrap_err();
        assert!(matches!(err, ConnectError::Transport(_)));
    }

    #[tokio::test]
    async fn test_reaction_needs_known_message() {
        let connector = RestConnector::new("ops", config("http://127.0.0.1:1/api")).unwrap();
        let original = Event::message("hi").target("#general").build();
        let reaction = original
            .reply(EventKind::Reaction {
                emoji: ":tada:".into(),
            })
            .build();

        assert!(matches!(
            connector.deliver(&reaction).await,
            Err(SendError::Transport(ref reason)) if reason.contains("not linked")
        ));
        assert!(matches!(
            connector.deliver(&Event::image(None, Some("http://x/y.png".into())).unwrap().target("#a").build()).await,
            Err(SendError::Unsupported { kind: "image", .. })
        ));
    }
}
