//! The HTTP connectors inside a running runtime, against the mock API.

use std::time::Duration;

use opsdroid_connector_http::{RestConnector, WebhookConnector};
use opsdroid_core::ConnectorState;
use opsdroid_runtime::{ModuleConfig, OpsDroid, OpsDroidConfig, RuntimeState};
use opsdroid_testing::{
    ExternalApiMockServer, LogCapture, call_endpoint, running_opsdroid, test_config, test_modules,
    wait_for_connectors,
};
use serde_json::{Value, json};
use tracing::Level;

const WAIT: Duration = Duration::from_secs(5);

fn runtime() -> OpsDroid {
    OpsDroid::new(
        test_modules()
            .with_connector::<RestConnector>()
            .with_connector::<WebhookConnector>(),
    )
}

fn config_with(name: &str, connector: ModuleConfig) -> OpsDroidConfig {
    let mut config = test_config().with_skill("ping", ModuleConfig::new("ping"));
    config.connectors.clear();
    config.with_connector(name, connector)
}

async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_rest_connector_polls_and_replies() {
    let mock_api = ExternalApiMockServer::new();
    mock_api
        .add_response("/auth.test", "GET", Some(json!({ "ok": true, "user_id": "B1" })), 200)
        .unwrap();
    mock_api
        .add_response(
            "/messages.poll",
            "GET",
            Some(json!({
                "ok": true,
                "cursor": "c1",
                "messages": [
                    { "ts": "1.0", "user": "U1", "channel": "C1", "text": "ping" },
                    { "ts": "2.0", "user": "B1", "channel": "C1", "text": "ping" },
                ],
            })),
            200,
        )
        .unwrap();
    mock_api
        .add_response("/chat.postMessage", "POST", Some(json!({ "ok": true })), 200)
        .unwrap();
    mock_api.start().await.unwrap();

    let droid = runtime();
    droid
        .load(config_with(
            "ops",
            ModuleConfig::new("rest")
                .set("api_url", mock_api.base_url())
                .set("token", "xoxb-test")
                .set("poll_interval_ms", 60_000),
        ))
        .unwrap();

    running_opsdroid(&droid, async {
        let states = wait_for_connectors(&droid, WAIT).await.unwrap();
        assert_eq!(states, vec![("ops".to_string(), ConnectorState::Connected)]);
        assert!(wait_until(|| mock_api.called("/chat.postMessage")).await);
    })
    .await
    .unwrap();
    mock_api.stop().await.unwrap();

    let auth = mock_api.get_request("/auth.test", 0).unwrap();
    assert_eq!(auth.header("authorization"), Some("Bearer xoxb-test"));
    assert_eq!(mock_api.call_count("/messages.poll"), 1);

    // The bot's own message is not answered.
    assert_eq!(mock_api.call_count("/chat.postMessage"), 1);
    let payload = mock_api.get_payload("/chat.postMessage", 0).unwrap();
    assert_eq!(payload["channel"], "C1");
    assert_eq!(payload["text"], "pong");
}

#[tokio::test]
async fn test_rest_connector_auth_failure() {
    let mock_api = ExternalApiMockServer::new();
    mock_api
        .add_response("/auth.test", "GET", Some(json!({ "ok": false, "error": "invalid_auth" })), 200)
        .unwrap();
    mock_api.start().await.unwrap();

    let droid = runtime();
    droid
        .load(config_with(
            "ops",
            ModuleConfig::new("rest").set("api_url", mock_api.base_url()),
        ))
        .unwrap();

    let logs = LogCapture::with_level(Level::WARN);
    let _guard = logs.set_default();

    running_opsdroid(&droid, async {
        let states = wait_for_connectors(&droid, WAIT).await.unwrap();
        assert_eq!(states, vec![("ops".to_string(), ConnectorState::Error)]);

        // Started, but with no listen loop left.
        assert_eq!(droid.state(), RuntimeState::Running);
        assert!(wait_until(|| !droid.is_running()).await);
    })
    .await
    .unwrap();
    mock_api.stop().await.unwrap();

    let record = logs.at_level(Level::ERROR).pop().unwrap();
    assert!(record.message.contains("invalid_auth"));
    assert_eq!(record.fields["connector"], "ops");
    assert!(!mock_api.called("/messages.poll"));
}

#[tokio::test]
async fn test_webhook_connector_through_web_server() {
    let mock_api = ExternalApiMockServer::new();
    mock_api
        .add_response("/incoming", "POST", Some(json!({ "ok": true })), 200)
        .unwrap();
    mock_api.start().await.unwrap();

    let droid = runtime();
    droid
        .load(config_with(
            "hooks",
            ModuleConfig::new("webhook").set("reply_url", format!("{}/incoming", mock_api.base_url())),
        ))
        .unwrap();

    running_opsdroid(&droid, async {
        wait_for_connectors(&droid, WAIT).await.unwrap();
        assert_eq!(
            droid.web().unwrap().routes(),
            vec!["/connector/hooks".to_string()]
        );

        let response = call_endpoint(
            &droid,
            "/connector/hooks",
            "POST",
            Some(&json!({ "user": "alice", "target": "#ops", "text": "ping" })),
        )
        .await
        .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.json().unwrap()["ok"], true);

        assert!(wait_until(|| mock_api.called("/incoming")).await);
    })
    .await
    .unwrap();
    mock_api.stop().await.unwrap();

    // Stopping releases the route.
    assert!(droid.web().unwrap().routes().is_empty());

    let reply: Value = mock_api.get_request("/incoming", 0).unwrap().json().unwrap();
    assert_eq!(reply["target"], "#ops");
    assert_eq!(reply["text"], "pong");
    assert!(reply["in_reply_to"].is_string());
}
