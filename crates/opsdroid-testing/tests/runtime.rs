//! End-to-end runtime behavior with the mock modules.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use opsdroid_core::matcher::{match_always, match_text};
use opsdroid_core::{ConnectorState, Event, Matcher, Skill, SkillContext, StateError};
use opsdroid_runtime::{ModuleConfig, OpsDroid, RuntimeError, RuntimeState};
use opsdroid_testing::{
    HarnessError, LogCapture, MockConnector, call_endpoint, running_opsdroid, test_config,
    test_modules, test_runtime, wait_for_connectors,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio_test::{assert_err, assert_ok};
use tracing::Level;

const WAIT: Duration = Duration::from_secs(5);

async fn fail(_ctx: SkillContext) -> anyhow::Result<()> {
    anyhow::bail!("skill exploded")
}

/// A skill that records every text it runs for.
fn recording_skill(name: &str, seen: Arc<Mutex<Vec<String>>>) -> Skill {
    Skill::new(name, match_always(), move |ctx: SkillContext| {
        let seen = Arc::clone(&seen);
        async move {
            seen.lock().push(ctx.text().unwrap_or_default().to_string());
            Ok(())
        }
    })
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
async fn test_hello_round_trip() {
    let connector = Arc::new(MockConnector::new("chat"));
    let droid = test_runtime();
    droid.add_connector(connector.clone()).unwrap();
    droid.load(test_config()).unwrap();
    assert!(!droid.is_running());

    running_opsdroid(&droid, async {
        assert!(droid.is_running());
        wait_for_connectors(&droid, WAIT).await.unwrap();

        connector.say("alice", "#general", "hi");
        assert!(connector.wait_for_sent(1, WAIT).await);
    })
    .await
    .unwrap();

    let sent = connector.sent();
    assert_eq!(sent[0].text(), Some("hello"));
    assert_eq!(sent[0].target(), Some("#general"));
    assert_eq!(sent[0].connector(), Some("chat"));
    assert_eq!(droid.stats().snapshot().total_responses, 1);
}

#[tokio::test]
async fn test_every_matching_skill_runs_despite_failures() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let droid = test_runtime();
    droid.add_skill(Skill::new("broken", match_text("deploy"), fail)).unwrap();
    droid.add_skill(recording_skill("first", seen.clone())).unwrap();
    droid.add_skill(recording_skill("second", seen.clone())).unwrap();
    droid.load(test_config()).unwrap();

    let logs = LogCapture::new();
    let _guard = logs.set_default();

    assert_eq!(droid.parse(Event::message("deploy").build()).unwrap(), 3);
    assert!(wait_until(|| seen.lock().len() == 2).await);
    assert!(wait_until(|| droid.stats().snapshot().actions_failed == 1).await);

    let failure = logs
        .at_level(Level::ERROR)
        .into_iter()
        .find(|r| r.fields.get("skill").map(String::as_str) == Some("broken"))
        .unwrap();
    assert!(failure.contains("skill exploded"));

    droid.unload().await.unwrap();
}

#[tokio::test]
async fn test_events_from_one_connector_keep_their_order() {
    let evaluated = Arc::new(Mutex::new(Vec::new()));
    let connector = Arc::new(MockConnector::new("ordered"));

    let droid = OpsDroid::new(test_modules());
    droid.add_connector(connector.clone()).unwrap();
    droid
        .add_skill(Skill::new(
            "observer",
            Matcher::new("records evaluation order", {
                let evaluated = Arc::clone(&evaluated);
                move |event: &Event| {
                    evaluated.lock().push(event.text().unwrap_or_default().to_string());
                    false
                }
            }),
            fail,
        ))
        .unwrap();

    let mut config = test_config();
    config.connectors.clear();
    droid.load(config).unwrap();

    running_opsdroid(&droid, async {
        for text in ["a", "b", "c", "d"] {
            connector.say("alice", "#ops", text);
        }
        assert!(wait_until(|| evaluated.lock().len() == 4).await);
    })
    .await
    .unwrap();

    assert_eq!(*evaluated.lock(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn test_auth_failure_is_isolated_and_logged() {
    let healthy = Arc::new(MockConnector::new("healthy"));
    let droid = test_runtime();
    droid.add_connector(healthy.clone()).unwrap();
    droid
        .add_connector(Arc::new(MockConnector::new("broken").failing_auth("error", "response")))
        .unwrap();

    let mut config = test_config();
    config.connectors.clear();
    droid.load(config).unwrap();

    let logs = LogCapture::with_level(Level::INFO);
    let _guard = logs.set_default();

    running_opsdroid(&droid, async {
        let states = wait_for_connectors(&droid, WAIT).await.unwrap();
        assert_eq!(
            states,
            vec![
                ("healthy".to_string(), ConnectorState::Connected),
                ("broken".to_string(), ConnectorState::Error),
            ]
        );

        // The healthy connector connects first, so the failure is the last
        // record of the whole start-up.
        let last = logs.last().unwrap();
        assert_eq!(last.level, Level::ERROR);
        assert_eq!(last.fields["connector"], "broken");
        assert!(last.message.contains("error"));
        assert!(last.message.contains("response"));

        // The healthy connector keeps serving.
        assert!(droid.is_running());
        healthy.say("alice", "#general", "hello");
        assert!(healthy.wait_for_sent(1, WAIT).await);
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_stop_releases_sessions_and_is_idempotent() {
    let connector = Arc::new(MockConnector::new("chat"));
    let droid = test_runtime();
    droid.add_connector(connector.clone()).unwrap();
    droid.load(test_config()).unwrap();

    droid.start().await.unwrap();
    droid.start().await.unwrap();
    wait_for_connectors(&droid, WAIT).await.unwrap();
    assert_eq!(connector.connects(), 1);

    assert_ok!(droid.stop().await);
    assert!(!droid.is_running());
    assert_eq!(droid.state(), RuntimeState::Stopped);
    assert_eq!(connector.disconnects(), 1);
    assert_eq!(droid.connector_state("chat"), Some(ConnectorState::Disconnected));
    assert_eq!(droid.connector_state("mock"), Some(ConnectorState::Disconnected));

    assert_ok!(droid.stop().await);
    assert_eq!(connector.disconnects(), 1);

    // A stopped runtime can start again.
    droid.start().await.unwrap();
    wait_for_connectors(&droid, WAIT).await.unwrap();
    assert_eq!(connector.connects(), 2);
    droid.unload().await.unwrap();
    assert_eq!(connector.disconnects(), 2);
    assert_eq!(droid.state(), RuntimeState::Unloaded);
}

#[tokio::test]
async fn test_lifecycle_violations() {
    let droid = test_runtime();
    let err = assert_err!(droid.start().await);
    assert!(matches!(err, RuntimeError::State(StateError::NotLoaded)));

    droid.load(test_config()).unwrap();
    let err = assert_err!(droid.load(test_config()));
    assert!(matches!(err, RuntimeError::State(StateError::AlreadyLoaded)));
    assert!(droid.add_skill(Skill::new("late", match_always(), fail)).is_err());

    droid.unload().await.unwrap();
    assert!(matches!(
        droid.unload().await,
        Err(RuntimeError::State(StateError::NotLoaded))
    ));
}

#[tokio::test]
async fn test_with_loaded_unloads_after_panic() {
    let connector = Arc::new(MockConnector::new("chat"));
    let droid = test_runtime();
    droid.add_connector(connector.clone()).unwrap();

    let outcome = AssertUnwindSafe(droid.with_loaded(test_config(), async {
        droid.start().await.unwrap();
        wait_for_connectors(&droid, WAIT).await.unwrap();
        if droid.is_running() {
            panic!("test body failed");
        }
    }))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(droid.state(), RuntimeState::Unloaded);
    assert_eq!(connector.connects(), 1);
    assert_eq!(connector.disconnects(), 1);
}

#[tokio::test]
async fn test_web_endpoints() {
    let droid = test_runtime();
    droid.load(test_config()).unwrap();

    running_opsdroid(&droid, async {
        let index = call_endpoint(&droid, "/", "GET", None).await.unwrap();
        assert_eq!(index.status, 200);

        droid.parse(Event::message("hello").build()).unwrap();
        let stats = call_endpoint(&droid, "/stats", "GET", None).await.unwrap();
        assert_eq!(stats.status, 200);
        let body = stats.json().unwrap();
        assert_eq!(body["messages"]["messages_parsed"], 1);
        assert_eq!(body["modules"]["connectors"], 1);
        assert_eq!(body["modules"]["skills"], 1);

        let not_allowed = call_endpoint(&droid, "/stats", "POST", Some(&json!({})))
            .await
            .unwrap();
        assert_eq!(not_allowed.status, 405);

        assert!(matches!(
            call_endpoint(&droid, "/stats", "POST", None).await,
            Err(HarnessError::MissingData { .. })
        ));
        assert!(matches!(
            call_endpoint(&droid, "/stats", "PUT", None).await,
            Err(HarnessError::UnsupportedMethod(_))
        ));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_configured_modules_load_in_key_order() {
    let droid = test_runtime();
    let config = test_config()
        .with_skill("a_ping", ModuleConfig::new("ping"))
        .with_skill("z_echo", ModuleConfig::new("echo").set("prefix", "say "));
    droid.load(config).unwrap();

    assert_eq!(droid.skill_names(), vec!["a_ping", "hello", "z_echo"]);
    assert!(droid.connector("mock").is_some());
    droid.unload().await.unwrap();
}
