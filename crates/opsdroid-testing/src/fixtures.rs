//! Runtime fixtures and helpers.

use std::future::Future;
use std::time::Duration;

use opsdroid_core::ConnectorState;
use opsdroid_runtime::{ModuleConfig, ModuleRegistry, OpsDroid, OpsDroidConfig, RuntimeResult};
use opsdroid_transport::{ApiClient, ApiResponse};
use serde_json::Value;

use crate::error::{HarnessError, HarnessResult};
use crate::mock::{HelloSkill, MockConnector};

/// `connectors.mock = { module = "mock" }` and
/// `skills.hello = { module = "hello" }`.
pub fn minimal_config() -> OpsDroidConfig {
    OpsDroidConfig::default()
        .with_connector("mock", ModuleConfig::new("mock"))
        .with_skill("hello", ModuleConfig::new("hello"))
}

/// [`minimal_config`] with the web server on an ephemeral port.
pub fn test_config() -> OpsDroidConfig {
    let mut config = minimal_config();
    config.web.port = 0;
    config
}

/// The built-in modules plus `mock` and `hello`.
pub fn test_modules() -> ModuleRegistry {
    ModuleRegistry::new()
        .with_builtin_skills()
        .with_connector::<MockConnector>()
        .with_skill::<HelloSkill>()
}

/// An unloaded runtime that can load [`test_modules`].
pub fn test_runtime() -> OpsDroid {
    OpsDroid::new(test_modules())
}

/// Starts `droid`, runs `body` and stops it again.
///
/// `droid` is stopped even when `body` panics; the panic is resumed
/// afterwards.
pub async fn running_opsdroid<Fut, T>(droid: &OpsDroid, body: Fut) -> RuntimeResult<T>
where
    Fut: Future<Output = T>,
{
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;

    droid.start().await?;
    let outcome = AssertUnwindSafe(body).catch_unwind().await;
    let stopped = droid.stop().await;

    match outcome {
        Ok(value) => stopped.map(|()| value),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// Calls an endpoint of the running runtime's web server.
///
/// `POST` sends `data` as JSON and fails with
/// [`HarnessError::MissingData`] without it. Other methods than `GET` and
/// `POST` fail with [`HarnessError::UnsupportedMethod`].
pub async fn call_endpoint(
    droid: &OpsDroid,
    endpoint: &str,
    method: &str,
    data: Option<&Value>,
) -> HarnessResult<ApiResponse> {
    let base_url = droid.web_base_url().ok_or(HarnessError::NotServing)?;
    let client = ApiClient::new(base_url, Duration::from_secs(10))?;

    match method.to_ascii_uppercase().as_str() {
        "GET" => Ok(client.get(endpoint, &[]).await?),
        "POST" => {
            let data = data.ok_or_else(|| HarnessError::MissingData {
                method: "POST".to_string(),
            })?;
            Ok(client.post_json(endpoint, data).await?)
        }
        _ => Err(HarnessError::UnsupportedMethod(method.to_string())),
    }
}

/// Waits until every connector finished connecting, successfully or not.
///
/// Returns the final states, or `None` if `timeout` elapsed first.
pub async fn wait_for_connectors(
    droid: &OpsDroid,
    timeout: Duration,
) -> Option<Vec<(String, ConnectorState)>> {
    tokio::time::timeout(timeout, async {
        loop {
            let states = droid.connector_states();
            let settled = states
                .iter()
                .all(|(_, state)| matches!(state, ConnectorState::Connected | ConnectorState::Error));
            if settled {
                return states;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_shape() {
        let config = minimal_config();
        assert_eq!(config.connectors["mock"].module, "mock");
        assert_eq!(config.skills["hello"].module, "hello");
        assert_eq!(test_config().web.port, 0);
    }

    #[test]
    fn test_modules_cover_mock_config() {
        let modules = test_modules();
        assert_eq!(modules.connector_modules(), vec!["mock"]);
        assert_eq!(modules.skill_modules(), vec!["echo", "hello", "ping"]);
    }

    #[tokio::test]
    async fn test_call_endpoint_needs_running_server() {
        let droid = test_runtime();
        let err = call_endpoint(&droid, "/stats", "GET", None).await.unwrap_err();
        assert!(matches!(err, HarnessError::NotServing));
    }
}
