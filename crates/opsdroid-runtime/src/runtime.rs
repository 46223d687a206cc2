//! The opsdroid runtime.
//!
//! [`OpsDroid`] owns the connector set, the skill registry, the dispatcher
//! and the web server, and moves them through one lifecycle:
//!
//! ```text
//! unloaded ──load──▶ loaded ──start──▶ running ──stop──▶ stopped ──unload──▶ unloaded
//!                                         ▲                 │
//!                                         └──────start──────┘
//! ```
//!
//! `start` and `stop` are idempotent. Transitions are serialized, so a
//! concurrent `start` and `stop` never interleave.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use opsdroid_runtime::OpsDroid;
//!
//! let droid = OpsDroid::builder()
//!     .config_file("opsdroid.toml")
//!     .connector_module::<RestConnector>()
//!     .build()?;
//!
//! droid.run().await?;
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use opsdroid_core::{
    BoxedConnector, ConfigurableConnector, ConfigurableSkill, ConnectorContext, ConnectorState,
    DispatchStats, Dispatcher, Event, Skill, SkillRegistry, StateError, WebhookCapability,
};
use opsdroid_transport::{StatsProvider, WebServer};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, OpsDroidConfig, validate_config};
use crate::error::{LoadError, RuntimeResult};
use crate::logging;
use crate::registry::ModuleRegistry;

/// Where the runtime is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeState {
    #[default]
    Unloaded,
    Loaded,
    Running,
    Stopped,
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unloaded => write!(f, "unloaded"),
            Self::Loaded => write!(f, "loaded"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Everything built by [`OpsDroid::load`].
struct Loaded {
    config: Arc<OpsDroidConfig>,
    dispatcher: Dispatcher,
    web: Option<Arc<WebServer>>,
}

/// Skills and connectors added in code rather than through configuration.
#[derive(Default)]
struct Extras {
    skills: Vec<Arc<Skill>>,
    connectors: Vec<BoxedConnector>,
}

/// The chat-bot runtime.
///
/// Dispatch statistics live as long as the runtime and survive reloads.
pub struct OpsDroid {
    modules: ModuleRegistry,
    stats: Arc<DispatchStats>,
    transition: tokio::sync::Mutex<()>,
    state: RwLock<RuntimeState>,
    loaded: RwLock<Option<Loaded>>,
    extras: Mutex<Extras>,
}

impl OpsDroid {
    /// Creates an unloaded runtime that can load the given modules.
    pub fn new(modules: ModuleRegistry) -> Self {
        Self {
            modules,
            stats: Arc::new(DispatchStats::new()),
            transition: tokio::sync::Mutex::new(()),
            state: RwLock::new(RuntimeState::Unloaded),
            loaded: RwLock::new(None),
            extras: Mutex::new(Extras::default()),
        }
    }

    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Adds a skill on top of the configured ones. Only valid while unloaded.
    ///
    /// Skills added here are evaluated after every configured skill.
    pub fn add_skill(&self, skill: Skill) -> RuntimeResult<()> {
        self.ensure_unloaded()?;
        self.extras.lock().skills.push(Arc::new(skill));
        Ok(())
    }

    /// Adds a connector on top of the configured ones. Only valid while
    /// unloaded.
    pub fn add_connector(&self, connector: BoxedConnector) -> RuntimeResult<()> {
        self.ensure_unloaded()?;
        self.extras.lock().connectors.push(connector);
        Ok(())
    }

    fn ensure_unloaded(&self) -> RuntimeResult<()> {
        if *self.state.read() == RuntimeState::Unloaded {
            Ok(())
        } else {
            Err(StateError::AlreadyLoaded.into())
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Builds every configured connector and skill.
    ///
    /// Fails with [`StateError::AlreadyLoaded`] unless unloaded. On any error
    /// the runtime stays unloaded.
    pub fn load(&self, config: OpsDroidConfig) -> RuntimeResult<()> {
        let mut state = self.state.write();
        if *state != RuntimeState::Unloaded {
            return Err(StateError::AlreadyLoaded.into());
        }
        validate_config(&config)?;

        let mut skills = SkillRegistry::new();
        for (name, entry) in &config.skills {
            for skill in self.modules.build_skills(name, entry)? {
                debug!(skill = skill.name(), module = skill.module(), "Loaded skill");
                skills.register(skill);
            }
        }

        let mut connectors = Vec::with_capacity(config.connectors.len());
        for (name, entry) in &config.connectors {
            let connector = self.modules.build_connector(name, entry)?;
            debug!(connector = %name, module = entry.module_or(name), "Loaded connector");
            connectors.push(connector);
        }

        {
            let extras = self.extras.lock();
            for skill in &extras.skills {
                skills.register_shared(Arc::clone(skill));
            }
            connectors.extend(extras.connectors.iter().cloned());
        }

        let mut names = HashSet::new();
        for connector in &connectors {
            if !names.insert(connector.name()) {
                return Err(LoadError::DuplicateConnector(connector.name().to_string()).into());
            }
        }

        let web = config.web.enabled.then(|| {
            Arc::new(WebServer::new(stats_provider(
                Arc::clone(&self.stats),
                connectors.len(),
                skills.len(),
            )))
        });

        info!(
            connectors = connectors.len(),
            skills = skills.len(),
            web = config.web.enabled,
            "opsdroid loaded"
        );

        let dispatcher = Dispatcher::new(
            skills,
            connectors,
            Arc::clone(&self.stats),
            config.dispatcher.to_dispatcher_config(),
        );
        *self.loaded.write() = Some(Loaded {
            config: Arc::new(config),
            dispatcher,
            web,
        });
        *state = RuntimeState::Loaded;
        Ok(())
    }

    /// Starts the web server and every connector.
    ///
    /// A connector that fails to connect is logged and left out; `start`
    /// still succeeds. Starting a running runtime is a no-op.
    pub async fn start(&self) -> RuntimeResult<()> {
        let _guard = self.transition.lock().await;

        match self.state() {
            RuntimeState::Unloaded => return Err(StateError::NotLoaded.into()),
            RuntimeState::Running => {
                warn!("opsdroid is already running");
                return Ok(());
            }
            RuntimeState::Loaded | RuntimeState::Stopped => {}
        }

        let (config, dispatcher, web) = self.parts()?;
        info!("Starting opsdroid");

        let mut ctx = ConnectorContext::new();
        if let Some(web) = web {
            let addr = web.start(&config.web.bind_addr()).await?;
            debug!(addr = %addr, "Web server ready for webhooks");
            ctx = ctx.with_webhooks(web as Arc<dyn WebhookCapability>);
        }

        dispatcher.start(ctx);
        *self.state.write() = RuntimeState::Running;
        info!("opsdroid started");
        Ok(())
    }

    /// Stops every connector and the web server.
    ///
    /// Every connector session is released before this returns. Stopping a
    /// runtime that is not running is a no-op.
    pub async fn stop(&self) -> RuntimeResult<()> {
        let _guard = self.transition.lock().await;
        self.stop_locked().await
    }

    async fn stop_locked(&self) -> RuntimeResult<()> {
        if self.state() != RuntimeState::Running {
            debug!(state = %self.state(), "opsdroid is not running");
            return Ok(());
        }

        info!("Stopping opsdroid");
        let (_, dispatcher, web) = self.parts()?;
        dispatcher.stop().await;
        if let Some(web) = web {
            web.stop().await;
        }

        *self.state.write() = RuntimeState::Stopped;
        info!("opsdroid stopped");
        Ok(())
    }

    /// Stops if needed and drops every connector and skill.
    pub async fn unload(&self) -> RuntimeResult<()> {
        let _guard = self.transition.lock().await;
        if self.state() == RuntimeState::Unloaded {
            return Err(StateError::NotLoaded.into());
        }

        self.stop_locked().await?;
        *self.loaded.write() = None;
        *self.state.write() = RuntimeState::Unloaded;
        info!("opsdroid unloaded");
        Ok(())
    }

    /// Loads `config`, runs `body` and unloads again.
    ///
    /// The runtime is unloaded, and so every connector session released, even
    /// when `body` panics; the panic is resumed afterwards.
    pub async fn with_loaded<Fut, T>(&self, config: OpsDroidConfig, body: Fut) -> RuntimeResult<T>
    where
        Fut: Future<Output = T>,
    {
        self.load(config)?;
        let outcome = AssertUnwindSafe(body).catch_unwind().await;

        if let Err(e) = self.unload().await {
            error!(error = %e, "Failed to unload opsdroid");
        }

        match outcome {
            Ok(value) => Ok(value),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Starts, waits for Ctrl+C or SIGTERM and stops.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("opsdroid is now running. Press Ctrl+C to stop.");
        wait_for_shutdown().await;
        self.stop().await
    }

    /// Starts, waits for `shutdown` and stops.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        shutdown.await;
        self.stop().await
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatches an event to every matching skill, as if a connector had
    /// produced it. Returns the number of matching skills.
    ///
    /// Only valid while loaded or running; a stopped runtime dispatches
    /// nothing until it is started again.
    pub fn parse(&self, event: Event) -> RuntimeResult<usize> {
        match self.state() {
            RuntimeState::Unloaded => return Err(StateError::NotLoaded.into()),
            RuntimeState::Stopped => return Err(StateError::NotRunning("opsdroid").into()),
            RuntimeState::Loaded | RuntimeState::Running => {}
        }
        let dispatcher = self.dispatcher().ok_or(StateError::NotLoaded)?;
        Ok(dispatcher.parse(event))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the lifecycle state.
    pub fn state(&self) -> RuntimeState {
        *self.state.read()
    }

    /// Returns true while connector listen loops are active.
    ///
    /// A started runtime whose connectors all failed or finished reports
    /// false here while [`state`](Self::state) stays `Running`.
    pub fn is_running(&self) -> bool {
        self.loaded
            .read()
            .as_ref()
            .is_some_and(|l| l.dispatcher.is_running())
    }

    /// Returns the loaded configuration.
    pub fn config(&self) -> Option<Arc<OpsDroidConfig>> {
        self.loaded.read().as_ref().map(|l| Arc::clone(&l.config))
    }

    /// Returns the dispatcher while loaded.
    pub fn dispatcher(&self) -> Option<Dispatcher> {
        self.loaded.read().as_ref().map(|l| l.dispatcher.clone())
    }

    /// Returns the dispatch statistics.
    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Returns the module registry.
    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Looks up a loaded connector by name.
    pub fn connector(&self, name: &str) -> Option<BoxedConnector> {
        self.dispatcher()
            .and_then(|d| d.connector(name).cloned())
    }

    /// Returns the first loaded connector.
    pub fn default_connector(&self) -> Option<BoxedConnector> {
        self.dispatcher()
            .and_then(|d| d.connectors().first().map(|c| Arc::clone(c.connector())))
    }

    /// Returns the state of the named connector.
    pub fn connector_state(&self, name: &str) -> Option<ConnectorState> {
        self.dispatcher().and_then(|d| d.connector_state(name))
    }

    /// Returns every connector with its state, in load order.
    pub fn connector_states(&self) -> Vec<(String, ConnectorState)> {
        self.dispatcher()
            .map(|d| {
                d.connectors()
                    .iter()
                    .map(|c| (c.name().to_string(), c.state()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the loaded skill names in evaluation order.
    pub fn skill_names(&self) -> Vec<String> {
        self.dispatcher()
            .map(|d| d.skills().names().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Returns the web server while loaded with the web surface enabled.
    pub fn web(&self) -> Option<Arc<WebServer>> {
        self.loaded.read().as_ref().and_then(|l| l.web.clone())
    }

    /// Returns the bound web address while running.
    pub fn web_addr(&self) -> Option<SocketAddr> {
        self.web().and_then(|w| w.local_addr())
    }

    /// Returns `http://host:port` while running.
    pub fn web_base_url(&self) -> Option<String> {
        self.web().and_then(|w| w.base_url())
    }

    fn parts(&self) -> RuntimeResult<(Arc<OpsDroidConfig>, Dispatcher, Option<Arc<WebServer>>)> {
        let loaded = self.loaded.read();
        let loaded = loaded.as_ref().ok_or(StateError::NotLoaded)?;
        Ok((
            Arc::clone(&loaded.config),
            loaded.dispatcher.clone(),
            loaded.web.clone(),
        ))
    }
}

impl std::fmt::Debug for OpsDroid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsDroid")
            .field("state", &self.state())
            .field("modules", &self.modules)
            .field("connectors", &self.connector_states())
            .finish()
    }
}

fn stats_provider(stats: Arc<DispatchStats>, connectors: usize, skills: usize) -> StatsProvider {
    Arc::new(move || {
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "messages": stats.snapshot(),
            "modules": {
                "connectors": connectors,
                "skills": skills,
            },
        })
    })
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a loaded [`OpsDroid`].
///
/// ```rust,ignore
/// let droid = OpsDroid::builder()
///     .config_file("config/opsdroid.toml")
///     .profile("production")
///     .skill(my_skill)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<OpsDroidConfig>,
    modules: ModuleRegistry,
    extras: Extras,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Creates a builder with the built-in skill modules registered.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            modules: ModuleRegistry::new().with_builtin_skills(),
            extras: Extras::default(),
            init_logging: true,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration beneath files and the environment.
    pub fn merge(mut self, config: OpsDroidConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` as is, skipping files and the environment.
    pub fn config(mut self, config: OpsDroidConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Skips logging initialization.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Registers a connector module.
    pub fn connector_module<C>(mut self) -> Self
    where
        C: ConfigurableConnector + 'static,
    {
        self.modules.register_connector::<C>();
        self
    }

    /// Registers a skill module.
    pub fn skill_module<S>(mut self) -> Self
    where
        S: ConfigurableSkill + 'static,
    {
        self.modules.register_skill::<S>();
        self
    }

    /// Adds a skill on top of the configured ones.
    pub fn skill(mut self, skill: Skill) -> Self {
        self.extras.skills.push(Arc::new(skill));
        self
    }

    /// Adds a connector on top of the configured ones.
    pub fn connector(mut self, connector: BoxedConnector) -> Self {
        self.extras.connectors.push(connector);
        self
    }

    /// Loads the configuration, initializes logging and returns a loaded
    /// runtime.
    pub fn build(self) -> RuntimeResult<OpsDroid> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let droid = OpsDroid::new(self.modules);
        *droid.extras.lock() = self.extras;
        droid.load(config)?;
        Ok(droid)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ConfigLoader> for RuntimeBuilder {
    fn from(config_loader: ConfigLoader) -> Self {
        Self {
            config_loader,
            ..Self::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModuleConfig;
    use crate::error::RuntimeError;
    use async_trait::async_trait;
    use opsdroid_core::{
        ConnectError, ConnectResult, ConnectorResult, EventSink, SendResult, SkillContext,
        matcher::match_always,
    };
    use serde::Deserialize;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;
    use tokio_util::sync::CancellationToken;

    static DISCONNECTS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Debug, Default, Deserialize)]
    struct IdleConfig {
        #[serde(default)]
        reject: bool,
    }

    struct IdleConnector {
        name: String,
        reject: bool,
    }

    #[async_trait]
    impl opsdroid_core::Connector for IdleConnector {
        fn name(&self) -> &str {
            &self.name
        }

        async fn connect(&self, _ctx: &ConnectorContext) -> ConnectResult<()> {
            if self.reject {
                return Err(ConnectError::authentication("invalid_auth", "{}"));
            }
            Ok(())
        }

        async fn listen(&self, _sink: EventSink, shutdown: CancellationToken) -> ConnectorResult<()> {
            shutdown.cancelled().await;
            Ok(())
        }

        async fn disconnect(&self) -> ConnectorResult<()> {
            DISCONNECTS.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn deliver(&self, _event: &Event) -> SendResult<()> {
            Ok(())
        }
    }

    impl ConfigurableConnector for IdleConnector {
        type Config = IdleConfig;

        fn module() -> &'static str {
            "idle"
        }

        fn from_config(name: &str, config: IdleConfig) -> anyhow::Result<Arc<Self>> {
            Ok(Arc::new(Self {
                name: name.to_string(),
                reject: config.reject,
            }))
        }
    }

    async fn noop(_ctx: SkillContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn droid() -> OpsDroid {
        OpsDroid::new(
            ModuleRegistry::new()
                .with_builtin_skills()
                .with_connector::<IdleConnector>(),
        )
    }

    fn config() -> OpsDroidConfig {
        let mut config = OpsDroidConfig::default()
            .with_connector("idle", ModuleConfig::default())
            .with_connector("broken", ModuleConfig::new("idle").set("reject", true))
            .with_skill("ping", ModuleConfig::default());
        config.web.port = 0;
        config
    }

    async fn wait_connected(droid: &OpsDroid, name: &str) {
        while droid.connector_state(name) != Some(ConnectorState::Connected) {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let droid = droid();
        assert!(matches!(
            droid.start().await,
            Err(RuntimeError::State(StateError::NotLoaded))
        ));

        droid.load(config()).unwrap();
        assert_eq!(droid.state(), RuntimeState::Loaded);
        assert!(matches!(
            droid.load(config()),
            Err(RuntimeError::State(StateError::AlreadyLoaded))
        ));
        assert_eq!(droid.skill_names(), vec!["ping"]);

        assert_ok!(droid.start().await);
        assert_ok!(droid.start().await);
        wait_connected(&droid, "idle").await;
        assert!(droid.is_running());
        assert!(droid.web_addr().is_some());
        assert_eq!(droid.state(), RuntimeState::Running);

        assert_ok!(droid.stop().await);
        assert_ok!(droid.stop().await);
        assert!(!droid.is_running());
        assert_eq!(droid.state(), RuntimeState::Stopped);
        assert_eq!(droid.web_addr(), None);
        assert_eq!(droid.connector_state("idle"), Some(ConnectorState::Disconnected));

        droid.unload().await.unwrap();
        assert_eq!(droid.state(), RuntimeState::Unloaded);
        assert!(droid.connector("idle").is_none());
    }

    #[tokio::test]
    async fn test_failed_connector_does_not_block_start() {
        let droid = droid();
        droid.load(config()).unwrap();
        droid.start().await.unwrap();

        wait_connected(&droid, "idle").await;
        while droid.connector_state("broken") != Some(ConnectorState::Error) {
            tokio::task::yield_now().await;
        }
        assert!(droid.is_running());

        droid.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_with_loaded_unloads_after_panic() {
        let droid = droid();
        let before = DISCONNECTS.load(Ordering::SeqCst);

        let outcome = AssertUnwindSafe(droid.with_loaded(config(), async {
            droid.start().await.unwrap();
            wait_connected(&droid, "idle").await;
            if droid.is_running() {
                panic!("body failed");
            }
        }))
        .catch_unwind()
        .await;

        assert!(outcome.is_err());
        assert_eq!(droid.state(), RuntimeState::Unloaded);
        assert!(DISCONNECTS.load(Ordering::SeqCst) > before);
    }

    #[tokio::test]
    async fn test_load_errors_leave_runtime_unloaded() {
        let droid = droid();
        let unknown_config = OpsDroidConfig::default().with_connector("shell", ModuleConfig::default());
        assert!(matches!(
            droid.load(unknown_config),
            Err(RuntimeError::Load(LoadError::UnknownConnector { .. }))
        ));
        assert_eq!(droid.state(), RuntimeState::Unloaded);

        droid
            .add_connector(Arc::new(IdleConnector {
                name: "idle".into(),
                reject: false,
            }))
            .unwrap();
        assert!(matches!(
            droid.load(config()),
            Err(RuntimeError::Load(LoadError::DuplicateConnector(ref name))) if name == "idle"
        ));
        assert_eq!(droid.state(), RuntimeState::Unloaded);
    }

    #[tokio::test]
    async fn test_parse_uses_extra_skills_after_configured_ones() {
        let droid = droid();
        droid
            .add_skill(Skill::new("always", match_always(), noop))
            .unwrap();
        assert!(droid.parse(Event::message("ping").build()).is_err());

        droid.load(config()).unwrap();
        assert_eq!(droid.skill_names(), vec!["ping", "always"]);
        assert_eq!(droid.parse(Event::message("ping").build()).unwrap(), 2);
        assert_eq!(droid.parse(Event::message("other").build()).unwrap(), 1);
        assert!(droid.add_skill(Skill::new("late", match_always(), noop)).is_err());
        assert_eq!(droid.stats().snapshot().messages_parsed, 2);
    }

    #[tokio::test]
    async fn test_parse_is_rejected_once_stopped() {
        let droid = droid();
        droid.load(config()).unwrap();
        droid.start().await.unwrap();
        assert_ok!(droid.parse(Event::message("ping").build()));

        droid.stop().await.unwrap();
        assert!(matches!(
            droid.parse(Event::message("ping").build()),
            Err(RuntimeError::State(StateError::NotRunning(_)))
        ));
        assert_eq!(droid.stats().snapshot().messages_parsed, 1);

        droid.start().await.unwrap();
        assert_ok!(droid.parse(Event::message("ping").build()));
        droid.unload().await.unwrap();
    }
}
