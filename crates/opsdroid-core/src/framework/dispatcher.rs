//! Event dispatcher.
//!
//! The [`Dispatcher`] owns the connector set and the skill registry for the
//! lifetime of a runtime. It does two things:
//!
//! - **Lifecycle**: [`start`](Dispatcher::start) spawns one task per connector
//!   that connects and then listens; [`stop`](Dispatcher::stop) cancels every
//!   listen loop, waits for them within a grace period and aborts stragglers.
//! - **Dispatch**: [`parse`](Dispatcher::parse) evaluates every skill
//!   predicate in registration order and spawns the action of every match.
//!
//! ```text
//! ┌───────────┐
//! │ Connector │──┐                     ┌──────────────┐
//! └───────────┘  │  ┌──────────────┐   │ Skill action │
//! ┌───────────┐  ├─▶│ event channel│──▶│ Skill action │
//! │ Connector │──┘  └──────────────┘   │ Skill action │
//! └───────────┘        (one pump)      └──────────────┘
//! ```
//!
//! All connectors write into one channel drained by a single pump task, so
//! events from one connector are parsed in the order they were emitted.
//! Actions run concurrently on a task tracker; one failing action never
//! affects its siblings.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, debug_span, error, info, warn};

use crate::foundation::event::Event;
use crate::foundation::stats::DispatchStats;
use crate::framework::registry::SkillRegistry;
use crate::framework::skill::SkillContext;
use crate::integration::connector::{
    BoxedConnector, ConnectorContext, ConnectorState, EventSink, ManagedConnector,
};

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// How long `stop()` waits for listen loops, and then for in-flight
    /// actions, before giving up on them.
    pub grace_period: Duration,
    /// Capacity of the shared event channel.
    pub channel_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_millis(5000),
            channel_capacity: 256,
        }
    }
}

struct Session {
    shutdown: CancellationToken,
    listeners: JoinSet<()>,
    active: Arc<AtomicUsize>,
    pump: JoinHandle<()>,
}

/// Counts one listen task as active until it finishes or is aborted.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(active))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Inner {
    skills: Arc<SkillRegistry>,
    connectors: Vec<Arc<ManagedConnector>>,
    stats: Arc<DispatchStats>,
    config: DispatcherConfig,
    actions: TaskTracker,
    session: Mutex<Option<Session>>,
}

/// The central event dispatcher.
///
/// Cloning is cheap; clones share the same connectors, skills and session.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Creates a dispatcher over a fixed set of skills and connectors.
    pub fn new(
        skills: SkillRegistry,
        connectors: Vec<BoxedConnector>,
        stats: Arc<DispatchStats>,
        config: DispatcherConfig,
    ) -> Self {
        let connectors = connectors
            .into_iter()
            .map(|c| Arc::new(ManagedConnector::new(c)))
            .collect();

        Self {
            inner: Arc::new(Inner {
                skills: Arc::new(skills),
                connectors,
                stats,
                config,
                actions: TaskTracker::new(),
                session: Mutex::new(None),
            }),
        }
    }

    /// Returns the skill registry.
    pub fn skills(&self) -> &SkillRegistry {
        &self.inner.skills
    }

    /// Returns the managed connectors in registration order.
    pub fn connectors(&self) -> &[Arc<ManagedConnector>] {
        &self.inner.connectors
    }

    /// Looks up a connector by name.
    pub fn connector(&self, name: &str) -> Option<&BoxedConnector> {
        self.inner
            .connectors
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.connector())
    }

    /// Returns the state of the named connector.
    pub fn connector_state(&self, name: &str) -> Option<ConnectorState> {
        self.inner
            .connectors
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.state())
    }

    /// Returns the dispatch statistics.
    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.inner.stats
    }

    /// Returns the dispatcher configuration.
    pub fn config(&self) -> DispatcherConfig {
        self.inner.config
    }

    /// Returns true while at least one connector task is connecting or
    /// listening.
    ///
    /// A started dispatcher whose connectors all failed to connect, or whose
    /// listen loops all ended, is not running.
    pub fn is_running(&self) -> bool {
        self.inner
            .session
            .lock()
            .as_ref()
            .is_some_and(|s| s.active.load(Ordering::SeqCst) > 0)
    }

    /// Returns true between `start` and `stop`.
    pub fn is_started(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Returns the number of skill actions still running.
    pub fn in_flight(&self) -> usize {
        self.inner.actions.len()
    }

    /// Dispatches one event to every matching skill.
    ///
    /// Predicates are evaluated synchronously in registration order; matching
    /// actions are spawned and run concurrently. A panicking predicate is
    /// logged and counted as a failure, and evaluation continues with the
    /// next skill. Returns the number of skills that matched.
    pub fn parse(&self, event: Event) -> usize {
        let event = Arc::new(event);
        let span = debug_span!(
            "dispatch",
            event_id = %event.id(),
            kind = event.kind().name(),
            connector = event.connector().unwrap_or("-"),
        );
        let _enter = span.enter();

        self.inner.stats.record_parsed();

        let connector = event
            .connector()
            .and_then(|name| self.connector(name))
            .cloned();
        let ctx = SkillContext::new(Arc::clone(&event), connector, Arc::clone(&self.inner.stats));

        let mut matched = 0;
        for skill in self.inner.skills.iter() {
            match skill.try_matches(&event) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    self.inner.stats.record_failure();
                    error!(
                        skill = skill.name(),
                        module = skill.module(),
                        error = %e,
                        "Exception when evaluating skill matcher"
                    );
                    continue;
                }
            }
            matched += 1;
            debug!(skill = skill.name(), module = skill.module(), "Skill matched");

            let skill = Arc::clone(skill);
            let ctx = ctx.for_skill(skill.name());
            let stats = Arc::clone(&self.inner.stats);
            self.inner.actions.spawn(
                async move {
                    if let Err(e) = skill.run(ctx).await {
                        stats.record_failure();
                        error!(
                            skill = skill.name(),
                            module = skill.module(),
                            error = %e,
                            "Exception when running skill"
                        );
                    }
                }
                .instrument(span.clone()),
            );
        }

        if matched == 0 {
            debug!("No skill matched");
        }
        self.inner.stats.record_matched(matched as u64);
        matched
    }

    /// Connects every connector and starts its listen loop.
    ///
    /// A connector that fails to connect is logged, marked
    /// [`ConnectorState::Error`] and left out; the others keep starting.
    /// Calling `start` while running is a no-op.
    pub fn start(&self, ctx: ConnectorContext) {
        let mut session = self.inner.session.lock();
        if session.is_some() {
            warn!("Dispatcher is already running");
            return;
        }

        let (tx, rx) = mpsc::channel(self.inner.config.channel_capacity.max(1));
        let shutdown = CancellationToken::new();
        let mut listeners = JoinSet::new();
        let active = Arc::new(AtomicUsize::new(0));

        for managed in &self.inner.connectors {
            let managed = Arc::clone(managed);
            let sink = EventSink::new(managed.name(), tx.clone());
            let ctx = ctx.clone();
            let token = shutdown.child_token();
            let guard = ActiveGuard::new(&active);
            listeners.spawn(async move {
                run_connector(managed, ctx, sink, token).await;
                drop(guard);
            });
        }
        drop(tx);

        let pump = tokio::spawn(pump(self.clone(), rx, shutdown.clone()));

        info!(
            connectors = self.inner.connectors.len(),
            skills = self.inner.skills.len(),
            "Dispatcher started"
        );

        *session = Some(Session {
            shutdown,
            listeners,
            active,
            pump,
        });
    }

    /// Stops every listen loop and releases every connector session.
    ///
    /// Listen loops get the grace period to observe cancellation before they
    /// are aborted. In-flight actions then get the grace period to finish.
    /// Calling `stop` while stopped is a no-op.
    pub async fn stop(&self) {
        let Some(session) = self.inner.session.lock().take() else {
            debug!("Dispatcher is not running");
            return;
        };
        let grace = self.inner.config.grace_period;

        session.shutdown.cancel();
        if let Err(e) = session.pump.await {
            error!(error = %e, "Dispatch loop terminated abnormally");
        }

        let mut listeners = session.listeners;
        let drained = tokio::time::timeout(grace, async {
            while listeners.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                remaining = listeners.len(),
                grace_ms = grace.as_millis() as u64,
                "Listen loops did not stop in time, aborting"
            );
            listeners.abort_all();
            while listeners.join_next().await.is_some() {}
        }

        self.inner.actions.close();
        if tokio::time::timeout(grace, self.inner.actions.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = self.inner.actions.len(),
                "Skill actions still running after grace period"
            );
        }
        self.inner.actions.reopen();

        for managed in &self.inner.connectors {
            match managed.state() {
                ConnectorState::Connected | ConnectorState::Connecting => {
                    if let Err(e) = managed.connector().disconnect().await {
                        warn!(connector = %managed.name(), error = %e, "Error while disconnecting");
                    }
                    managed.set_state(ConnectorState::Disconnected);
                }
                ConnectorState::Disconnected | ConnectorState::Error => {}
            }
        }

        info!("Dispatcher stopped");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("skills", &self.inner.skills.len())
            .field("connectors", &self.inner.connectors)
            .field("started", &self.is_started())
            .finish()
    }
}

async fn pump(dispatcher: Dispatcher, mut rx: mpsc::Receiver<Event>, shutdown: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => {
                    dispatcher.parse(event);
                }
                None => {
                    debug!("All listen loops finished");
                    shutdown.cancelled().await;
                    break;
                }
            },
        }
    }
}

async fn run_connector(
    managed: Arc<ManagedConnector>,
    ctx: ConnectorContext,
    sink: EventSink,
    shutdown: CancellationToken,
) {
    let connector = Arc::clone(managed.connector());
    let name = connector.name().to_string();

    managed.set_state(ConnectorState::Connecting);
    let connected = tokio::select! {
        () = shutdown.cancelled() => return,
        result = connector.connect(&ctx) => result,
    };

    if let Err(e) = connected {
        error!(connector = %name, error = %e, "Connector failed to connect: {e}");
        managed.set_state(ConnectorState::Error);
        return;
    }

    managed.set_state(ConnectorState::Connected);
    info!(connector = %name, "Connector connected");

    match connector.listen(sink, shutdown).await {
        Ok(()) => debug!(connector = %name, "Listen loop finished"),
        Err(e) => warn!(connector = %name, error = %e, "Listen loop ended with error"),
    }
}
