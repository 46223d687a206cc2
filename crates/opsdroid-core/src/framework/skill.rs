//! Skills and their execution context.
//!
//! A [`Skill`] pairs a [`Matcher`] with an asynchronous [`Action`]. Actions
//! are plain async closures taking a [`SkillContext`]:
//!
//! ```rust,ignore
//! use opsdroid_core::{Skill, SkillContext, matcher::match_text};
//!
//! let ping = Skill::new("ping", match_text("ping"), |ctx: SkillContext| async move {
//!     ctx.respond("pong").await?;
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::foundation::error::{DispatchActionError, SendError, SendResult};
use crate::foundation::event::{Event, EventKind, SharedEvent};
use crate::foundation::stats::DispatchStats;
use crate::framework::matcher::Matcher;
use crate::integration::connector::BoxedConnector;

// ============================================================================
// Action
// ============================================================================

/// The asynchronous body of a skill.
///
/// Implemented for every `Fn(SkillContext) -> impl Future<Output = anyhow::Result<()>>`.
pub trait Action: Send + Sync + 'static {
    /// Runs the action for one event.
    fn run(&self, ctx: SkillContext) -> BoxFuture<'static, anyhow::Result<()>>;
}

impl<F, Fut> Action for F
where
    F: Fn(SkillContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn run(&self, ctx: SkillContext) -> BoxFuture<'static, anyhow::Result<()>> {
        Box::pin(self(ctx))
    }
}

// ============================================================================
// Skill
// ============================================================================

/// A predicate and action pair plus its identity.
pub struct Skill {
    name: String,
    module: String,
    matcher: Matcher,
    action: Box<dyn Action>,
}

impl Skill {
    /// Creates a skill. The module defaults to the skill name.
    pub fn new(name: impl Into<String>, matcher: Matcher, action: impl Action) -> Self {
        let name = name.into();
        Self {
            module: name.clone(),
            name,
            matcher,
            action: Box::new(action),
        }
    }

    /// Sets the module this skill was loaded from.
    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    /// Returns the skill name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the originating module.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns the predicate.
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Evaluates the predicate against an event.
    ///
    /// A panicking predicate counts as no match; use
    /// [`try_matches`](Self::try_matches) to observe the panic.
    pub fn matches(&self, event: &Event) -> bool {
        self.try_matches(event).unwrap_or(false)
    }

    /// Evaluates the predicate, converting a panic into
    /// [`DispatchActionError::MatcherPanicked`].
    pub fn try_matches(&self, event: &Event) -> Result<bool, DispatchActionError> {
        std::panic::catch_unwind(AssertUnwindSafe(|| self.matcher.matches(event))).map_err(
            |payload| DispatchActionError::MatcherPanicked {
                skill: self.name.clone(),
                message: panic_message(payload.as_ref()),
            },
        )
    }

    /// Runs the action, converting errors and panics into
    /// [`DispatchActionError`].
    pub async fn run(&self, ctx: SkillContext) -> Result<(), DispatchActionError> {
        match AssertUnwindSafe(self.action.run(ctx)).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(DispatchActionError::Failed {
                skill: self.name.clone(),
                source,
            }),
            Err(payload) => Err(DispatchActionError::Panicked {
                skill: self.name.clone(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

impl std::fmt::Debug for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skill")
            .field("name", &self.name)
            .field("module", &self.module)
            .field("matcher", &self.matcher)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A skill module that can be built from configuration.
///
/// One module may contribute several skills. The runtime deserializes the
/// settings of a `skills.<name>` entry into [`Config`](Self::Config).
pub trait ConfigurableSkill {
    /// The settings type for this module.
    type Config: DeserializeOwned + Default;

    /// Returns the module key used in configuration.
    fn module() -> &'static str;

    /// Builds the skills of this module under the configured `name`.
    fn build(name: &str, config: Self::Config) -> anyhow::Result<Vec<Skill>>;
}

// ============================================================================
// Skill Context
// ============================================================================

/// Everything an action needs to handle one event.
///
/// Contexts for the same event share a response flag, so only the first reply
/// to an event is counted towards response latency.
#[derive(Clone)]
pub struct SkillContext {
    event: SharedEvent,
    connector: Option<BoxedConnector>,
    stats: Arc<DispatchStats>,
    responded: Arc<AtomicBool>,
    skill: Arc<str>,
}

impl SkillContext {
    /// Creates a context for `event`.
    pub fn new(
        event: SharedEvent,
        connector: Option<BoxedConnector>,
        stats: Arc<DispatchStats>,
    ) -> Self {
        Self {
            event,
            connector,
            stats,
            responded: Arc::new(AtomicBool::new(false)),
            skill: Arc::from(""),
        }
    }

    pub(crate) fn for_skill(&self, skill: &str) -> Self {
        Self {
            skill: Arc::from(skill),
            ..self.clone()
        }
    }

    /// Returns the triggering event.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// Returns the triggering event's text, for message events.
    pub fn text(&self) -> Option<&str> {
        self.event.text()
    }

    /// Returns the connector the event came from.
    pub fn connector(&self) -> Option<&BoxedConnector> {
        self.connector.as_ref()
    }

    /// Returns the name of the skill being run.
    pub fn skill(&self) -> &str {
        &self.skill
    }

    /// Returns the runtime's dispatch statistics.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Replies to the triggering event with a text message.
    pub async fn respond(&self, text: impl Into<String>) -> SendResult<()> {
        let reply = self
            .event
            .reply(EventKind::Message { text: text.into() })
            .build();
        self.send(&reply).await
    }

    /// Reacts to the triggering event.
    pub async fn react(&self, emoji: impl Into<String>) -> SendResult<()> {
        let reaction = self
            .event
            .reply(EventKind::Reaction {
                emoji: emoji.into(),
            })
            .build();
        self.send(&reaction).await
    }

    /// Sends an arbitrary event through the originating connector.
    pub async fn send(&self, event: &Event) -> SendResult<()> {
        let connector = self.connector.as_ref().ok_or(SendError::NoConnector)?;
        connector.send(event, None).await?;

        if !self.responded.swap(true, Ordering::AcqRel) {
            self.stats.record_response(self.event.created().elapsed());
        }
        Ok(())
    }
}

impl std::fmt::Debug for SkillContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillContext")
            .field("event", &self.event.id())
            .field("skill", &self.skill)
            .field("connector", &self.connector.as_ref().map(|c| c.name().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::matcher::match_text;

    fn context(text: &str) -> SkillContext {
        SkillContext::new(
            Arc::new(Event::message(text).build()),
            None,
            Arc::new(DispatchStats::new()),
        )
    }

    async fn broken(_ctx: SkillContext) -> anyhow::Result<()> {
        anyhow::bail!("boom")
    }

    async fn panicky(ctx: SkillContext) -> anyhow::Result<()> {
        if ctx.text().is_some() {
            panic!("kaboom");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_run_reports_errors() {
        let skill = Skill::new("broken", match_text("x"), broken).with_module("tests");

        let err = skill.run(context("x")).await.unwrap_err();
        assert!(matches!(err, DispatchActionError::Failed { ref skill, .. } if skill == "broken"));
        assert_eq!(skill.module(), "tests");
    }

    #[tokio::test]
    async fn test_run_catches_panics() {
        let skill = Skill::new("panicky", match_text("x"), panicky);

        let err = skill.run(context("x")).await.unwrap_err();
        assert!(matches!(err, DispatchActionError::Panicked { ref message, .. } if message == "kaboom"));
    }

    #[tokio::test]
    async fn test_respond_without_connector() {
        let ctx = context("hi");
        assert!(matches!(ctx.respond("hello").await, Err(SendError::NoConnector)));
        assert_eq!(ctx.stats().snapshot().total_responses, 0);
    }
}
