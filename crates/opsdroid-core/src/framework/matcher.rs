//! Skill predicates.
//!
//! A [`Matcher`] is a pure function of an [`Event`]. Matchers are evaluated
//! synchronously by the dispatcher, so they must not block.
//!
//! # Example
//!
//! ```rust,ignore
//! use opsdroid_core::matcher::{match_connector, match_regex, match_text};
//!
//! // "ping", "Ping", "PING"
//! let ping = match_text("ping");
//!
//! // "deploy web", "deploy api" but only from the shell connector
//! let deploy = match_regex(r"^deploy (\w+)$")?.and(match_connector("shell"));
//! ```

use std::fmt;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::foundation::event::Event;

/// A type-erased predicate.
pub type MatchFn = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// A named event predicate.
#[derive(Clone)]
pub struct Matcher {
    check: MatchFn,
    description: String,
}

impl Matcher {
    /// Creates a matcher from a closure.
    pub fn new<F>(description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self {
            check: Arc::new(f),
            description: description.into(),
        }
    }

    /// Evaluates the predicate.
    pub fn matches(&self, event: &Event) -> bool {
        (self.check)(event)
    }

    /// Returns a human readable description, used in logs.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Matches when both matchers match.
    pub fn and(self, other: Matcher) -> Self {
        let description = format!("({} and {})", self.description, other.description);
        Self::new(description, move |event| {
            self.matches(event) && other.matches(event)
        })
    }

    /// Matches when either matcher matches.
    pub fn or(self, other: Matcher) -> Self {
        let description = format!("({} or {})", self.description, other.description);
        Self::new(description, move |event| {
            self.matches(event) || other.matches(event)
        })
    }

    /// Inverts the matcher.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        let description = format!("not {}", self.description);
        Self::new(description, move |event| !self.matches(event))
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Matcher").field(&self.description).finish()
    }
}

/// Matches every event.
pub fn match_always() -> Matcher {
    Matcher::new("always", |_| true)
}

/// Matches messages whose text equals `text`, ignoring case and surrounding
/// whitespace.
pub fn match_text(text: impl Into<String>) -> Matcher {
    let expected = text.into().trim().to_lowercase();
    Matcher::new(format!("text {expected:?}"), move |event| {
        event
            .text()
            .is_some_and(|t| t.trim().to_lowercase() == expected)
    })
}

/// Matches messages whose text starts with `prefix`.
pub fn match_prefix(prefix: impl Into<String>) -> Matcher {
    let prefix = prefix.into();
    Matcher::new(format!("prefix {prefix:?}"), move |event| {
        event.text().is_some_and(|t| t.starts_with(prefix.as_str()))
    })
}

/// Matches messages whose text matches `pattern`.
pub fn match_regex(pattern: &str) -> Result<Matcher, regex::Error> {
    Regex::new(pattern).map(regex_matcher)
}

/// Matches messages whose text matches `pattern`, ignoring case.
pub fn match_regex_case_insensitive(pattern: &str) -> Result<Matcher, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(regex_matcher)
}

fn regex_matcher(regex: Regex) -> Matcher {
    Matcher::new(format!("regex /{}/", regex.as_str()), move |event| {
        event.text().is_some_and(|t| regex.is_match(t))
    })
}

/// Matches events of the named kind (`"message"`, `"reaction"`, `"file"`,
/// `"image"`).
pub fn match_kind(kind: &'static str) -> Matcher {
    Matcher::new(format!("kind {kind}"), move |event| event.kind().name() == kind)
}

/// Matches events that originate from the named connector.
pub fn match_connector(name: impl Into<String>) -> Matcher {
    let name = name.into();
    Matcher::new(format!("connector {name}"), move |event| {
        event.connector() == Some(name.as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(text: &str) -> Event {
        Event::message(text).connector("shell").build()
    }

    #[test]
    fn test_match_text_ignores_case() {
        let m = match_text("Ping");
        assert!(m.matches(&msg("ping")));
        assert!(m.matches(&msg("  PING ")));
        assert!(!m.matches(&msg("ping me")));
        assert!(!m.matches(&Event::reaction("ping").build()));
    }

    #[test]
    fn test_match_regex() {
        let m = match_regex(r"^deploy (\w+)$").unwrap();
        assert!(m.matches(&msg("deploy web")));
        assert!(!m.matches(&msg("Deploy web")));

        let m = match_regex_case_insensitive(r"^deploy (\w+)$").unwrap();
        assert!(m.matches(&msg("Deploy web")));

        assert!(match_regex("(").is_err());
    }

    #[test]
    fn test_combinators() {
        let m = match_prefix("echo ").and(match_connector("shell"));
        assert!(m.matches(&msg("echo hi")));
        assert!(!m.matches(&Event::message("echo hi").connector("rest").build()));

        let m = match_text("a").or(match_text("b"));
        assert!(m.matches(&msg("a")));
        assert!(m.matches(&msg("b")));
        assert!(!m.matches(&msg("c")));

        let m = match_kind("message").not();
        assert!(m.matches(&Event::reaction("+1").build()));
        assert!(!m.matches(&msg("x")));
        assert_eq!(m.description(), "not kind message");
    }

    #[test]
    fn test_match_always() {
        assert!(match_always().matches(&Event::reaction("+1").build()));
    }
}
