//! Framework layer - Matching and dispatch.
//!
//! This module contains the event processing pipeline:
//! - Matchers (pure event predicates) and their combinators
//! - Skills and the context their actions run with
//! - The ordered skill registry
//! - The central dispatcher and connector lifecycle

pub mod dispatcher;
pub mod matcher;
pub mod registry;
pub mod skill;

pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use matcher::{
    MatchFn, Matcher, match_always, match_connector, match_kind, match_prefix, match_regex,
    match_regex_case_insensitive, match_text,
};
pub use registry::SkillRegistry;
pub use skill::{Action, ConfigurableSkill, Skill, SkillContext};
