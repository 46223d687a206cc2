//! The skill registry.
//!
//! Registration order is evaluation order. The registry is filled while the
//! runtime loads and is shared read-only by the dispatcher afterwards.

use std::sync::Arc;

use crate::foundation::event::Event;
use crate::framework::skill::Skill;

/// An ordered collection of skills.
#[derive(Debug, Clone, Default)]
pub struct SkillRegistry {
    skills: Vec<Arc<Skill>>,
}

impl SkillRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a skill. Duplicate names are allowed.
    pub fn register(&mut self, skill: Skill) {
        self.register_shared(Arc::new(skill));
    }

    /// Appends a skill that is also held elsewhere.
    pub fn register_shared(&mut self, skill: Arc<Skill>) {
        self.skills.push(skill);
    }

    /// Appends a skill (builder pattern).
    pub fn with(mut self, skill: Skill) -> Self {
        self.register(skill);
        self
    }

    /// Iterates over skills in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Skill>> {
        self.skills.iter()
    }

    /// Returns every skill whose predicate matches `event`, in registration
    /// order. Skills whose predicate panics are skipped.
    pub fn matching<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = &'a Arc<Skill>> + 'a {
        self.skills.iter().filter(move |skill| skill.matches(event))
    }

    /// Returns the skill names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.name()).collect()
    }

    /// Returns the number of registered skills.
    pub fn len(&self) -> usize {
        self.skills.len()
    }

    /// Returns true if no skill is registered.
    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Removes every skill.
    pub fn clear(&mut self) {
        self.skills.clear();
    }
}
