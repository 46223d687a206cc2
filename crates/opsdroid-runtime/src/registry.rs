//! Module registry.
//!
//! Maps the `module` key of a `connectors.<name>` or `skills.<name>` entry to
//! a constructor. Modules are registered by type, so a new variant is added by
//! implementing [`ConfigurableConnector`] or [`ConfigurableSkill`] and calling
//! [`ModuleRegistry::register_connector`] / [`ModuleRegistry::register_skill`].
//!
//! ```rust,ignore
//! let modules = ModuleRegistry::new()
//!     .with_builtin_skills()
//!     .with_connector::<RestConnector>();
//! ```

use std::collections::HashMap;

use opsdroid_core::{BoxedConnector, ConfigurableConnector, ConfigurableSkill, Skill};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::ModuleConfig;
use crate::error::LoadError;
use crate::skills::{EchoSkill, PingSkill};

type ConnectorFactory =
    Box<dyn Fn(&str, &ModuleConfig) -> Result<BoxedConnector, LoadError> + Send + Sync>;
type SkillFactory = Box<dyn Fn(&str, &ModuleConfig) -> Result<Vec<Skill>, LoadError> + Send + Sync>;

/// The closed set of connector and skill modules a runtime can load.
#[derive(Default)]
pub struct ModuleRegistry {
    connectors: HashMap<&'static str, ConnectorFactory>,
    skills: HashMap<&'static str, SkillFactory>,
}

impl ModuleRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the built-in `ping` and `echo` skills.
    pub fn with_builtin_skills(mut self) -> Self {
        self.register_skill::<PingSkill>();
        self.register_skill::<EchoSkill>();
        self
    }

    /// Registers a connector module, builder style.
    pub fn with_connector<C>(mut self) -> Self
    where
        C: ConfigurableConnector + 'static,
    {
        self.register_connector::<C>();
        self
    }

    /// Registers a skill module, builder style.
    pub fn with_skill<S>(mut self) -> Self
    where
        S: ConfigurableSkill + 'static,
    {
        self.register_skill::<S>();
        self
    }

    /// Registers a connector module under [`ConfigurableConnector::module`].
    ///
    /// A later registration under the same key replaces the earlier one.
    pub fn register_connector<C>(&mut self)
    where
        C: ConfigurableConnector + 'static,
    {
        let module = C::module();
        debug!(module, "Registered connector module");
        self.connectors.insert(
            module,
            Box::new(move |name, entry| {
                let config: C::Config = settings(name, module, entry)?;
                let connector = C::from_config(name, config).map_err(|e| LoadError::Module {
                    name: name.to_string(),
                    module: module.to_string(),
                    reason: format!("{e:#}"),
                })?;
                Ok(connector as BoxedConnector)
            }),
        );
    }

    /// Registers a skill module under [`ConfigurableSkill::module`].
    pub fn register_skill<S>(&mut self)
    where
        S: ConfigurableSkill + 'static,
    {
        let module = S::module();
        debug!(module, "Registered skill module");
        self.skills.insert(
            module,
            Box::new(move |name, entry| {
                let config: S::Config = settings(name, module, entry)?;
                let skills = S::build(name, config).map_err(|e| LoadError::Module {
                    name: name.to_string(),
                    module: module.to_string(),
                    reason: format!("{e:#}"),
                })?;
                Ok(skills
                    .into_iter()
                    .map(|skill| skill.with_module(module))
                    .collect())
            }),
        );
    }

    /// Builds the connector for one `connectors.<name>` entry.
    pub fn build_connector(&self, name: &str, entry: &ModuleConfig) -> Result<BoxedConnector, LoadError> {
        let module = entry.module_or(name);
        let factory = self
            .connectors
            .get(module)
            .ok_or_else(|| LoadError::UnknownConnector {
                name: name.to_string(),
                module: module.to_string(),
            })?;
        factory(name, entry)
    }

    /// Builds the skills of one `skills.<name>` entry.
    pub fn build_skills(&self, name: &str, entry: &ModuleConfig) -> Result<Vec<Skill>, LoadError> {
        let module = entry.module_or(name);
        let factory = self
            .skills
            .get(module)
            .ok_or_else(|| LoadError::UnknownSkill {
                name: name.to_string(),
                module: module.to_string(),
            })?;
        factory(name, entry)
    }

    /// Returns the registered connector module keys, sorted.
    pub fn connector_modules(&self) -> Vec<&'static str> {
        let mut modules: Vec<_> = self.connectors.keys().copied().collect();
        modules.sort_unstable();
        modules
    }

    /// Returns the registered skill module keys, sorted.
    pub fn skill_modules(&self) -> Vec<&'static str> {
        let mut modules: Vec<_> = self.skills.keys().copied().collect();
        modules.sort_unstable();
        modules
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("connectors", &self.connector_modules())
            .field("skills", &self.skill_modules())
            .finish()
    }
}

/// Deserializes an entry's settings, using the config type's defaults for an
/// entry without settings.
fn settings<T>(name: &str, module: &str, entry: &ModuleConfig) -> Result<T, LoadError>
where
    T: DeserializeOwned + Default,
{
    if entry.settings.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_value(Value::Object(entry.settings.clone())).map_err(|e| {
        LoadError::InvalidConfig {
            name: name.to_string(),
            module: module.to_string(),
            reason: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opsdroid_core::Event;

    #[test]
    fn test_builtin_skills() {
        let modules = ModuleRegistry::new().with_builtin_skills();
        assert_eq!(modules.skill_modules(), vec!["echo", "ping"]);

        let skills = modules
            .build_skills("pinger", &ModuleConfig::new("ping"))
            .unwrap();
        assert_eq!(skills.len(), 1);
        assert_eq!(skills[0].module(), "ping");
        assert!(skills[0].matches(&Event::message("PING").build()));
    }

    #[test]
    fn test_entry_name_is_default_module() {
        let modules = ModuleRegistry::new().with_builtin_skills();
        let skills = modules.build_skills("echo", &ModuleConfig::default()).unwrap();
        assert_eq!(skills[0].name(), "echo");
    }

    #[test]
    fn test_unknown_modules() {
        let modules = ModuleRegistry::new();
        assert!(matches!(
            modules.build_skills("x", &ModuleConfig::new("nope")),
            Err(LoadError::UnknownSkill { ref module, .. }) if module == "nope"
        ));
        assert!(matches!(
            modules.build_connector("shell", &ModuleConfig::default()),
            Err(LoadError::UnknownConnector { ref module, .. }) if module == "shell"
        ));
    }

    #[test]
    fn test_invalid_settings() {
        let modules = ModuleRegistry::new().with_builtin_skills();
        let entry = ModuleConfig::new("echo").set("prefix", 42);
        assert!(matches!(
            modules.build_skills("echo", &entry),
            Err(LoadError::InvalidConfig { .. })
        ));
    }
}
