//! Built-in skill modules.

use opsdroid_core::matcher::{match_prefix, match_text};
use opsdroid_core::{ConfigurableSkill, Skill, SkillContext};
use serde::Deserialize;

/// Settings of the `ping` module.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PingConfig {
    /// The reply sent to `ping`.
    pub reply: String,
}

impl Default for PingConfig {
    fn default() -> Self {
        Self {
            reply: "pong".to_string(),
        }
    }
}

/// Replies `pong` to `ping`.
pub struct PingSkill;

impl ConfigurableSkill for PingSkill {
    type Config = PingConfig;

    fn module() -> &'static str {
        "ping"
    }

    fn build(name: &str, config: PingConfig) -> anyhow::Result<Vec<Skill>> {
        let skill = Skill::new(name, match_text("ping"), move |ctx: SkillContext| {
            let reply = config.reply.clone();
            async move {
                ctx.respond(reply).await?;
                Ok(())
            }
        });
        Ok(vec![skill])
    }
}

/// Settings of the `echo` module.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// The command prefix, including its trailing space.
    pub prefix: String,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            prefix: "echo ".to_string(),
        }
    }
}

/// Replies with whatever follows `echo `.
pub struct EchoSkill;

impl ConfigurableSkill for EchoSkill {
    type Config = EchoConfig;

    fn module() -> &'static str {
        "echo"
    }

    fn build(name: &str, config: EchoConfig) -> anyhow::Result<Vec<Skill>> {
        anyhow::ensure!(!config.prefix.is_empty(), "echo prefix cannot be empty");

        let prefix = config.prefix;
        let skill = Skill::new(name, match_prefix(prefix.clone()), move |ctx: SkillContext| {
            let prefix = prefix.clone();
            async move {
                let text = ctx.text().unwrap_or_default();
                let rest = text.strip_prefix(prefix.as_str()).unwrap_or(text).trim();
                if !rest.is_empty() {
                    ctx.respond(rest).await?;
                }
                Ok(())
            }
        });
        Ok(vec![skill])
    }
}
