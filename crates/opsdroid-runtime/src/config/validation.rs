//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{DispatcherSettings, LogOutput, LoggingConfig, ModuleConfig, OpsDroidConfig};
use std::collections::BTreeMap;

/// Validates the entire configuration.
pub fn validate_config(config: &OpsDroidConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_dispatcher_config(&config.dispatcher)?;
    validate_web_host(&config.web.host)?;
    validate_entries("connectors", &config.connectors)?;
    validate_entries("skills", &config.skills)?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if logging.filters.keys().any(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter targets cannot be empty"));
    }

    Ok(())
}

/// Validates dispatcher tuning.
fn validate_dispatcher_config(dispatcher: &DispatcherSettings) -> ConfigResult<()> {
    if dispatcher.grace_period_ms == 0 {
        return Err(ConfigError::validation(
            "Dispatcher grace period must be greater than 0",
        ));
    }

    if dispatcher.channel_capacity == 0 {
        return Err(ConfigError::validation(
            "Dispatcher channel capacity must be greater than 0",
        ));
    }

    Ok(())
}

fn validate_web_host(host: &str) -> ConfigResult<()> {
    if host.trim().is_empty() {
        return Err(ConfigError::missing_field("web.host"));
    }
    Ok(())
}

/// Validates connector or skill entries.
fn validate_entries(section: &str, entries: &BTreeMap<String, ModuleConfig>) -> ConfigResult<()> {
    for (name, entry) in entries {
        if name.trim().is_empty() {
            return Err(ConfigError::validation(format!(
                "Entry names in [{section}] cannot be empty"
            )));
        }

        if name.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Entry name '{name}' in [{section}] cannot contain whitespace"
            )));
        }

        if entry.module.trim() != entry.module {
            return Err(ConfigError::validation(format!(
                "Module of '{name}' in [{section}] has surrounding whitespace"
            )));
        }
    }

    Ok(())
}
