//! Configuration validation utilities.

use std::collections::HashSet;
use std::str::FromStr;

use arbor_core::CommandScope;
use tracing::level_filters::LevelFilter;

use super::error::{ConfigError, ConfigResult};
use super::schema::{ArborConfig, CommandsConfig, FrameworkConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &ArborConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_framework_config(&config.framework)?;
    validate_commands_config(&config.commands)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    for (target, level) in &logging.filters {
        if target.trim().is_empty() {
            return Err(ConfigError::validation("Log filter target must not be empty"));
        }
        if LevelFilter::from_str(level).is_err() {
            return Err(ConfigError::invalid_log_level(target, level));
        }
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_framework_config(framework: &FrameworkConfig) -> ConfigResult<()> {
    if framework.state_ttl_ms == 0 {
        return Err(ConfigError::validation(
            "State TTL must be greater than 0",
        ));
    }

    if framework.handler_timeout_ms == Some(0) {
        return Err(ConfigError::validation(
            "Handler timeout must be greater than 0 when set",
        ));
    }

    let mut seen = HashSet::new();
    for developer in &framework.developers {
        if !seen.insert(developer) {
            return Err(ConfigError::DuplicateDeveloper(*developer));
        }
    }

    Ok(())
}

fn validate_commands_config(commands: &CommandsConfig) -> ConfigResult<()> {
    if let CommandScope::Guilds { ids } = &commands.scope
        && ids.is_empty()
    {
        return Err(ConfigError::validation(
            "Guild command scope requires at least one guild id",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::Snowflake;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ArborConfig::default()).is_ok());
    }

    #[test]
    fn test_unknown_filter_level() {
        let mut config = ArborConfig::default();
        config
            .logging
            .filters
            .insert("arbor_framework".into(), "loud".into());

        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel { ref value, .. } if value == "loud"));
    }

    #[test]
    fn test_known_filter_levels() {
        let mut config = ArborConfig::default();
        config.logging.filters.insert("a".into(), "off".into());
        config.logging.filters.insert("b".into(), "TRACE".into());

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = ArborConfig::default();
        config.logging.output = LogOutput::File;

        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_zero_durations() {
        let mut config = ArborConfig::default();
        config.framework.state_ttl_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = ArborConfig::default();
        config.framework.handler_timeout_ms = Some(0);
        assert!(validate_config(&config).is_err());

        config.framework.handler_timeout_ms = Some(1);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_duplicate_developer() {
        let mut config = ArborConfig::default();
        config.framework.developers = vec![Snowflake(1), Snowflake(2), Snowflake(1)];

        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateDeveloper(Snowflake(1)))
        ));
    }

    #[test]
    fn test_empty_guild_scope() {
        let mut config = ArborConfig::default();
        config.commands.scope = CommandScope::Guilds { ids: Vec::new() };
        assert!(validate_config(&config).is_err());

        config.commands.scope = CommandScope::Guilds {
            ids: vec![Snowflake(7)],
        };
        assert!(validate_config(&config).is_ok());
    }
}
