//! Configuration validation utilities.

use super::error::{ConfigError, ConfigResult};
use super::schema::{LifecycleConfig, LogOutput, LoggingConfig, SwitchyardConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &SwitchyardConfig) -> ConfigResult<()> {
    validate_logging_config(&config.logging)?;
    validate_lifecycle_config(&config.lifecycle)?;
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    if let Some(path) = &logging.file_path
        && path.file_name().is_none()
    {
        return Err(ConfigError::validation(format!(
            "Log file path must name a file: {}",
            path.display()
        )));
    }

    for module in logging.filters.keys() {
        if module.is_empty() || module.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid module in log filters: {module:?}"
            )));
        }
    }

    Ok(())
}

fn validate_lifecycle_config(lifecycle: &LifecycleConfig) -> ConfigResult<()> {
    if !lifecycle.time_scale.is_finite() || lifecycle.time_scale < 0.0 {
        return Err(ConfigError::validation(format!(
            "Time scale must be a finite, non-negative number, got {}",
            lifecycle.time_scale
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&SwitchyardConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_file_output_needs_path() {
        let mut config = SwitchyardConfig::default();
        config.logging.output = LogOutput::File;
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::MissingField { field }) if field == "logging.file_path"));

        config.logging.file_path = Some("logs/switchyard.log".into());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_time_scale() {
        let mut config = SwitchyardConfig::default();
        config.lifecycle.time_scale = -1.0;
        assert!(validate_config(&config).is_err());

        config.lifecycle.time_scale = f32::NAN;
        assert!(validate_config(&config).is_err());

        config.lifecycle.time_scale = 0.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_filter_modules() {
        let mut config = SwitchyardConfig::default();
        config
            .logging
            .filters
            .insert("switchyard core".to_string(), Default::default());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
