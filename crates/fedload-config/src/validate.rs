//! Post-merge settings validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Settings;

/// Upper bound on `loader.retry_attempts`.
const MAX_RETRY_ATTEMPTS: u32 = 100;

/// Validate fully merged settings.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(settings: &Settings) -> ConfigResult<()> {
    validate_source(settings)?;
    validate_loader(settings)?;
    validate_logging(settings)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_source(settings: &Settings) -> ConfigResult<()> {
    let s = &settings.source;

    if s.url.is_some() && s.path.is_some() {
        return Err(invalid("source", "set either `url` or `path`, not both"));
    }

    if let Some(url) = &s.url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        return Err(invalid(
            "source.url",
            format!("'{url}' is not an http(s) URL; use `source.path` for local files"),
        ));
    }

    Ok(())
}

fn validate_loader(settings: &Settings) -> ConfigResult<()> {
    let l = &settings.loader;

    if l.timeout_ms == 0 {
        return Err(invalid("loader.timeout_ms", "timeout must be greater than zero"));
    }

    if l.retry_attempts == 0 || l.retry_attempts > MAX_RETRY_ATTEMPTS {
        return Err(invalid(
            "loader.retry_attempts",
            format!("retry_attempts must be between 1 and {MAX_RETRY_ATTEMPTS}"),
        ));
    }

    if !l.retry_backoff.is_finite() || l.retry_backoff < 1.0 {
        return Err(invalid(
            "loader.retry_backoff",
            "retry_backoff must be a finite number of at least 1.0",
        ));
    }

    if l.retry_max_delay_ms < l.retry_delay_ms {
        return Err(invalid(
            "loader.retry_max_delay_ms",
            "retry_max_delay_ms must not be below retry_delay_ms",
        ));
    }

    if l.sharing_scope.trim().is_empty() {
        return Err(invalid("loader.sharing_scope", "sharing scope must not be empty"));
    }

    Ok(())
}

fn validate_logging(settings: &Settings) -> ConfigResult<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&settings.logging.level.as_str()) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported log level '{}'; expected one of: {}",
                settings.logging.level,
                valid_levels.join(", ")
            ),
        ));
    }

    let valid_formats = ["pretty", "compact", "json", "full"];
    if !valid_formats.contains(&settings.logging.format.as_str()) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported log format '{}'; expected one of: {}",
                settings.logging.format,
                valid_formats.join(", ")
            ),
        ));
    }

    Ok(())
}
