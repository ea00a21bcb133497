//! Conversion from `fedload_config::Settings` to loader and telemetry types.

use std::sync::Arc;

use anyhow::{Result, bail};
use fedload_config::{DocumentLocation, Settings};
use fedload_loader::{
    ConfigSource, FileConfigSource, HttpConfigSource, LoaderSettings, RetryPolicy, SharingScope,
};
use fedload_telemetry::{LogConfig, LogFormat};

/// Logging setup described by `[logging]`.
#[must_use]
pub fn to_log_config(settings: &Settings) -> LogConfig {
    let logging = &settings.logging;
    let mut config = LogConfig::new(logging.level.clone())
        .with_format(logging.format.parse().unwrap_or(LogFormat::Compact));
    for directive in &logging.directives {
        config = config.with_directive(directive.clone());
    }
    config
}

/// Loader defaults described by `[loader]`.
#[must_use]
pub fn to_loader_settings(settings: &Settings) -> LoaderSettings {
    let loader = &settings.loader;
    let sharing = loader.shared.iter().fold(
        SharingScope::new(loader.sharing_scope.clone()),
        |scope, (dependency, version)| scope.with_shared(dependency.clone(), version.clone()),
    );

    LoaderSettings {
        timeout: loader.timeout(),
        retry: RetryPolicy::fixed(loader.retry_attempts, loader.retry_delay())
            .with_backoff(loader.retry_backoff, loader.retry_max_delay()),
        sharing,
    }
}

/// Where to fetch the remotes document from, per `[source]`.
///
/// # Errors
///
/// Fails if no location is configured.
pub fn config_source(settings: &Settings) -> Result<Arc<dyn ConfigSource>> {
    match settings.source.location() {
        Some(DocumentLocation::Url(url)) => Ok(Arc::new(HttpConfigSource::new(url))),
        Some(DocumentLocation::Path(path)) => Ok(Arc::new(FileConfigSource::new(path))),
        None => bail!(
            "no remotes document configured; set `source.url` or `source.path`, \
             or FEDLOAD_CONFIG_URL / FEDLOAD_CONFIG_PATH"
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;

    #[test]
    fn loader_settings_follow_section() {
        let mut settings = Settings::default();
        settings.loader.timeout_ms = 2500;
        settings.loader.retry_attempts = 3;
        settings.loader.retry_delay_ms = 200;
        settings.loader.sharing_scope = "app".to_owned();
        settings
            .loader
            .shared
            .insert("renderer".to_owned(), "18.2.0".to_owned());

        let loader = to_loader_settings(&settings);

        assert_eq!(loader.timeout, Duration::from_millis(2500));
        assert_eq!(loader.retry.attempts(), 3);
        assert_eq!(loader.retry.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(loader.sharing.name(), "app");
        assert_eq!(loader.sharing.version_of("renderer"), Some("18.2.0"));
    }

    #[test]
    fn log_config_follows_section() {
        let mut settings = Settings::default();
        settings.logging.level = "debug".to_owned();
        settings.logging.format = "json".to_owned();
        settings.logging.directives = vec!["reqwest=warn".to_owned()];

        let log = to_log_config(&settings);
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.directives, vec!["reqwest=warn"]);
    }

    #[test]
    fn source_requires_location() {
        assert!(config_source(&Settings::default()).is_err());

        let mut settings = Settings::default();
        settings.source.path = Some(PathBuf::from("remotes.json"));
        assert_eq!(config_source(&settings).unwrap().describe(), "remotes.json");
    }
}
