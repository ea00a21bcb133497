//! Settings file discovery and layered loading.
//!
//! 1. Parse the embedded `defaults.toml`
//! 2. Merge the user file (`<config dir>/config.toml`)
//! 3. Merge the explicit file passed on the command line
//! 4. Apply `FEDLOAD_*` fallbacks for fields no file set
//! 5. Deserialize and validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{SetFields, deep_merge_tracking};
use crate::types::Settings;
use crate::validate;

/// Embedded default settings.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Maximum allowed settings file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Settings together with the files they were read from.
#[derive(Debug, Clone)]
pub struct ResolvedSettings {
    /// The merged, validated settings.
    pub settings: Settings,
    /// Files merged on top of the defaults, in order.
    pub loaded_files: Vec<String>,
}

/// Load settings with the full precedence chain.
///
/// `explicit` is a file that must exist (typically `--config`).
/// `config_dir_override` replaces the platform user config directory.
///
/// # Errors
///
/// Returns a [`ConfigError`] if a file is unreadable or malformed, or if the
/// merged settings fail validation.
pub fn load(
    explicit: Option<&Path>,
    config_dir_override: Option<&Path>,
) -> ConfigResult<ResolvedSettings> {
    let config_dir = match config_dir_override {
        Some(dir) => Some(dir.to_path_buf()),
        None => user_config_dir().ok(),
    };
    load_with_env(explicit, config_dir.as_deref(), &collect_env_vars())
}

/// [`load`] with an explicit user directory and environment.
///
/// # Errors
///
/// Same as [`load`].
pub fn load_with_env<S: ::std::hash::BuildHasher>(
    explicit: Option<&Path>,
    config_dir: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedSettings> {
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;
    let mut set = SetFields::new();
    let mut loaded_files = Vec::new();

    if let Some(dir) = config_dir {
        let user_path = dir.join("config.toml");
        if let Some(overlay) = try_load_file(&user_path)? {
            deep_merge_tracking(&mut merged, &overlay, "", &mut set);
            loaded_files.push(user_path.display().to_string());
            info!(path = %user_path.display(), "loaded user config");
        }
    }

    if let Some(path) = explicit {
        let overlay = try_load_file(path)?.ok_or_else(|| ConfigError::ReadError {
            path: path.display().to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })?;
        deep_merge_tracking(&mut merged, &overlay, "", &mut set);
        loaded_files.push(path.display().to_string());
        info!(path = %path.display(), "loaded config file");
    }

    let env_count = apply_env_fallbacks(&mut merged, &mut set, env_vars);
    if env_count > 0 {
        debug!(count = env_count, "applied environment variable fallbacks");
    }

    let settings: Settings =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    validate::validate(&settings)?;

    Ok(ResolvedSettings {
        settings,
        loaded_files,
    })
}

/// Load settings from one file, without layering or env fallbacks.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_file(path: &Path) -> ConfigResult<Settings> {
    let content = read_bounded(path)?;
    let settings: Settings = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    validate::validate(&settings)?;
    Ok(settings)
}

/// The platform user config directory for fedload.
///
/// # Errors
///
/// Returns [`ConfigError::NoConfigDir`] if the platform has none.
pub fn user_config_dir() -> ConfigResult<PathBuf> {
    directories::ProjectDirs::from("dev", "fedload", "fedload")
        .map(|d| d.config_dir().to_path_buf())
        .ok_or(ConfigError::NoConfigDir)
}

fn read_bounded(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    check_size(path, &content)?;
    Ok(content)
}

fn check_size(path: &Path, content: &str) -> ConfigResult<()> {
    let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {size} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit"
            ),
        });
    }
    Ok(())
}

/// Read and parse `path`, returning `None` if it does not exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };
    check_size(path, &content)?;

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentLocation;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn defaults_match_default_impl() {
        let parsed: Settings = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(parsed, Settings::default());
    }

    #[test]
    fn loads_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_with_env(None, Some(dir.path()), &no_env()).unwrap();
        assert_eq!(resolved.settings, Settings::default());
        assert!(resolved.loaded_files.is_empty());
    }

    #[test]
    fn explicit_file_overrides_user_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[loader]\nretry_attempts = 2\ntimeout_ms = 4000\n",
        )
        .unwrap();
        let explicit = dir.path().join("ci.toml");
        std::fs::write(&explicit, "[loader]\nretry_attempts = 5\n").unwrap();

        let resolved = load_with_env(Some(&explicit), Some(dir.path()), &no_env()).unwrap();

        assert_eq!(resolved.settings.loader.retry_attempts, 5);
        assert_eq!(resolved.settings.loader.timeout_ms, 4000);
        assert_eq!(resolved.loaded_files.len(), 2);
    }

    #[test]
    fn env_only_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[logging]\nlevel = \"warn\"\n").unwrap();
        let env: HashMap<String, String> = [
            ("FEDLOAD_LOG_LEVEL", "trace"),
            ("FEDLOAD_CONFIG_PATH", "/srv/remotes.json"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let settings = load_with_env(None, Some(dir.path()), &env).unwrap().settings;

        assert_eq!(settings.logging.level, "warn");
        assert_eq!(
            settings.source.location(),
            Some(DocumentLocation::Path(PathBuf::from("/srv/remotes.json")))
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_with_env(
            Some(Path::new("/nonexistent/fedload.toml")),
            Some(dir.path()),
            &no_env(),
        );
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn invalid_merged_settings_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[loader]\nretry_attempts = 0\n").unwrap();
        let result = load_with_env(None, Some(dir.path()), &no_env());
        assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[loader\n").unwrap();
        assert!(matches!(load_file(&path), Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn oversized_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&path, data).unwrap();
        assert!(matches!(
            try_load_file(&path),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
