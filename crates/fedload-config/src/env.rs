//! Environment variable fallbacks.
//!
//! `FEDLOAD_*` variables are a fallback, not an override: they only fill
//! fields that no settings file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::SetFields;

/// Mapping from environment variable name to settings field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: ValueKind,
}

#[derive(Clone, Copy)]
enum ValueKind {
    String,
    Integer,
    Float,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "FEDLOAD_CONFIG_URL",
        field_path: "source.url",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "FEDLOAD_CONFIG_PATH",
        field_path: "source.path",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "FEDLOAD_TIMEOUT_MS",
        field_path: "loader.timeout_ms",
        kind: ValueKind::Integer,
    },
    EnvMapping {
        var_name: "FEDLOAD_RETRY_ATTEMPTS",
        field_path: "loader.retry_attempts",
        kind: ValueKind::Integer,
    },
    EnvMapping {
        var_name: "FEDLOAD_RETRY_DELAY_MS",
        field_path: "loader.retry_delay_ms",
        kind: ValueKind::Integer,
    },
    EnvMapping {
        var_name: "FEDLOAD_RETRY_BACKOFF",
        field_path: "loader.retry_backoff",
        kind: ValueKind::Float,
    },
    EnvMapping {
        var_name: "FEDLOAD_SHARING_SCOPE",
        field_path: "loader.sharing_scope",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "FEDLOAD_LOG_LEVEL",
        field_path: "logging.level",
        kind: ValueKind::String,
    },
    EnvMapping {
        var_name: "FEDLOAD_LOG_FORMAT",
        field_path: "logging.format",
        kind: ValueKind::String,
    },
];

/// Apply environment fallbacks to fields no file layer set.
///
/// Returns the number of variables applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    merged: &mut toml::Value,
    set: &mut SetFields,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut count: usize = 0;

    for mapping in ENV_MAPPINGS {
        if set.contains(mapping.field_path) {
            continue;
        }

        if let Some(val) = env_vars.get(mapping.var_name) {
            debug!(
                var = mapping.var_name,
                field = mapping.field_path,
                "applying env var fallback"
            );
            set_field(merged, mapping.field_path, coerce(mapping.kind, val));
            set.insert(mapping.field_path.to_owned());
            count = count.saturating_add(1);
        }
    }

    count
}

/// Collect the current environment into a map.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Numbers that fail to parse stay strings, so deserialization reports them.
fn coerce(kind: ValueKind, val: &str) -> toml::Value {
    match kind {
        ValueKind::Integer => val
            .parse::<i64>()
            .map_or_else(|_| toml::Value::String(val.to_owned()), toml::Value::Integer),
        ValueKind::Float => val
            .parse::<f64>()
            .map_or_else(|_| toml::Value::String(val.to_owned()), toml::Value::Float),
        ValueKind::String => toml::Value::String(val.to_owned()),
    }
}

fn set_field(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut segments: Vec<&str> = path.split('.').collect();
    let Some(leaf) = segments.pop() else {
        return;
    };

    let mut current = root;
    for segment in segments {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }

    if let Some(table) = current.as_table_mut() {
        table.insert(leaf.to_owned(), value);
    }
}
