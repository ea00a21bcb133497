//! Settings struct definitions.
//!
//! Every section derives `Default` with the same values as the embedded
//! `defaults.toml`, so a partially specified file deserializes cleanly.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the remotes document comes from.
    pub source: SourceSection,
    /// Loader timeout, retry and sharing defaults.
    pub loader: LoaderSection,
    /// Logging output.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// SourceSection
// ---------------------------------------------------------------------------

/// Location of the remotes document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// HTTP(S) URL of the document.
    pub url: Option<String>,
    /// Local path of the document.
    pub path: Option<PathBuf>,
}

/// A resolved document location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    /// Fetch over HTTP(S).
    Url(String),
    /// Read from disk.
    Path(PathBuf),
}

impl SourceSection {
    /// The configured location, if any. Validation guarantees at most one.
    #[must_use]
    pub fn location(&self) -> Option<DocumentLocation> {
        match (&self.url, &self.path) {
            (Some(url), _) => Some(DocumentLocation::Url(url.clone())),
            (None, Some(path)) => Some(DocumentLocation::Path(path.clone())),
            (None, None) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// LoaderSection
// ---------------------------------------------------------------------------

/// Defaults used when the remotes document omits a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSection {
    /// Overall load timeout in milliseconds.
    pub timeout_ms: u64,
    /// Total tries per load, first included.
    pub retry_attempts: u32,
    /// Delay between tries in milliseconds.
    pub retry_delay_ms: u64,
    /// Delay multiplier per retry; `1.0` keeps the delay fixed.
    pub retry_backoff: f64,
    /// Upper bound on the delay in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Sharing scope name passed to container `init`.
    pub sharing_scope: String,
    /// Shared dependencies offered to remotes, name → version.
    pub shared: BTreeMap<String, String>,
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            retry_attempts: 1,
            retry_delay_ms: 1000,
            retry_backoff: 1.0,
            retry_max_delay_ms: 30_000,
            sharing_scope: "default".to_owned(),
            shared: BTreeMap::new(),
        }
    }
}

impl LoaderSection {
    /// Timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Retry delay as a [`Duration`].
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Retry delay cap as a [`Duration`].
    #[must_use]
    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate directives (e.g. `["fedload_loader=debug", "hyper=warn"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
