//! The remote-capability configuration document.
//!
//! ```json
//! {
//!   "remotes": { "viewer": { "url": "https://cdn.example/remoteEntry.json", "scope": "viewerRemote" } },
//!   "timeout": 10000,
//!   "retryAttempts": 3,
//!   "retryDelay": 1000
//! }
//! ```
//!
//! Durations are milliseconds. Optional fields left out of the document fall
//! back to the loader's settings.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{LoaderError, LoaderResult};

/// Identifies one externally hosted capability source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescriptor {
    name: String,
    url: String,
    scope: String,
}

impl RemoteDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            scope: scope.into(),
        }
    }

    /// Remote name (the key in the `remotes` map).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Location of the remote's bundle.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Key the bundle publishes its container under.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

/// Parsed configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Configured remotes by name.
    pub remotes: BTreeMap<String, RemoteDescriptor>,
    /// Overall load timeout.
    pub timeout: Option<Duration>,
    /// Total tries per load.
    pub retry_attempts: Option<u32>,
    /// Delay between tries.
    pub retry_delay: Option<Duration>,
}

impl LoaderConfig {
    /// Descriptor for `remote`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::RemoteNotConfigured`] if the document has no
    /// such remote.
    pub fn remote(&self, remote: &str) -> LoaderResult<&RemoteDescriptor> {
        self.remotes
            .get(remote)
            .ok_or_else(|| LoaderError::RemoteNotConfigured {
                remote: remote.to_string(),
            })
    }

    /// Parse and validate a JSON document read from `source_name`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::ConfigUnavailable`] if the text is not JSON,
    /// lacks the `remotes` map, or a remote has an empty url or scope.
    pub fn from_json(source_name: &str, text: &str) -> LoaderResult<Self> {
        let document: ConfigDocument =
            serde_json::from_str(text).map_err(|e| LoaderError::config(source_name, e))?;

        let mut remotes = BTreeMap::new();
        for (name, entry) in document.remotes {
            if entry.url.trim().is_empty() {
                return Err(LoaderError::config(
                    source_name,
                    format!("remote '{name}' has an empty url"),
                ));
            }
            if entry.scope.trim().is_empty() {
                return Err(LoaderError::config(
                    source_name,
                    format!("remote '{name}' has an empty scope"),
                ));
            }
            let descriptor = RemoteDescriptor::new(name.clone(), entry.url, entry.scope);
            remotes.insert(name, descriptor);
        }

        Ok(Self {
            remotes,
            timeout: document.timeout.map(Duration::from_millis),
            retry_attempts: document.retry_attempts,
            retry_delay: document.retry_delay.map(Duration::from_millis),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigDocument {
    remotes: BTreeMap<String, RemoteEntry>,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    retry_attempts: Option<u32>,
    #[serde(default)]
    retry_delay: Option<u64>,
}

#[derive(Deserialize)]
struct RemoteEntry {
    url: String,
    scope: String,
}
