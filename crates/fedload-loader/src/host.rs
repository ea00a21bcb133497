//! Seams between the loader and the runtime that executes remote code.
//!
//! A [`HostRuntime`] knows how to fetch and activate a bundle and keeps the
//! global scope → container table that activated bundles publish into. The
//! loader never talks to bundles directly; it only sees [`Container`]s.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::LoaderResult;
use crate::exports::ModuleExports;

/// Produces a module's exports when invoked.
pub type ModuleFactory = Arc<dyn Fn() -> ModuleExports + Send + Sync>;

/// Name of the sharing scope used when none is configured.
pub const DEFAULT_SHARING_SCOPE: &str = "default";

/// Namespace under which host and remotes negotiate shared dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingScope {
    name: String,
    shared: BTreeMap<String, String>,
}

impl SharingScope {
    /// An empty sharing scope.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: BTreeMap::new(),
        }
    }

    /// Offer a shared dependency at `version`.
    #[must_use]
    pub fn with_shared(mut self, dependency: impl Into<String>, version: impl Into<String>) -> Self {
        self.shared.insert(dependency.into(), version.into());
        self
    }

    /// Scope name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version offered for `dependency`, if shared.
    #[must_use]
    pub fn version_of(&self, dependency: &str) -> Option<&str> {
        self.shared.get(dependency).map(String::as_str)
    }

    /// All shared dependencies.
    pub fn shared(&self) -> impl Iterator<Item = (&str, &str)> {
        self.shared.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Default for SharingScope {
    fn default() -> Self {
        Self::new(DEFAULT_SHARING_SCOPE)
    }
}

/// The live object a remote exposes once its bundle is active.
#[async_trait]
pub trait Container: Send + Sync {
    /// Negotiate shared dependencies. Called once per container.
    async fn init(&self, sharing: &SharingScope) -> LoaderResult<()>;

    /// Factory for `module_key` (e.g. `./PostsList`), if exposed.
    async fn get(&self, module_key: &str) -> LoaderResult<Option<ModuleFactory>>;
}

impl fmt::Debug for dyn Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Container")
    }
}

/// Runtime that can activate remote bundles.
#[async_trait]
pub trait HostRuntime: Send + Sync {
    /// Fetch and activate the bundle at `url`.
    ///
    /// On success the bundle is expected to have published a container
    /// under its scope. Idempotency is the caller's concern.
    async fn activate(&self, url: &str) -> LoaderResult<()>;

    /// Container currently published under `scope`.
    fn container(&self, scope: &str) -> Option<Arc<dyn Container>>;
}

/// Registry key for a capability module inside a container.
#[must_use]
pub fn module_key(capability: &str) -> String {
    format!("./{capability}")
}
