//! The loader facade.
//!
//! [`RemoteLoader`] owns one of each component (config store, injector,
//! container registry, resolver, fallbacks) and wires them together. It is
//! cheap to clone; clones share every cache. Separate loaders share
//! nothing, which keeps tests isolated from each other.

use std::sync::Arc;
use std::time::Duration;

use fedload_core::retry::{RetryPolicy, retry};
use tracing::{debug, info};

use crate::config::LoaderConfig;
use crate::config_store::{ConfigSource, ConfigStore};
use crate::error::{LoaderError, LoaderResult};
use crate::fallback::FallbackProvider;
use crate::handle::CapabilityHandle;
use crate::host::{HostRuntime, SharingScope};
use crate::injector::CodeInjector;
use crate::orchestrator::{LoadOrchestrator, LoadOutcome};
use crate::registry::ContainerRegistry;
use crate::resolver::CapabilityResolver;

/// Default overall load timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Defaults applied when the config document leaves a field out.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    /// Overall timeout for one load attempt (retries included).
    pub timeout: Duration,
    /// Retry policy for the inject → container → resolve pipeline.
    pub retry: RetryPolicy,
    /// Sharing scope passed to every container's `init`.
    pub sharing: SharingScope,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            sharing: SharingScope::default(),
        }
    }
}

/// Timeout and retry policy in effect for a load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadPolicy {
    /// Overall timeout.
    pub timeout: Duration,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl LoadPolicy {
    /// Settings overridden by whatever the document specifies.
    #[must_use]
    pub fn resolve(settings: &LoaderSettings, config: Option<&LoaderConfig>) -> Self {
        let mut policy = Self {
            timeout: settings.timeout,
            retry: settings.retry.clone(),
        };
        if let Some(config) = config {
            if let Some(timeout) = config.timeout {
                policy.timeout = timeout;
            }
            if let Some(attempts) = config.retry_attempts {
                policy.retry.max_attempts = attempts;
            }
            if let Some(delay) = config.retry_delay {
                policy.retry.delay = delay;
                policy.retry.max_delay = policy.retry.max_delay.max(delay);
            }
        }
        policy
    }
}

struct Inner {
    settings: LoaderSettings,
    config: ConfigStore,
    injector: Arc<CodeInjector>,
    registry: Arc<ContainerRegistry>,
    resolver: CapabilityResolver,
    fallbacks: FallbackProvider,
}

/// Loads remote capabilities with caching, retry, timeout and fallbacks.
#[derive(Clone)]
pub struct RemoteLoader {
    inner: Arc<Inner>,
}

impl RemoteLoader {
    /// Start building a loader over `host`, configured from `source`.
    #[must_use]
    pub fn builder(
        host: Arc<dyn HostRuntime>,
        source: Arc<dyn ConfigSource>,
    ) -> RemoteLoaderBuilder {
        RemoteLoaderBuilder {
            host,
            source,
            settings: LoaderSettings::default(),
            fallbacks: FallbackProvider::new(),
        }
    }

    /// The configuration document, fetched on first use.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::ConfigUnavailable`] if it could not be loaded.
    pub async fn config(&self) -> LoaderResult<Arc<LoaderConfig>> {
        self.inner.config.get().await
    }

    /// Defaults applied where the document is silent.
    #[must_use]
    pub fn settings(&self) -> &LoaderSettings {
        &self.inner.settings
    }

    /// Policy for a load: the document's values over the settings.
    ///
    /// Fetches the document if needed. When it is unavailable the settings
    /// apply unchanged and the load itself reports the failure.
    pub async fn load_policy(&self) -> LoadPolicy {
        let config = self.config().await.ok();
        LoadPolicy::resolve(&self.inner.settings, config.as_deref())
    }

    /// The fallback provider.
    #[must_use]
    pub fn fallbacks(&self) -> &FallbackProvider {
        &self.inner.fallbacks
    }

    /// One pipeline attempt: config, then inject, container and resolve.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage, unchanged.
    pub async fn resolve(&self, remote: &str, capability: &str) -> LoaderResult<CapabilityHandle> {
        let config = self.config().await?;
        let descriptor = config.remote(remote)?;
        self.inner.resolver.resolve(descriptor, capability).await
    }

    /// [`resolve`](Self::resolve) under `policy`, without timeout or fallback.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt, unchanged.
    pub async fn load_with_retry(
        &self,
        remote: &str,
        capability: &str,
        policy: &RetryPolicy,
    ) -> LoaderResult<CapabilityHandle> {
        retry(
            policy,
            |attempt| {
                debug!(remote, capability, attempt = attempt.saturating_add(1), "load attempt");
                self.resolve(remote, capability)
            },
            LoaderError::is_transient,
        )
        .await
        .into_result()
    }

    /// A fresh orchestrator for `remote/capability`.
    #[must_use]
    pub fn orchestrator(&self, remote: &str, capability: &str) -> LoadOrchestrator {
        LoadOrchestrator::new(self.clone(), remote, capability)
    }

    /// Load `capability` from `remote`, always yielding a usable handle.
    ///
    /// Use [`load_capability_with`](Self::load_capability_with) or
    /// [`orchestrator`](Self::orchestrator) to observe the error behind a
    /// degraded outcome as it happens.
    pub async fn load_capability(&self, remote: &str, capability: &str) -> LoadOutcome {
        self.orchestrator(remote, capability).load().await
    }

    /// [`load_capability`](Self::load_capability), reporting the terminal
    /// error to `on_error` if the load degrades.
    pub async fn load_capability_with(
        &self,
        remote: &str,
        capability: &str,
        on_error: impl Fn(&LoaderError) + Send + Sync + 'static,
    ) -> LoadOutcome {
        self.orchestrator(remote, capability)
            .on_error(on_error)
            .load()
            .await
    }

    /// Inject and initialize `remote`'s container ahead of first use.
    ///
    /// # Errors
    ///
    /// Returns config, injection or container errors unchanged.
    pub async fn preload_remote(&self, remote: &str) -> LoaderResult<()> {
        let config = self.config().await?;
        let descriptor = config.remote(remote)?;
        self.inner.registry.get_container(descriptor).await?;
        info!(remote, "remote preloaded");
        Ok(())
    }

    /// Cached handle for `remote/capability`, if resolved.
    #[must_use]
    pub fn cached_handle(&self, remote: &str, capability: &str) -> Option<CapabilityHandle> {
        self.inner.resolver.cached(remote, capability)
    }

    /// Drop the config document and every cache.
    ///
    /// The next load refetches the document and re-activates bundles.
    pub fn clear_caches(&self) {
        self.inner.config.invalidate();
        self.inner.resolver.clear();
        self.inner.registry.clear();
        self.inner.injector.clear();
        info!("loader caches cleared");
    }
}

impl std::fmt::Debug for RemoteLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLoader")
            .field("settings", &self.inner.settings)
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("resolver", &self.inner.resolver)
            .field("fallbacks", &self.inner.fallbacks)
            .finish()
    }
}

/// Builder for [`RemoteLoader`].
pub struct RemoteLoaderBuilder {
    host: Arc<dyn HostRuntime>,
    source: Arc<dyn ConfigSource>,
    settings: LoaderSettings,
    fallbacks: FallbackProvider,
}

impl RemoteLoaderBuilder {
    /// Use `settings` for defaults.
    #[must_use]
    pub fn settings(mut self, settings: LoaderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Use `fallbacks` instead of the built-in provider.
    #[must_use]
    pub fn fallbacks(mut self, fallbacks: FallbackProvider) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Build the loader.
    #[must_use]
    pub fn build(self) -> RemoteLoader {
        let injector = Arc::new(CodeInjector::new(Arc::clone(&self.host)));
        let registry = Arc::new(ContainerRegistry::new(
            self.host,
            Arc::clone(&injector),
            self.settings.sharing.clone(),
        ));
        let resolver = CapabilityResolver::new(Arc::clone(&registry));

        RemoteLoader {
            inner: Arc::new(Inner {
                settings: self.settings,
                config: ConfigStore::new(self.source),
                injector,
                registry,
                resolver,
                fallbacks: self.fallbacks,
            }),
        }
    }
}
