//! Container registry.
//!
//! Holds one initialized [`Container`] per remote scope. The first request
//! for a scope injects the remote's bundle, looks the container up in the
//! host's global table and runs `init` with the loader's sharing scope;
//! everybody else gets the cached container.

use std::sync::Arc;

use fedload_core::FlightMap;
use tracing::{debug, info};

use crate::config::RemoteDescriptor;
use crate::error::{LoaderError, LoaderResult};
use crate::host::{Container, HostRuntime, SharingScope};
use crate::injector::CodeInjector;

/// Scope-keyed cache of initialized containers.
pub struct ContainerRegistry {
    host: Arc<dyn HostRuntime>,
    injector: Arc<CodeInjector>,
    sharing: SharingScope,
    containers: FlightMap<Arc<dyn Container>, LoaderError>,
}

impl ContainerRegistry {
    /// Registry resolving containers published into `host`.
    #[must_use]
    pub fn new(
        host: Arc<dyn HostRuntime>,
        injector: Arc<CodeInjector>,
        sharing: SharingScope,
    ) -> Self {
        Self {
            host,
            injector,
            sharing,
            containers: FlightMap::new(),
        }
    }

    /// The initialized container for `remote`.
    ///
    /// # Errors
    ///
    /// - [`LoaderError::InjectionFailed`] if the bundle could not be activated
    /// - [`LoaderError::ContainerNotFound`] if it activated but published
    ///   nothing under `remote.scope()`
    /// - [`LoaderError::ContainerInitFailed`] if `init` failed
    pub async fn get_container(
        &self,
        remote: &RemoteDescriptor,
    ) -> LoaderResult<Arc<dyn Container>> {
        self.containers
            .run(remote.scope(), || {
                let host = Arc::clone(&self.host);
                let injector = Arc::clone(&self.injector);
                let sharing = self.sharing.clone();
                let remote = remote.clone();
                async move {
                    injector.inject(remote.url()).await?;

                    let container = host.container(remote.scope()).ok_or_else(|| {
                        LoaderError::ContainerNotFound {
                            scope: remote.scope().to_string(),
                        }
                    })?;

                    debug!(
                        remote = remote.name(),
                        scope = remote.scope(),
                        sharing = sharing.name(),
                        "initializing container"
                    );
                    container
                        .init(&sharing)
                        .await
                        .map_err(|e| init_failed(remote.scope(), e))?;

                    info!(remote = remote.name(), scope = remote.scope(), "container ready");
                    Ok(container)
                }
            })
            .await
    }

    /// Cached container for `scope`, if already initialized.
    #[must_use]
    pub fn cached(&self, scope: &str) -> Option<Arc<dyn Container>> {
        self.containers.get(scope)
    }

    /// Number of initialized containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.ready_count()
    }

    /// Whether no container has been initialized yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every cached container.
    pub fn clear(&self) {
        self.containers.clear();
    }
}

fn init_failed(scope: &str, error: LoaderError) -> LoaderError {
    let reason = match error {
        LoaderError::ContainerInitFailed { reason, .. } => reason,
        other => other.to_string(),
    };
    LoaderError::ContainerInitFailed {
        scope: scope.to_string(),
        reason,
    }
}

impl std::fmt::Debug for ContainerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerRegistry")
            .field("sharing", &self.sharing.name())
            .field("containers", &self.containers)
            .finish_non_exhaustive()
    }
}
