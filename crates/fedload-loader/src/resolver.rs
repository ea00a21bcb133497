//! Capability resolution.
//!
//! Turns `(remote, capability)` into a cached [`CapabilityHandle`]: get the
//! remote's container, ask it for the `./<capability>` factory, invoke the
//! factory and pick the export according to
//! [`RESOLUTION_ORDER`](crate::exports::RESOLUTION_ORDER).

use std::sync::Arc;

use fedload_core::FlightMap;
use tracing::{debug, info};

use crate::config::RemoteDescriptor;
use crate::error::{LoaderError, LoaderResult};
use crate::handle::CapabilityHandle;
use crate::host::module_key;
use crate::registry::ContainerRegistry;

/// Cache key for a resolved capability.
fn handle_key(remote: &str, capability: &str) -> String {
    format!("{remote}/{capability}")
}

/// Resolves and caches capability handles.
pub struct CapabilityResolver {
    registry: Arc<ContainerRegistry>,
    handles: FlightMap<CapabilityHandle, LoaderError>,
}

impl CapabilityResolver {
    /// Resolver drawing containers from `registry`.
    #[must_use]
    pub fn new(registry: Arc<ContainerRegistry>) -> Self {
        Self {
            registry,
            handles: FlightMap::new(),
        }
    }

    /// Handle for `capability` exposed by `remote`.
    ///
    /// A successful resolution is cached for the lifetime of the resolver;
    /// later calls return the identical handle.
    ///
    /// # Errors
    ///
    /// Propagates container errors unchanged, and returns
    /// [`LoaderError::CapabilityMissing`] if the container has no factory for
    /// the capability or the module exports nothing usable.
    pub async fn resolve(
        &self,
        remote: &RemoteDescriptor,
        capability: &str,
    ) -> LoaderResult<CapabilityHandle> {
        let key = handle_key(remote.name(), capability);
        self.handles
            .run(&key, || {
                let registry = Arc::clone(&self.registry);
                let remote = remote.clone();
                let capability = capability.to_string();
                async move {
                    let container = registry.get_container(&remote).await?;
                    let missing = || LoaderError::CapabilityMissing {
                        remote: remote.name().to_string(),
                        capability: capability.clone(),
                    };

                    let factory = container
                        .get(&module_key(&capability))
                        .await?
                        .ok_or_else(missing)?;

                    let exports = factory();
                    let (slot, handle) = exports.select(&capability).ok_or_else(missing)?;

                    debug!(
                        remote = remote.name(),
                        capability = %capability,
                        ?slot,
                        "selected export"
                    );
                    info!(remote = remote.name(), capability = %capability, "capability resolved");
                    Ok(handle)
                }
            })
            .await
    }

    /// Cached handle for `remote/capability`, if resolved.
    #[must_use]
    pub fn cached(&self, remote: &str, capability: &str) -> Option<CapabilityHandle> {
        self.handles.get(&handle_key(remote, capability))
    }

    /// Forget every cached handle.
    pub fn clear(&self) {
        self.handles.clear();
    }
}

impl std::fmt::Debug for CapabilityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityResolver")
            .field("handles", &self.handles)
            .finish_non_exhaustive()
    }
}
