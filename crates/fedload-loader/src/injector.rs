//! Exactly-once activation of remote bundles.

use std::sync::Arc;

use fedload_core::FlightMap;
use tracing::{debug, info, warn};

use crate::error::{LoaderError, LoaderResult};
use crate::host::HostRuntime;

/// Activates each bundle URL at most once, however many callers ask.
///
/// Callers arriving while an activation is in flight await that same
/// activation. A failed activation is forgotten so the next call starts a
/// clean attempt.
pub struct CodeInjector {
    host: Arc<dyn HostRuntime>,
    injected: FlightMap<(), LoaderError>,
}

impl CodeInjector {
    /// Injector activating bundles through `host`.
    #[must_use]
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        Self {
            host,
            injected: FlightMap::new(),
        }
    }

    /// Ensure the bundle at `url` is active.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::InjectionFailed`] (or whatever the host
    /// reported) if activation failed.
    pub async fn inject(&self, url: &str) -> LoaderResult<()> {
        self.injected
            .run(url, || {
                let host = Arc::clone(&self.host);
                let url = url.to_string();
                async move {
                    debug!(url = %url, "injecting bundle");
                    match host.activate(&url).await {
                        Ok(()) => {
                            info!(url = %url, "bundle injected");
                            Ok(())
                        },
                        Err(e) => {
                            warn!(url = %url, error = %e, "bundle injection failed");
                            Err(e)
                        },
                    }
                }
            })
            .await
    }

    /// Whether the bundle at `url` has been activated.
    #[must_use]
    pub fn is_injected(&self, url: &str) -> bool {
        self.injected.get(url).is_some()
    }

    /// Forget every activation record.
    pub fn clear(&self) {
        self.injected.clear();
    }
}

impl std::fmt::Debug for CodeInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeInjector")
            .field("injected", &self.injected)
            .finish_non_exhaustive()
    }
}
