//! Caller-facing load state machine.
//!
//! ```text
//! Idle ──load──▶ Loading ──pipeline ok──▶ Ready(handle)
//!                   │
//!                   └──error / timeout──▶ Degraded(error, fallback) ──retry──▶ Loading
//! ```
//!
//! Each load first fetches the config document, whose `timeout` and retry
//! fields then govern the rest of the load. The retried pipeline runs as a
//! spawned task raced against that timeout, measured from the start of the
//! load. Whichever settles first decides the state. When the timer wins, the
//! task is detached rather than aborted: it keeps warming the shared
//! caches, but its result is dropped. Last state change wins, stale
//! successes are dropped.

use std::fmt;

use tokio::sync::watch;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::{LoaderError, LoaderResult};
use crate::handle::CapabilityHandle;
use crate::loader::RemoteLoader;

/// Callback invoked with the terminal error on each entry into `Degraded`.
pub type ErrorCallback = Box<dyn Fn(&LoaderError) + Send + Sync>;

/// State of one logical load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing requested yet.
    Idle,
    /// A pipeline attempt is running.
    Loading,
    /// The remote capability resolved.
    Ready(CapabilityHandle),
    /// The remote pipeline failed or timed out; a fallback stands in.
    Degraded {
        /// Terminal error.
        error: LoaderError,
        /// Local substitute.
        fallback: CapabilityHandle,
    },
}

impl LoadState {
    /// Whether the state is `Ready` or `Degraded`.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready(_) | Self::Degraded { .. })
    }
}

/// Result of a load: always carries a usable handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The remote capability.
    Ready(CapabilityHandle),
    /// A fallback, with the error that forced it.
    Degraded {
        /// Terminal error.
        error: LoaderError,
        /// Local substitute.
        fallback: CapabilityHandle,
    },
}

impl LoadOutcome {
    /// The handle to use, remote or fallback.
    #[must_use]
    pub fn handle(&self) -> &CapabilityHandle {
        match self {
            Self::Ready(handle) => handle,
            Self::Degraded { fallback, .. } => fallback,
        }
    }

    /// Consume the outcome, keeping only the handle.
    #[must_use]
    pub fn into_handle(self) -> CapabilityHandle {
        match self {
            Self::Ready(handle) => handle,
            Self::Degraded { fallback, .. } => fallback,
        }
    }

    /// Whether the remote capability was loaded.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// The terminal error, if degraded.
    #[must_use]
    pub fn error(&self) -> Option<&LoaderError> {
        match self {
            Self::Ready(_) => None,
            Self::Degraded { error, .. } => Some(error),
        }
    }
}

impl From<LoadOutcome> for LoadState {
    fn from(outcome: LoadOutcome) -> Self {
        match outcome {
            LoadOutcome::Ready(handle) => Self::Ready(handle),
            LoadOutcome::Degraded { error, fallback } => Self::Degraded { error, fallback },
        }
    }
}

/// Drives one logical load of `remote/capability`.
///
/// State is private to this orchestrator; the container and handle caches
/// behind it are shared by every orchestrator of the same [`RemoteLoader`].
pub struct LoadOrchestrator {
    loader: RemoteLoader,
    remote: String,
    capability: String,
    state: watch::Sender<LoadState>,
    on_error: Option<ErrorCallback>,
}

impl LoadOrchestrator {
    pub(crate) fn new(loader: RemoteLoader, remote: &str, capability: &str) -> Self {
        let (state, _) = watch::channel(LoadState::Idle);
        Self {
            loader,
            remote: remote.to_string(),
            capability: capability.to_string(),
            state,
            on_error: None,
        }
    }

    /// Report every entry into `Degraded` to `callback`.
    #[must_use]
    pub fn on_error(mut self, callback: impl Fn(&LoaderError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.subscribe()
    }

    /// Load the capability, or return the existing outcome if settled.
    pub async fn load(&mut self) -> LoadOutcome {
        match self.state() {
            LoadState::Ready(handle) => LoadOutcome::Ready(handle),
            LoadState::Degraded { error, fallback } => LoadOutcome::Degraded { error, fallback },
            LoadState::Idle | LoadState::Loading => self.run().await,
        }
    }

    /// Start a fresh pipeline attempt unless already `Ready`.
    ///
    /// Caches from earlier attempts stay valid, and an injection still in
    /// flight from an earlier attempt is joined rather than restarted.
    pub async fn retry(&mut self) -> LoadOutcome {
        if let LoadState::Ready(handle) = self.state() {
            return LoadOutcome::Ready(handle);
        }
        info!(remote = %self.remote, capability = %self.capability, "retrying load");
        self.run().await
    }

    async fn run(&mut self) -> LoadOutcome {
        self.state.send_replace(LoadState::Loading);

        let result = self.race_pipeline().await;

        let outcome = match result {
            Ok(handle) => {
                info!(remote = %self.remote, capability = %self.capability, "capability ready");
                LoadOutcome::Ready(handle)
            },
            Err(error) => {
                warn!(
                    remote = %self.remote,
                    capability = %self.capability,
                    error = %error,
                    "capability degraded to fallback"
                );
                let fallback = self.loader.fallbacks().get_fallback(&self.capability);
                if let Some(callback) = &self.on_error {
                    callback(&error);
                }
                LoadOutcome::Degraded { error, fallback }
            },
        };

        self.state.send_replace(outcome.clone().into());
        outcome
    }

    /// Fetch the document, then race the pipeline against its timeout.
    ///
    /// Until the document arrives its timeout is unknown, so the fetch is
    /// bounded by the settings timeout. Both phases count against the one
    /// deadline, measured from the start of the load.
    async fn race_pipeline(&self) -> LoaderResult<CapabilityHandle> {
        let started = Instant::now();

        let fetch_timeout = self.loader.settings().timeout;
        let fetch = {
            let loader = self.loader.clone();
            tokio::spawn(async move { loader.load_policy().await })
        };
        let policy = tokio::select! {
            joined = fetch => match joined {
                Ok(policy) => policy,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => return Err(LoaderError::Timeout { elapsed: fetch_timeout }),
            },
            () = sleep(fetch_timeout) => return Err(LoaderError::Timeout { elapsed: fetch_timeout }),
        };

        let timeout = policy.timeout;
        debug!(
            remote = %self.remote,
            capability = %self.capability,
            timeout = ?timeout,
            attempts = policy.retry.max_attempts,
            "load policy resolved"
        );

        let loader = self.loader.clone();
        let remote = self.remote.clone();
        let capability = self.capability.clone();
        let pipeline = tokio::spawn(async move {
            loader
                .load_with_retry(&remote, &capability, &policy.retry)
                .await
        });

        tokio::select! {
            joined = pipeline => match joined {
                Ok(result) => result,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => Err(LoaderError::Timeout { elapsed: timeout }),
            },
            () = sleep(timeout.saturating_sub(started.elapsed())) => {
                Err(LoaderError::Timeout { elapsed: timeout })
            },
        }
    }
}

impl fmt::Debug for LoadOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadOrchestrator")
            .field("remote", &self.remote)
            .field("capability", &self.capability)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::handle::Origin;
    use crate::testing::{CountingConfigSource, MockContainer, MockHost};

    const URL: &str = "mem://viewer/remoteEntry.json";

    fn doc(timeout_ms: u64, attempts: u32) -> String {
        format!(
            r#"{{
                "remotes": {{"viewer": {{"url": "{URL}", "scope": "viewerRemote"}}}},
                "timeout": {timeout_ms},
                "retryAttempts": {attempts},
                "retryDelay": 50
            }}"#
        )
    }

    fn loader(host: MockHost, doc: String) -> RemoteLoader {
        RemoteLoader::builder(Arc::new(host), Arc::new(CountingConfigSource::ok(doc))).build()
    }

    fn counting_callback() -> (Arc<AtomicU32>, impl Fn(&LoaderError) + Send + Sync + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let seen = Arc::clone(&count);
        (count, move |_: &LoaderError| {
            seen.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn idle_to_ready() {
        let host = MockHost::new().with_bundle(
            URL,
            "viewerRemote",
            Arc::new(MockContainer::new().expose_echo("PostsList")),
        );
        let mut orchestrator = loader(host, doc(1000, 1)).orchestrator("viewer", "PostsList");
        assert_eq!(orchestrator.state(), LoadState::Idle);

        let outcome = orchestrator.load().await;
        assert!(outcome.is_ready());
        assert!(orchestrator.state().is_settled());

        let out = outcome.handle().invoke(&json!({"page": 2}));
        assert_eq!(out["props"]["page"], 2);

        // A settled orchestrator hands back the same handle.
        let again = orchestrator.load().await;
        assert!(again.handle().ptr_eq(outcome.handle()));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_degrades_to_fallback() {
        let host = MockHost::new()
            .with_bundle(URL, "viewerRemote", Arc::new(MockContainer::new()))
            .hanging(URL);
        let loader = loader(host, doc(200, 1));

        let (errors, callback) = counting_callback();
        let mut orchestrator = loader.orchestrator("viewer", "PostsList").on_error(callback);
        let outcome = orchestrator.load().await;

        assert_eq!(
            outcome.error(),
            Some(&LoaderError::Timeout {
                elapsed: Duration::from_millis(200)
            })
        );
        assert_eq!(outcome.handle().origin(), Origin::Fallback);
        assert_eq!(outcome.handle().name(), "PostsList");
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        // Loading a degraded orchestrator does not re-run or re-report.
        orchestrator.load().await;
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_after_degraded() {
        let host = MockHost::new()
            .with_bundle(
                URL,
                "viewerRemote",
                Arc::new(MockContainer::new().expose_echo("PostViewer")),
            )
            .failing_first(URL, 1);
        let (errors, callback) = counting_callback();
        let mut orchestrator = loader(host, doc(5000, 1))
            .orchestrator("viewer", "PostViewer")
            .on_error(callback);

        let first = orchestrator.load().await;
        assert_eq!(first.error().map(LoaderError::kind), Some(ErrorKind::InjectionFailed));
        assert_eq!(errors.load(Ordering::SeqCst), 1);

        let mut states = orchestrator.subscribe();
        let second = orchestrator.retry().await;
        assert!(second.is_ready());
        assert!(matches!(&*states.borrow_and_update(), LoadState::Ready(_)));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn first_load_uses_document_retry_policy() {
        let host = MockHost::new()
            .with_bundle(
                URL,
                "viewerRemote",
                Arc::new(MockContainer::new().expose_echo("PostsList")),
            )
            .failing_first(URL, 2);
        let host = Arc::new(host);
        let loader =
            RemoteLoader::builder(host.clone(), Arc::new(CountingConfigSource::ok(doc(5000, 3))))
                .build();

        let outcome = loader.orchestrator("viewer", "PostsList").load().await;
        assert!(outcome.is_ready());
        assert_eq!(host.activations(URL), 3);
    }

    #[tokio::test]
    async fn unknown_capability_uses_placeholder() {
        let host = MockHost::new().with_bundle(URL, "viewerRemote", Arc::new(MockContainer::new()));
        let outcome = loader(host, doc(1000, 1))
            .load_capability("viewer", "PatientChart")
            .await;

        assert_eq!(outcome.error().map(LoaderError::kind), Some(ErrorKind::CapabilityMissing));
        assert_eq!(outcome.handle().origin(), Origin::Placeholder);
    }
}
