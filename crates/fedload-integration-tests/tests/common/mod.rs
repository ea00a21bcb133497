//! Shared harness for integration tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use fedload_loader::testing::{CountingConfigSource, MockHost};
use fedload_loader::{LoaderError, LoaderSettings, RemoteLoader, RetryPolicy};

/// Bundle URL of the `viewer` remote.
pub const VIEWER_URL: &str = "mem://viewer/remoteEntry.json";

/// Container scope of the `viewer` remote.
pub const VIEWER_SCOPE: &str = "viewerRemote";

/// A remotes document listing `viewer`, with optional policy overrides.
pub fn viewer_doc(timeout_ms: Option<u64>, attempts: Option<u32>, delay_ms: Option<u64>) -> String {
    let mut doc = serde_json::json!({
        "remotes": { "viewer": { "url": VIEWER_URL, "scope": VIEWER_SCOPE } }
    });
    if let Some(t) = timeout_ms {
        doc["timeout"] = t.into();
    }
    if let Some(a) = attempts {
        doc["retryAttempts"] = a.into();
    }
    if let Some(d) = delay_ms {
        doc["retryDelay"] = d.into();
    }
    doc.to_string()
}

/// A loader with its host and config source kept for inspection.
#[allow(dead_code)]
pub struct LoaderHarness {
    /// The loader under test.
    pub loader: RemoteLoader,
    /// The mock host runtime.
    pub host: Arc<MockHost>,
    /// The mock config source.
    pub source: Arc<CountingConfigSource>,
}

#[allow(dead_code)]
impl LoaderHarness {
    /// Loader over `host` and `source` with default settings.
    pub fn new(host: MockHost, source: CountingConfigSource) -> Self {
        Self::with_settings(host, source, LoaderSettings::default())
    }

    /// Loader over `host` and `source` with `settings`.
    pub fn with_settings(
        host: MockHost,
        source: CountingConfigSource,
        settings: LoaderSettings,
    ) -> Self {
        let host = Arc::new(host);
        let source = Arc::new(source);
        let loader = RemoteLoader::builder(host.clone(), source.clone())
            .settings(settings)
            .build();
        Self {
            loader,
            host,
            source,
        }
    }
}

/// Settings with `attempts` tries spaced `delay` apart.
#[allow(dead_code)]
pub fn settings(timeout: Duration, attempts: u32, delay: Duration) -> LoaderSettings {
    LoaderSettings {
        timeout,
        retry: RetryPolicy::fixed(attempts, delay),
        ..LoaderSettings::default()
    }
}

/// Records every error passed to an `on_error` callback.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct ErrorRecorder {
    count: Arc<AtomicU32>,
    errors: Arc<Mutex<Vec<LoaderError>>>,
}

#[allow(dead_code)]
impl ErrorRecorder {
    /// A callback feeding this recorder.
    pub fn callback(&self) -> impl Fn(&LoaderError) + Send + Sync + 'static {
        let recorder = self.clone();
        move |error: &LoaderError| {
            recorder.count.fetch_add(1, Ordering::SeqCst);
            recorder.errors.lock().unwrap().push(error.clone());
        }
    }

    /// Number of callback invocations.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Errors reported so far.
    pub fn errors(&self) -> Vec<LoaderError> {
        self.errors.lock().unwrap().clone()
    }
}
