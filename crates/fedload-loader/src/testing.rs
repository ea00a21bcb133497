//! Mock host runtime, containers and config sources for tests.
//!
//! Compiled for this crate's unit tests and, behind the `test-support`
//! feature, for downstream integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::config_store::ConfigSource;
use crate::error::{LoaderError, LoaderResult};
use crate::exports::ModuleExports;
use crate::handle::{Capability, CapabilityHandle};
use crate::host::{Container, HostRuntime, ModuleFactory, SharingScope, module_key};

/// Capability that reports its name and echoes the props it was given.
#[derive(Debug, Clone)]
pub struct EchoCapability {
    name: String,
}

impl EchoCapability {
    /// A handle to a fresh echo capability.
    #[must_use]
    pub fn handle(name: impl Into<String>) -> CapabilityHandle {
        CapabilityHandle::new(Self { name: name.into() })
    }
}

impl Capability for EchoCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, props: &Value) -> Value {
        json!({ "capability": self.name, "props": props })
    }
}

/// Config source that counts fetches and returns a fixed outcome.
#[derive(Debug)]
pub struct CountingConfigSource {
    outcome: LoaderResult<String>,
    delay: Option<Duration>,
    hang: bool,
    fetches: AtomicU32,
}

impl CountingConfigSource {
    /// Source yielding `text`.
    #[must_use]
    pub fn ok(text: impl Into<String>) -> Self {
        Self {
            outcome: Ok(text.into()),
            delay: None,
            hang: false,
            fetches: AtomicU32::new(0),
        }
    }

    /// Source that always fails with `reason`.
    #[must_use]
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            outcome: Err(LoaderError::ConfigUnavailable {
                source_name: "<mock>".to_string(),
                reason: reason.into(),
            }),
            delay: None,
            hang: false,
            fetches: AtomicU32::new(0),
        }
    }

    /// Source whose fetch never completes.
    #[must_use]
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::ok("{}")
        }
    }

    /// Delay every fetch by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of fetches so far.
    #[must_use]
    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigSource for CountingConfigSource {
    fn describe(&self) -> String {
        "<mock>".to_string()
    }

    async fn fetch(&self) -> LoaderResult<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            futures::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome.clone()
    }
}

/// Container with a fixed set of exposed modules.
#[derive(Default)]
pub struct MockContainer {
    modules: HashMap<String, ModuleFactory>,
    init_error: Option<String>,
    inits: AtomicU32,
    gets: AtomicU32,
    last_sharing: Mutex<Option<SharingScope>>,
}

impl MockContainer {
    /// A container exposing nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `capability` under `./capability`; each factory call yields a
    /// clone of `exports`.
    #[must_use]
    pub fn expose(mut self, capability: &str, exports: ModuleExports) -> Self {
        self.modules
            .insert(module_key(capability), Arc::new(move || exports.clone()));
        self
    }

    /// Expose `capability` as a default export of a fresh echo capability.
    #[must_use]
    pub fn expose_echo(self, capability: &str) -> Self {
        let exports = ModuleExports::with_default(EchoCapability::handle(capability));
        self.expose(capability, exports)
    }

    /// Make `init` fail with `reason`.
    #[must_use]
    pub fn failing_init(mut self, reason: impl Into<String>) -> Self {
        self.init_error = Some(reason.into());
        self
    }

    /// Number of `init` calls.
    #[must_use]
    pub fn inits(&self) -> u32 {
        self.inits.load(Ordering::SeqCst)
    }

    /// Number of `get` calls.
    #[must_use]
    pub fn gets(&self) -> u32 {
        self.gets.load(Ordering::SeqCst)
    }

    /// Sharing scope passed to the last `init`.
    #[must_use]
    pub fn last_sharing(&self) -> Option<SharingScope> {
        self.last_sharing.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Container for MockContainer {
    async fn init(&self, sharing: &SharingScope) -> LoaderResult<()> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_sharing.lock() {
            *guard = Some(sharing.clone());
        }
        match &self.init_error {
            Some(reason) => Err(LoaderError::ContainerInitFailed {
                scope: "<mock>".to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn get(&self, module_key: &str) -> LoaderResult<Option<ModuleFactory>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.modules.get(module_key).cloned())
    }
}

struct MockBundle {
    scope: String,
    container: Option<Arc<MockContainer>>,
    delay: Option<Duration>,
    failures_left: u32,
    hang: bool,
}

/// Host runtime that "activates" preregistered in-memory bundles.
#[derive(Default)]
pub struct MockHost {
    bundles: Mutex<HashMap<String, MockBundle>>,
    published: Mutex<HashMap<String, Arc<dyn Container>>>,
    activations: Mutex<HashMap<String, u32>>,
}

impl MockHost {
    /// A host with no bundles.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn add(self, url: &str, bundle: MockBundle) -> Self {
        if let Ok(mut guard) = self.bundles.lock() {
            guard.insert(url.to_string(), bundle);
        }
        self
    }

    /// A bundle at `url` that publishes `container` under `scope`.
    #[must_use]
    pub fn with_bundle(self, url: &str, scope: &str, container: Arc<MockContainer>) -> Self {
        self.add(
            url,
            MockBundle {
                scope: scope.to_string(),
                container: Some(container),
                delay: None,
                failures_left: 0,
                hang: false,
            },
        )
    }

    /// A bundle at `url` that activates but never publishes a container.
    #[must_use]
    pub fn with_silent_bundle(self, url: &str, scope: &str) -> Self {
        self.add(
            url,
            MockBundle {
                scope: scope.to_string(),
                container: None,
                delay: None,
                failures_left: 0,
                hang: false,
            },
        )
    }

    /// Delay activation of `url` by `delay`.
    #[must_use]
    pub fn with_delay(self, url: &str, delay: Duration) -> Self {
        self.update(url, |b| b.delay = Some(delay));
        self
    }

    /// Fail the first `count` activations of `url`.
    #[must_use]
    pub fn failing_first(self, url: &str, count: u32) -> Self {
        self.update(url, |b| b.failures_left = count);
        self
    }

    /// Never complete activation of `url`.
    #[must_use]
    pub fn hanging(self, url: &str) -> Self {
        self.update(url, |b| b.hang = true);
        self
    }

    fn update(&self, url: &str, f: impl FnOnce(&mut MockBundle)) {
        if let Ok(mut guard) = self.bundles.lock()
            && let Some(bundle) = guard.get_mut(url)
        {
            f(bundle);
        }
    }

    /// Number of activations started for `url`.
    #[must_use]
    pub fn activations(&self, url: &str) -> u32 {
        self.activations
            .lock()
            .map(|g| g.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl HostRuntime for MockHost {
    async fn activate(&self, url: &str) -> LoaderResult<()> {
        if let Ok(mut guard) = self.activations.lock() {
            let count = guard.entry(url.to_string()).or_insert(0);
            *count = count.saturating_add(1);
        }

        let (delay, hang, fail) = {
            let mut guard = self
                .bundles
                .lock()
                .map_err(|_| LoaderError::injection(url, "mock host poisoned"))?;
            let bundle = guard
                .get_mut(url)
                .ok_or_else(|| LoaderError::injection(url, "404 Not Found"))?;
            let fail = bundle.failures_left > 0;
            bundle.failures_left = bundle.failures_left.saturating_sub(1);
            (bundle.delay, bundle.hang, fail)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if hang {
            futures::future::pending::<()>().await;
        }
        if fail {
            return Err(LoaderError::injection(url, "network error"));
        }

        let publish = self
            .bundles
            .lock()
            .ok()
            .and_then(|g| g.get(url).map(|b| (b.scope.clone(), b.container.clone())));
        if let Some((scope, Some(container))) = publish
            && let Ok(mut guard) = self.published.lock()
        {
            guard.insert(scope, container as Arc<dyn Container>);
        }
        Ok(())
    }

    fn container(&self, scope: &str) -> Option<Arc<dyn Container>> {
        self.published.lock().ok()?.get(scope).cloned()
    }
}
