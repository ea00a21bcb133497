//! End-to-end load scenarios against the mock host runtime.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{ErrorRecorder, LoaderHarness, VIEWER_SCOPE, VIEWER_URL, settings, viewer_doc};
use fedload_loader::testing::{CountingConfigSource, MockContainer, MockHost};
use fedload_loader::{ErrorKind, LoadState, LoaderError, ModuleExports, Origin};
use serde_json::json;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn remote_capability_loads_ready() {
    let container = Arc::new(MockContainer::new().expose_echo("PostsList"));
    let harness = LoaderHarness::new(
        MockHost::new().with_bundle(VIEWER_URL, VIEWER_SCOPE, container.clone()),
        CountingConfigSource::ok(viewer_doc(None, None, None)),
    );

    let errors = ErrorRecorder::default();
    let mut orchestrator = harness
        .loader
        .orchestrator("viewer", "PostsList")
        .on_error(errors.callback());
    let outcome = orchestrator.load().await;

    assert!(outcome.is_ready());
    assert!(matches!(orchestrator.state(), LoadState::Ready(_)));
    assert_eq!(outcome.handle().origin(), Origin::Remote);
    assert_eq!(errors.count(), 0);

    // Props reach the capability untouched.
    let props = json!({"page": 3, "filter": {"tag": "rust"}});
    let out = outcome.handle().invoke(&props);
    assert_eq!(out["props"], props);

    assert_eq!(harness.host.activations(VIEWER_URL), 1);
    assert_eq!(container.inits(), 1);
}

#[tokio::test(start_paused = true)]
async fn unavailable_config_degrades_after_retries() {
    let harness = LoaderHarness::with_settings(
        MockHost::new(),
        CountingConfigSource::failing("connection refused"),
        settings(Duration::from_secs(10), 3, Duration::from_millis(100)),
    );

    let errors = ErrorRecorder::default();
    let started = Instant::now();
    let outcome = harness
        .loader
        .orchestrator("viewer", "PostsList")
        .on_error(errors.callback())
        .load()
        .await;

    assert_eq!(outcome.error().map(LoaderError::kind), Some(ErrorKind::ConfigUnavailable));
    assert_eq!(outcome.handle().origin(), Origin::Fallback);
    assert_eq!(outcome.handle().name(), "PostsList");

    assert_eq!(errors.count(), 1);
    assert_eq!(errors.errors()[0].kind(), ErrorKind::ConfigUnavailable);

    // All three tries ran, but the memoized failure means one fetch.
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(harness.source.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn missing_export_degrades_to_fallback() {
    let container = Arc::new(MockContainer::new().expose("PostViewer", ModuleExports::empty()));
    let harness = LoaderHarness::new(
        MockHost::new().with_bundle(VIEWER_URL, VIEWER_SCOPE, container.clone()),
        CountingConfigSource::ok(viewer_doc(None, Some(2), Some(50))),
    );

    let errors = ErrorRecorder::default();
    let outcome = harness
        .loader
        .orchestrator("viewer", "PostViewer")
        .on_error(errors.callback())
        .load()
        .await;

    assert_eq!(
        outcome.error(),
        Some(&LoaderError::CapabilityMissing {
            remote: "viewer".into(),
            capability: "PostViewer".into(),
        })
    );
    assert_eq!(outcome.handle().origin(), Origin::Fallback);
    assert_eq!(errors.count(), 1);

    // Both tries asked the container; neither re-injected.
    assert_eq!(container.gets(), 2);
    assert_eq!(harness.host.activations(VIEWER_URL), 1);

    let post = json!({"id": "42", "title": "Cached title"});
    let out = outcome.handle().invoke(&json!({ "post": post }));
    assert_eq!(out["post"]["title"], "Cached title");
}

#[tokio::test(start_paused = true)]
async fn injection_failure_is_tried_exactly_k_times() {
    let harness = LoaderHarness::new(
        MockHost::new()
            .with_bundle(VIEWER_URL, VIEWER_SCOPE, Arc::new(MockContainer::new()))
            .failing_first(VIEWER_URL, 10),
        CountingConfigSource::ok(viewer_doc(None, Some(3), Some(200))),
    );

    let started = Instant::now();
    let outcome = harness.loader.load_capability("viewer", "PostsList").await;

    assert_eq!(outcome.error().map(LoaderError::kind), Some(ErrorKind::InjectionFailed));
    assert_eq!(harness.host.activations(VIEWER_URL), 3);
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test(start_paused = true)]
async fn transient_injection_failure_recovers_within_budget() {
    let harness = LoaderHarness::new(
        MockHost::new()
            .with_bundle(
                VIEWER_URL,
                VIEWER_SCOPE,
                Arc::new(MockContainer::new().expose_echo("PostsList")),
            )
            .failing_first(VIEWER_URL, 2),
        CountingConfigSource::ok(viewer_doc(None, Some(3), Some(100))),
    );

    let outcome = harness.loader.load_capability("viewer", "PostsList").await;

    assert!(outcome.is_ready());
    assert_eq!(harness.host.activations(VIEWER_URL), 3);
}

#[tokio::test(start_paused = true)]
async fn timeout_degrades_and_reports_once() {
    let harness = LoaderHarness::new(
        MockHost::new()
            .with_bundle(VIEWER_URL, VIEWER_SCOPE, Arc::new(MockContainer::new()))
            .hanging(VIEWER_URL),
        CountingConfigSource::ok(viewer_doc(Some(500), None, None)),
    );

    let errors = ErrorRecorder::default();
    let started = Instant::now();
    let outcome = harness
        .loader
        .orchestrator("viewer", "PostsList")
        .on_error(errors.callback())
        .load()
        .await;

    assert_eq!(
        outcome.error(),
        Some(&LoaderError::Timeout {
            elapsed: Duration::from_millis(500)
        })
    );
    assert_eq!(
        outcome.error().map(ToString::to_string).as_deref(),
        Some("Loading timed out after 500ms")
    );
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(errors.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unknown_remote_degrades_without_retrying() {
    let harness = LoaderHarness::new(
        MockHost::new(),
        CountingConfigSource::ok(viewer_doc(None, Some(5), Some(1000))),
    );

    let started = Instant::now();
    let outcome = harness.loader.load_capability("admin", "Dashboard").await;

    assert_eq!(
        outcome.error().map(LoaderError::kind),
        Some(ErrorKind::RemoteNotConfigured)
    );
    assert_eq!(outcome.handle().origin(), Origin::Placeholder);
    assert!(started.elapsed() < Duration::from_millis(1000));
}
