//! Runtime loader for remotely hosted capabilities.
//!
//! A host application names a remote and a capability; the loader fetches
//! the configuration document, activates the remote's bundle exactly once,
//! initializes its container, resolves the capability and caches the
//! resulting handle. Every stage de-duplicates concurrent callers. Failures
//! and timeouts degrade to a local fallback, so the caller always gets a
//! usable [`CapabilityHandle`].
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fedload_loader::{DeclarativeHost, HttpConfigSource, RemoteLoader};
//!
//! # async fn run() {
//! let loader = RemoteLoader::builder(
//!     Arc::new(DeclarativeHost::new()),
//!     Arc::new(HttpConfigSource::new("https://cdn.example/remotes.json")),
//! )
//! .build();
//!
//! let outcome = loader.load_capability("viewer", "PostsList").await;
//! let rendered = outcome.handle().invoke(&serde_json::json!({ "page": 1 }));
//! println!("{rendered}");
//! # }
//! ```
//!
//! # Layers
//!
//! ```text
//! RemoteLoader ─▶ LoadOrchestrator ─▶ retry ─▶ ConfigStore
//!                                         └──▶ CapabilityResolver ─▶ ContainerRegistry ─▶ CodeInjector ─▶ HostRuntime
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

/// The configuration document and remote descriptors.
pub mod config;
/// Memoized access to the configuration document.
pub mod config_store;
/// A host runtime for declarative JSON bundles.
pub mod declarative;
/// Loader error types.
pub mod error;
/// Export-shape resolution.
pub mod exports;
/// Local fallbacks.
pub mod fallback;
/// Capabilities and handles.
pub mod handle;
/// Host runtime and container seams.
pub mod host;
/// Exactly-once bundle activation.
pub mod injector;
/// The loader facade.
pub mod loader;
/// Caller-facing load state machine.
pub mod orchestrator;
/// Scope-keyed container cache.
pub mod registry;
/// Capability resolution.
pub mod resolver;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use config::{LoaderConfig, RemoteDescriptor};
pub use config_store::{
    ConfigSource, ConfigStore, FileConfigSource, HttpConfigSource, StaticConfigSource,
};
pub use declarative::{BundleContainer, DeclarativeHost, TemplateCapability};
pub use error::{ErrorKind, LoaderError, LoaderResult};
pub use exports::{ExportSlot, ModuleExports, RESOLUTION_ORDER};
pub use fallback::{FallbackProvider, UnavailableCapability};
pub use handle::{Capability, CapabilityHandle, Origin};
pub use host::{Container, DEFAULT_SHARING_SCOPE, HostRuntime, ModuleFactory, SharingScope};
pub use loader::{LoadPolicy, LoaderSettings, RemoteLoader, RemoteLoaderBuilder};
pub use orchestrator::{ErrorCallback, LoadOrchestrator, LoadOutcome, LoadState};

pub use fedload_core::RetryPolicy;
