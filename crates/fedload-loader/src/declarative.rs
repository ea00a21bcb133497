//! A [`HostRuntime`] backed by declarative JSON bundles.
//!
//! A bundle is a small JSON document:
//!
//! ```json
//! {
//!   "scope": "viewerRemote",
//!   "exposes": {
//!     "./PostsList": { "template": "Page {{page}} of posts", "export": "default" },
//!     "./PostViewer": { "template": "Post {{postId}}", "export": "named" }
//!   }
//! }
//! ```
//!
//! Activating a bundle fetches it (`http(s)://` over reqwest, `file://` or a
//! bare path from disk) and publishes a [`BundleContainer`] under its scope.
//! Each exposed module yields a [`TemplateCapability`] that renders its
//! template against the caller's property bag.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{LoaderError, LoaderResult};
use crate::exports::{ExportSlot, ModuleExports};
use crate::handle::{Capability, CapabilityHandle};
use crate::host::{Container, HostRuntime, ModuleFactory, SharingScope};

/// Largest bundle accepted, in bytes.
pub const MAX_BUNDLE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Deserialize)]
struct BundleManifest {
    scope: String,
    #[serde(default)]
    exposes: BTreeMap<String, ExposedModule>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExposedModule {
    template: String,
    #[serde(default = "default_export")]
    export: ExportSlot,
}

fn default_export() -> ExportSlot {
    ExportSlot::Default
}

/// Renders a `{{key}}` template against the property bag.
#[derive(Debug, Clone)]
pub struct TemplateCapability {
    name: String,
    template: String,
}

impl TemplateCapability {
    /// Capability `name` rendering `template`.
    #[must_use]
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
        }
    }

    /// Substitute every `{{key}}` with the matching top-level prop.
    ///
    /// Strings are inserted verbatim, other values as JSON. Unknown keys
    /// render as an empty string; an unterminated `{{` is kept literally.
    #[must_use]
    pub fn render(&self, props: &Value) -> String {
        let mut out = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start.saturating_add(2)..];
            let Some(end) = after.find("}}") else {
                out.push_str(&rest[start..]);
                return out;
            };
            match props.get(after[..end].trim()) {
                Some(Value::String(s)) => out.push_str(s),
                Some(Value::Null) | None => {},
                Some(other) => out.push_str(&other.to_string()),
            }
            rest = &after[end.saturating_add(2)..];
        }

        out.push_str(rest);
        out
    }
}

impl Capability for TemplateCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, props: &Value) -> Value {
        json!({
            "capability": self.name,
            "available": true,
            "rendered": self.render(props),
        })
    }
}

/// Container published by an activated declarative bundle.
pub struct BundleContainer {
    scope: String,
    modules: BTreeMap<String, ExposedModule>,
    sharing: std::sync::Mutex<Option<SharingScope>>,
}

impl BundleContainer {
    fn new(manifest: BundleManifest) -> Self {
        Self {
            scope: manifest.scope,
            modules: manifest.exposes,
            sharing: std::sync::Mutex::new(None),
        }
    }

    /// Scope the container is published under.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Module keys this container exposes.
    pub fn module_keys(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Name of the sharing scope passed to `init`, if initialized.
    #[must_use]
    pub fn sharing_scope(&self) -> Option<String> {
        self.sharing
            .lock()
            .ok()
            .and_then(|g| g.as_ref().map(|s| s.name().to_string()))
    }
}

#[async_trait]
impl Container for BundleContainer {
    async fn init(&self, sharing: &SharingScope) -> LoaderResult<()> {
        let mut guard = self
            .sharing
            .lock()
            .map_err(|_| LoaderError::ContainerInitFailed {
                scope: self.scope.clone(),
                reason: "container state poisoned".to_string(),
            })?;
        *guard = Some(sharing.clone());
        debug!(scope = %self.scope, sharing = sharing.name(), "bundle container initialized");
        Ok(())
    }

    async fn get(&self, module_key: &str) -> LoaderResult<Option<ModuleFactory>> {
        let Some(module) = self.modules.get(module_key).cloned() else {
            return Ok(None);
        };
        let name = module_key.trim_start_matches("./").to_string();
        let handle = CapabilityHandle::new(TemplateCapability::new(name.clone(), module.template));

        let factory: ModuleFactory = Arc::new(move || match module.export {
            ExportSlot::Default => ModuleExports::with_default(handle.clone()),
            ExportSlot::Named => ModuleExports::empty().with_named(name.clone(), handle.clone()),
            ExportSlot::Raw => ModuleExports::raw(handle.clone()),
        });
        Ok(Some(factory))
    }
}

impl std::fmt::Debug for BundleContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleContainer")
            .field("scope", &self.scope)
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Host runtime that activates declarative JSON bundles.
pub struct DeclarativeHost {
    client: reqwest::Client,
    published: DashMap<String, Arc<BundleContainer>>,
}

impl DeclarativeHost {
    /// Host with a default HTTP client.
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Host using `client` for `http(s)://` bundles.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            published: DashMap::new(),
        }
    }

    /// Number of published containers.
    #[must_use]
    pub fn published(&self) -> usize {
        self.published.len()
    }

    async fn fetch(&self, location: &str) -> LoaderResult<String> {
        match url::Url::parse(location) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                self.fetch_http(location).await
            },
            Ok(parsed) if parsed.scheme() == "file" => {
                let path = parsed
                    .to_file_path()
                    .map_err(|()| LoaderError::injection(location, "invalid file URL"))?;
                read_file(location, path).await
            },
            Ok(parsed) if parsed.scheme().len() > 1 => Err(LoaderError::injection(
                location,
                format!("unsupported scheme '{}'", parsed.scheme()),
            )),
            // Bare paths, including Windows drive letters that parse as a
            // one-letter scheme.
            _ => read_file(location, PathBuf::from(location)).await,
        }
    }

    async fn fetch_http(&self, location: &str) -> LoaderResult<String> {
        let response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| LoaderError::injection(location, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoaderError::injection(location, format!("HTTP {status}")));
        }
        if let Some(len) = response.content_length()
            && len > MAX_BUNDLE_SIZE
        {
            return Err(too_large(location, len));
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LoaderError::injection(location, e))?;
            bytes.extend_from_slice(&chunk);
            let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
            if size > MAX_BUNDLE_SIZE {
                return Err(too_large(location, size));
            }
        }

        String::from_utf8(bytes).map_err(|e| LoaderError::injection(location, e))
    }
}

async fn read_file(location: &str, path: PathBuf) -> LoaderResult<String> {
    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|e| LoaderError::injection(location, e))?;
    if metadata.len() > MAX_BUNDLE_SIZE {
        return Err(too_large(location, metadata.len()));
    }
    tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| LoaderError::injection(location, e))
}

fn too_large(location: &str, size: u64) -> LoaderError {
    LoaderError::injection(
        location,
        format!("bundle is {size} bytes, limit is {MAX_BUNDLE_SIZE}"),
    )
}

impl Default for DeclarativeHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostRuntime for DeclarativeHost {
    async fn activate(&self, url: &str) -> LoaderResult<()> {
        let text = self.fetch(url).await?;
        let manifest: BundleManifest = serde_json::from_str(&text)
            .map_err(|e| LoaderError::injection(url, format!("invalid bundle: {e}")))?;

        let scope = manifest.scope.clone();
        let modules = manifest.exposes.len();
        self.published
            .insert(scope.clone(), Arc::new(BundleContainer::new(manifest)));
        info!(url, scope = %scope, modules, "bundle activated");
        Ok(())
    }

    fn container(&self, scope: &str) -> Option<Arc<dyn Container>> {
        self.published
            .get(scope)
            .map(|entry| Arc::clone(entry.value()) as Arc<dyn Container>)
    }
}

impl std::fmt::Debug for DeclarativeHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeclarativeHost")
            .field("published", &self.published.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::ErrorKind;
    use crate::host::module_key;

    const BUNDLE: &str = r#"{
        "scope": "viewerRemote",
        "exposes": {
            "./PostsList": { "template": "Page {{page}} by {{ author }}" },
            "./PostViewer": { "template": "Post {{postId}}", "export": "named" },
            "./Raw": { "template": "raw", "export": "raw" }
        }
    }"#;

    fn bundle_file(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    #[test]
    fn renders_props() {
        let cap = TemplateCapability::new("PostsList", "Page {{page}} by {{author}}{{missing}}");
        assert_eq!(
            cap.render(&json!({"page": 3, "author": "ada"})),
            "Page 3 by ada"
        );
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        let cap = TemplateCapability::new("X", "a {{b");
        assert_eq!(cap.render(&json!({"b": 1})), "a {{b");
    }

    #[tokio::test]
    async fn activates_bundle_from_path() {
        let file = bundle_file(BUNDLE);
        let host = DeclarativeHost::new();

        host.activate(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(host.published(), 1);

        let container = host.container("viewerRemote").unwrap();
        container.init(&SharingScope::default()).await.unwrap();

        let factory = container.get(&module_key("PostsList")).await.unwrap().unwrap();
        let (slot, handle) = factory().select("PostsList").unwrap();
        assert_eq!(slot, ExportSlot::Default);
        let out = handle.invoke(&json!({"page": 2, "author": "lin"}));
        assert_eq!(out["rendered"], "Page 2 by lin");
    }

    #[tokio::test]
    async fn export_shape_follows_bundle() {
        let file = bundle_file(BUNDLE);
        let url = url::Url::from_file_path(file.path()).unwrap();
        let host = DeclarativeHost::new();
        host.activate(url.as_str()).await.unwrap();

        let container = host.container("viewerRemote").unwrap();
        let named = container.get("./PostViewer").await.unwrap().unwrap();
        assert_eq!(named().select("PostViewer").unwrap().0, ExportSlot::Named);
        let raw = container.get("./Raw").await.unwrap().unwrap();
        assert_eq!(raw().select("Raw").unwrap().0, ExportSlot::Raw);
        assert!(container.get("./Missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn factory_yields_the_same_handle() {
        let file = bundle_file(BUNDLE);
        let host = DeclarativeHost::new();
        host.activate(file.path().to_str().unwrap()).await.unwrap();

        let container = host.container("viewerRemote").unwrap();
        let factory = container.get("./PostsList").await.unwrap().unwrap();
        let a = factory().select("PostsList").unwrap().1;
        let b = factory().select("PostsList").unwrap().1;
        assert!(a.ptr_eq(&b));
    }

    #[tokio::test]
    async fn invalid_bundle_is_injection_failure() {
        let file = bundle_file("not json");
        let host = DeclarativeHost::new();
        let err = host
            .activate(file.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InjectionFailed);
        assert_eq!(host.published(), 0);
    }

    #[tokio::test]
    async fn missing_file_is_injection_failure() {
        let err = DeclarativeHost::new()
            .activate("/nonexistent/remoteEntry.json")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InjectionFailed);
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let err = DeclarativeHost::new()
            .activate("ftp://cdn.example/remoteEntry.json")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InjectionFailed);
    }
}
