//! Local substitutes used whenever a remote capability cannot be loaded.
//!
//! Nothing in here may fail: lookups are synchronous and total, and
//! unknown names get a placeholder.

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::handle::{Capability, CapabilityHandle, Origin};

/// Fallback for a capability the provider knows about.
struct LocalCapability {
    name: &'static str,
    render: fn(&Value) -> Value,
}

impl Capability for LocalCapability {
    fn name(&self) -> &str {
        self.name
    }

    fn invoke(&self, props: &Value) -> Value {
        (self.render)(props)
    }

    fn origin(&self) -> Origin {
        Origin::Fallback
    }
}

/// Stand-in for a capability with no registered fallback.
#[derive(Debug, Clone)]
pub struct UnavailableCapability {
    name: String,
}

impl UnavailableCapability {
    /// Placeholder for `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Capability for UnavailableCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, _props: &Value) -> Value {
        json!({
            "capability": self.name,
            "available": false,
            "message": format!("{} is currently unavailable", self.name),
        })
    }

    fn origin(&self) -> Origin {
        Origin::Placeholder
    }
}

fn posts_list(props: &Value) -> Value {
    json!({
        "capability": "PostsList",
        "available": false,
        "posts": [],
        "page": props.get("page").cloned().unwrap_or(json!(1)),
        "message": "Posts cannot be loaded right now",
    })
}

fn post_viewer(props: &Value) -> Value {
    let post = props.get("post").cloned().unwrap_or(Value::Null);
    json!({
        "capability": "PostViewer",
        "available": false,
        "post": post,
        "message": "The full post view is unavailable; showing what was provided",
    })
}

/// Deterministic local capabilities keyed by logical name.
pub struct FallbackProvider {
    fallbacks: HashMap<String, CapabilityHandle>,
}

impl FallbackProvider {
    /// Provider with the built-in `PostsList` and `PostViewer` fallbacks.
    #[must_use]
    pub fn new() -> Self {
        let builtins = [
            LocalCapability {
                name: "PostsList",
                render: posts_list,
            },
            LocalCapability {
                name: "PostViewer",
                render: post_viewer,
            },
        ];
        Self {
            fallbacks: builtins
                .into_iter()
                .map(|c| (c.name.to_string(), CapabilityHandle::new(c)))
                .collect(),
        }
    }

    /// Provider with no built-ins; every lookup yields a placeholder.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            fallbacks: HashMap::new(),
        }
    }

    /// Register (or replace) the fallback for `name`.
    #[must_use]
    pub fn with_fallback(mut self, name: impl Into<String>, handle: CapabilityHandle) -> Self {
        self.fallbacks.insert(name.into(), handle);
        self
    }

    /// Substitute for `capability`. Never fails.
    #[must_use]
    pub fn get_fallback(&self, capability: &str) -> CapabilityHandle {
        self.fallbacks
            .get(capability)
            .cloned()
            .unwrap_or_else(|| CapabilityHandle::new(UnavailableCapability::new(capability)))
    }

    /// Whether a dedicated fallback exists for `capability`.
    #[must_use]
    pub fn knows(&self, capability: &str) -> bool {
        self.fallbacks.contains_key(capability)
    }
}

impl Default for FallbackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FallbackProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.fallbacks.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("FallbackProvider")
            .field("fallbacks", &names)
            .finish()
    }
}
