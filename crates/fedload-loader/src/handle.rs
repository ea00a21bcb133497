//! Capability trait and the cacheable handle the loader hands out.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

/// Where a capability implementation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Resolved from a remote container.
    Remote,
    /// A local substitute for a known capability.
    Fallback,
    /// The generic "capability unavailable" stand-in.
    Placeholder,
}

/// A named, invocable unit of functionality.
///
/// The property bag is forwarded untouched from the caller; the loader never
/// inspects it.
pub trait Capability: Send + Sync {
    /// Logical capability name (e.g. `PostsList`).
    fn name(&self) -> &str;

    /// Invoke the capability with the caller's property bag.
    fn invoke(&self, props: &Value) -> Value;

    /// Where this implementation came from.
    fn origin(&self) -> Origin {
        Origin::Remote
    }
}

/// A shared reference to a materialized capability.
///
/// Cloning is cheap. Two handles are equal only if they point at the same
/// capability object, which lets callers rely on referential stability of
/// cached handles.
#[derive(Clone)]
pub struct CapabilityHandle(Arc<dyn Capability>);

impl CapabilityHandle {
    /// Wrap a capability implementation.
    #[must_use]
    pub fn new(capability: impl Capability + 'static) -> Self {
        Self(Arc::new(capability))
    }

    /// Wrap an already shared capability.
    #[must_use]
    pub fn from_arc(capability: Arc<dyn Capability>) -> Self {
        Self(capability)
    }

    /// Logical capability name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// Where the underlying implementation came from.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.0.origin()
    }

    /// Invoke the capability, passing `props` through unchanged.
    #[must_use]
    pub fn invoke(&self, props: &Value) -> Value {
        self.0.invoke(props)
    }

    /// Whether both handles point at the same capability object.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for CapabilityHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for CapabilityHandle {}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityHandle")
            .field("name", &self.name())
            .field("origin", &self.origin())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Echo;

    impl Capability for Echo {
        fn name(&self) -> &str {
            "Echo"
        }

        fn invoke(&self, props: &Value) -> Value {
            props.clone()
        }
    }

    #[test]
    fn equality_is_identity() {
        let a = CapabilityHandle::new(Echo);
        let b = a.clone();
        let c = CapabilityHandle::new(Echo);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn props_pass_through() {
        let handle = CapabilityHandle::new(Echo);
        let props = json!({"page": 2, "nested": {"ok": true}});
        assert_eq!(handle.invoke(&props), props);
        assert_eq!(handle.origin(), Origin::Remote);
    }
}
