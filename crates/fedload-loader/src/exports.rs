//! Export-shape resolution.
//!
//! A module factory may publish its capability as a default export, as a
//! named export, or as the module value itself. [`ModuleExports::select`]
//! walks [`RESOLUTION_ORDER`] and returns the first slot present.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::handle::CapabilityHandle;

/// One place a module can publish a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportSlot {
    /// The module's default export.
    Default,
    /// An export named after the requested capability.
    Named,
    /// The module value itself.
    Raw,
}

/// Fixed precedence used when picking a capability out of a module.
pub const RESOLUTION_ORDER: [ExportSlot; 3] =
    [ExportSlot::Default, ExportSlot::Named, ExportSlot::Raw];

/// What a module factory yields.
#[derive(Debug, Clone, Default)]
pub struct ModuleExports {
    default: Option<CapabilityHandle>,
    named: HashMap<String, CapabilityHandle>,
    raw: Option<CapabilityHandle>,
}

impl ModuleExports {
    /// A module with nothing exported.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A module whose default export is `handle`.
    #[must_use]
    pub fn with_default(handle: CapabilityHandle) -> Self {
        Self {
            default: Some(handle),
            ..Self::default()
        }
    }

    /// A module whose value is `handle` itself.
    #[must_use]
    pub fn raw(handle: CapabilityHandle) -> Self {
        Self {
            raw: Some(handle),
            ..Self::default()
        }
    }

    /// Add a named export.
    #[must_use]
    pub fn with_named(mut self, name: impl Into<String>, handle: CapabilityHandle) -> Self {
        self.named.insert(name.into(), handle);
        self
    }

    /// The handle in `slot`, if any. `Named` looks up `capability`.
    #[must_use]
    pub fn slot(&self, slot: ExportSlot, capability: &str) -> Option<&CapabilityHandle> {
        match slot {
            ExportSlot::Default => self.default.as_ref(),
            ExportSlot::Named => self.named.get(capability),
            ExportSlot::Raw => self.raw.as_ref(),
        }
    }

    /// First export present in [`RESOLUTION_ORDER`], with the slot it came from.
    #[must_use]
    pub fn select(&self, capability: &str) -> Option<(ExportSlot, CapabilityHandle)> {
        RESOLUTION_ORDER
            .iter()
            .find_map(|slot| self.slot(*slot, capability).map(|h| (*slot, h.clone())))
    }
}
