#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
//! Layered settings for fedload.
//!
//! # Usage
//!
//! ```rust,no_run
//! use fedload_config::Settings;
//!
//! let resolved = Settings::load(None).unwrap();
//! println!("timeout: {}ms", resolved.settings.loader.timeout_ms);
//! ```
//!
//! # Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Explicit file** (`--config <path>`)
//! 2. **User file** (`<platform config dir>/fedload/config.toml`)
//! 3. **Environment variables** (`FEDLOAD_*`), for fields no file set
//! 4. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! This crate depends on no other fedload crate. Conversion to loader types
//! happens in the CLI.

/// Environment variable fallbacks.
pub mod env;
/// Configuration error types.
pub mod error;
/// Settings file discovery and loading.
pub mod loader;
/// Layered merging.
pub mod merge;
/// Settings struct definitions.
pub mod types;
/// Settings validation rules.
pub mod validate;

pub use error::{ConfigError, ConfigResult};
pub use loader::ResolvedSettings;
pub use types::*;

impl Settings {
    /// Load settings with the full precedence chain.
    ///
    /// # Errors
    ///
    /// See [`loader::load`].
    pub fn load(explicit: Option<&std::path::Path>) -> ConfigResult<ResolvedSettings> {
        loader::load(explicit, None)
    }
}
