//! Subcommand implementations.

pub(crate) mod load;
pub(crate) mod preload;
pub(crate) mod remotes;
