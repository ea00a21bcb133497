//! fedload CLI - load remotely hosted capabilities from the command line.
//!
//! Reads layered settings, points a [`RemoteLoader`] at the configured
//! remotes document and runs one command against it.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fedload_config::Settings;
use fedload_loader::{DeclarativeHost, RemoteLoader};
use tracing::debug;

mod commands;
pub mod config_bridge;
mod formatter;

use commands::{load, preload, remotes};
use formatter::OutputFormat;

/// fedload - runtime loader for remote capabilities
#[derive(Parser)]
#[command(name = "fedload")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty (default) or json
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    /// Settings file merged over the user settings
    #[arg(short, long, global = true, env = "FEDLOAD_SETTINGS")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a capability and render it
    Load {
        /// Remote name from the remotes document
        remote: String,

        /// Capability exposed by the remote
        capability: String,

        /// Property bag passed to the capability, as JSON
        #[arg(short, long)]
        props: Option<String>,
    },

    /// List the configured remotes
    Remotes,

    /// Activate and initialize a remote ahead of first use
    Preload {
        /// Remote name from the remotes document
        remote: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    let settings = resolved.settings;

    let mut log_config = config_bridge::to_log_config(&settings);
    if cli.verbose {
        "debug".clone_into(&mut log_config.level);
    }
    if let Err(e) = fedload_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }
    debug!(files = ?resolved.loaded_files, "settings loaded");

    let loader = RemoteLoader::builder(
        Arc::new(DeclarativeHost::new()),
        config_bridge::config_source(&settings)?,
    )
    .settings(config_bridge::to_loader_settings(&settings))
    .build();

    let format = OutputFormat::parse(&cli.format);

    match cli.command {
        Commands::Load {
            remote,
            capability,
            props,
        } => load::run_load(&loader, &remote, &capability, props.as_deref(), format).await?,
        Commands::Remotes => remotes::run_remotes(&loader, format).await?,
        Commands::Preload { remote } => preload::run_preload(&loader, &remote, format).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_load_with_props() {
        let cli = Cli::try_parse_from([
            "fedload",
            "--format",
            "json",
            "load",
            "viewer",
            "PostsList",
            "--props",
            r#"{"page":2}"#,
        ])
        .unwrap();

        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Load {
                remote,
                capability,
                props,
            } => {
                assert_eq!(remote, "viewer");
                assert_eq!(capability, "PostsList");
                assert_eq!(props.as_deref(), Some(r#"{"page":2}"#));
            },
            _ => panic!("expected load"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fedload", "preload", "viewer", "-v", "-c", "ci.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("ci.toml")));
    }
}
