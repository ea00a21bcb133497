//! `fedload preload`: warm a remote's container.

use anyhow::{Context, Result};
use colored::Colorize;
use fedload_loader::RemoteLoader;
use serde_json::json;

use crate::formatter::OutputFormat;

pub(crate) async fn run_preload(
    loader: &RemoteLoader,
    remote: &str,
    format: OutputFormat,
) -> Result<()> {
    loader
        .preload_remote(remote)
        .await
        .with_context(|| format!("failed to preload remote '{remote}'"))?;

    match format {
        OutputFormat::Json => println!("{}", json!({ "remote": remote, "preloaded": true })),
        OutputFormat::Pretty => println!("{} {remote}", "preloaded".green().bold()),
    }
    Ok(())
}
