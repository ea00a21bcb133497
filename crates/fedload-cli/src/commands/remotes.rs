//! `fedload remotes`: list the configured remotes.

use anyhow::{Context, Result};
use colored::Colorize;
use fedload_loader::RemoteLoader;
use serde_json::json;

use crate::formatter::OutputFormat;

pub(crate) async fn run_remotes(loader: &RemoteLoader, format: OutputFormat) -> Result<()> {
    let config = loader
        .config()
        .await
        .context("failed to load the remotes document")?;

    match format {
        OutputFormat::Json => {
            let remotes: Vec<_> = config
                .remotes
                .values()
                .map(|r| json!({ "name": r.name(), "url": r.url(), "scope": r.scope() }))
                .collect();
            println!("{}", json!({ "remotes": remotes }));
        },
        OutputFormat::Pretty => {
            if config.remotes.is_empty() {
                println!("{}", "No remotes configured".yellow());
            }
            for remote in config.remotes.values() {
                println!(
                    "{}  {}  (scope {})",
                    remote.name().cyan().bold(),
                    remote.url(),
                    remote.scope()
                );
            }
        },
    }
    Ok(())
}
