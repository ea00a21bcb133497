//! `fedload load`: load one capability and render it.

use anyhow::{Context, Result};
use fedload_loader::RemoteLoader;
use serde_json::Value;

use crate::formatter::{OutputFormat, outcome_json, outcome_pretty};

/// Load `capability` from `remote`, invoke it with `props` and print the
/// result. A degraded load is reported, not treated as a failure.
pub(crate) async fn run_load(
    loader: &RemoteLoader,
    remote: &str,
    capability: &str,
    props: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let props: Value = match props {
        Some(text) => serde_json::from_str(text).context("--props is not valid JSON")?,
        None => Value::Object(serde_json::Map::new()),
    };

    let outcome = loader.load_capability(remote, capability).await;
    let output = outcome.handle().invoke(&props);

    match format {
        OutputFormat::Json => {
            println!("{}", outcome_json(remote, capability, &outcome, &output));
        },
        OutputFormat::Pretty => {
            println!("{}", outcome_pretty(remote, capability, &outcome, &output));
        },
    }
    Ok(())
}
