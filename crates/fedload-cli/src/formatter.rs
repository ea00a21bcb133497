//! Output formatting.

use colored::Colorize;
use fedload_loader::{LoadOutcome, Origin};
use serde_json::{Value, json};

/// How command results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    /// Human-readable, colored.
    Pretty,
    /// One JSON object per result.
    Json,
}

impl OutputFormat {
    pub(crate) fn parse(s: &str) -> Self {
        match s {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

pub(crate) fn origin_label(origin: Origin) -> &'static str {
    match origin {
        Origin::Remote => "remote",
        Origin::Fallback => "fallback",
        Origin::Placeholder => "placeholder",
    }
}

/// JSON report of a load.
pub(crate) fn outcome_json(
    remote: &str,
    capability: &str,
    outcome: &LoadOutcome,
    output: &Value,
) -> Value {
    json!({
        "remote": remote,
        "capability": capability,
        "status": if outcome.is_ready() { "ready" } else { "degraded" },
        "origin": origin_label(outcome.handle().origin()),
        "error": outcome.error().map(ToString::to_string),
        "output": output,
    })
}

/// Human-readable report of a load.
pub(crate) fn outcome_pretty(
    remote: &str,
    capability: &str,
    outcome: &LoadOutcome,
    output: &Value,
) -> String {
    let status = match outcome.error() {
        None => "ready".green().bold().to_string(),
        Some(error) => format!("{} ({error})", "degraded".yellow().bold()),
    };
    let origin = origin_label(outcome.handle().origin());
    let body = serde_json::to_string_pretty(output).unwrap_or_else(|_| output.to_string());
    format!("{remote}/{capability}: {status} [{origin}]\n{body}")
}
