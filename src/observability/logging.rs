//! # Logging
//!
//! `tracing` subscriber setup for hosts that do not install their own.
//!
//! `RUST_LOG` takes precedence over the configured level so a single module
//! can be turned up without touching the rest.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::ControllerConfig;

/// Install a global `tracing` subscriber according to `config`
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(config: &ControllerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if config.log_format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(true).try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {e}"))
}

/// Filter directive for the crate at the given level, `info` when unrecognised
fn default_directive(level: &str) -> String {
    let level = match level.to_ascii_lowercase().as_str() {
        "error" => "error",
        "warn" | "warning" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    format!("federated_app_controller={level}")
}
