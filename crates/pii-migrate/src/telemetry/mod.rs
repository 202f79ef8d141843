//! Telemetry initialisation for the migration binaries.
//!
//! Structured JSON logs go to stderr; stdout is reserved for the operator
//! summary printed at the end of a run.
//!
//! # Telemetry invariants
//!
//! - **No PII or key material** in any log field. Row ids, table and field
//!   names, and counts only.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Initialise the tracing subscriber at the configured log level.
///
/// `RUST_LOG`, when set, overrides `log_level`.
///
/// # Errors
///
/// Returns an error if the subscriber has already been set.
pub fn init(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialise migration tracing subscriber: {e}"))
}
