//! Console logging setup.
//!
//! Honors `RUST_LOG` when set; falls back to the given default directive.

use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber for console output.
///
/// Returns an error if a global subscriber is already installed.
pub fn init(default_directive: &str) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| format!("failed to initialize logging: {e}"))
}
