// ABOUTME: Tracing subscriber initialisation
// ABOUTME: Reads the filter from RUST_LOG and falls back to info

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false) // Don't show module paths in logs
        .compact()
        .try_init();
}
