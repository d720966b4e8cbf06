//! Tracing setup for binaries and tests embedding the store

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `info`
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init()
        .is_ok()
}
