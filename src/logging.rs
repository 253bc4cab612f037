//! Logging setup
//!
//! The library only emits `tracing` events; binaries and tests opt in to
//! output by installing a subscriber here.

use tracing_subscriber::EnvFilter;

use crate::config::EngineConfig;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to `config.log_filter`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(config: &EngineConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
