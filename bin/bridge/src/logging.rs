//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber; `RUST_LOG` controls verbosity
pub(crate) fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
