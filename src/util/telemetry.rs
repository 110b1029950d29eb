//! Tracing subscriber setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG`, unless a global subscriber is
/// already set. Applications that configure their own subscriber need not call this.
pub fn init_tracing() {
    init_with(EnvFilter::from_default_env());
}

/// Like [`init_tracing`], but falls back to `directive` (for example
/// `"taskwire=debug"`) when `RUST_LOG` is unset or invalid.
pub fn init_tracing_with_default(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    init_with(filter);
}

fn init_with(filter: EnvFilter) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init();
}
