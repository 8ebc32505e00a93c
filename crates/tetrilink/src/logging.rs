//! Subscriber setup for binaries.
//!
//! Library crates only emit `tracing` events. Applications call [`init`]
//! once at startup to print them.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Installs a formatted subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`]. A second call is a no-op.
pub fn init() {
    init_with(DEFAULT_FILTER);
}

/// Like [`init`] with a custom fallback filter such as
/// `"tetrilink_session=debug,info"`.
pub fn init_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    // Fails only if a global subscriber is already set.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
