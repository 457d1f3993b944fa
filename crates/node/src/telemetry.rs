//! Logging setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize structured logging.
///
/// `filter` is a tracing directive string; the `RUST_LOG` environment
/// variable takes precedence when set. Safe to call once per process.
pub fn init(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
