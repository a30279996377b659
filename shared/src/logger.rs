//! Logging utilities

use tracing_subscriber::EnvFilter;

/// Initialize the logger. JSON lines, filtered by `RUST_LOG` (default
/// `info`). Calling it twice is harmless.
pub fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init();
}
