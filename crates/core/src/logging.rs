//! Logging initialization and configuration.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the logging system with tracing.
///
/// `RUST_LOG` takes precedence when set; otherwise `default_filter` is used,
/// which normally comes from the `[logging]` section of the engine config.
///
/// # Example
/// ```
/// engine_core::init_logging("info,engine=debug");
/// tracing::info!("Engine initialized");
/// ```
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();

    if result.is_err() {
        tracing::debug!("Global subscriber already installed, keeping the existing one");
    }
}
