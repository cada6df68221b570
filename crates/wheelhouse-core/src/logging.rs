//! Logging initialization for the client.

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber.
///
/// The log level comes from the `RUST_LOG` environment variable when set,
/// otherwise from the provided default.
///
/// # Example
///
/// ```ignore
/// init_logging("info");
/// tracing::info!("Client started");
/// ```
pub fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    // try_init so repeated calls (e.g. from tests) are harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
