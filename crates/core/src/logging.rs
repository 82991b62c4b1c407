//! Structured logging infrastructure for Fleetline.
//!
//! Centralized logging initialization with support for structured JSON
//! output and environment-based configuration.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the logging system with human-readable output.
///
/// Log level can be configured via the `RUST_LOG` environment variable.
/// If not set, defaults to `info` level.
///
/// # Example
/// ```no_run
/// use fleetline_core::logging;
///
/// logging::init();
/// tracing::info!("dispatch client started");
/// ```
pub fn init() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

/// Initialize the logging system with JSON output for production environments.
///
/// ```no_run
/// use fleetline_core::logging;
///
/// logging::init_json();
/// tracing::info!(service = "dispatch-gateway", "Service started");
/// ```
pub fn init_json() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .init();
}

/// Like [`init`], but tolerates a subscriber that is already installed.
///
/// Useful in tests and in binaries that embed the crate in a host process.
pub fn try_init() -> bool {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
