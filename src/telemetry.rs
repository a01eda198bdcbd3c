//! Logging configuration for the Concord server.
//!
//! Log levels are controlled via the `RUST_LOG` environment variable
//! (default: `info`).

use tracing_subscriber::prelude::*;

/// Initialize the tracing subscriber.
///
/// Call once at application startup before any tracing calls; a second
/// call returns an error from the subscriber registry.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
