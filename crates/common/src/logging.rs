//! Logging utilities for the Golem monitoring components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Build the env filter: `RUST_LOG` wins, otherwise the given level.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize tracing with the given default level and output format.
///
/// `format` is either `"json"` (structured logging) or anything else for the
/// human-readable formatter. Returns `false` if a global subscriber was
/// already installed.
pub fn init(level: &str, format: Option<&str>) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(level));

    match format {
        Some("json") => registry.with(fmt::layer().json()).try_init().is_ok(),
        _ => registry.with(fmt::layer()).try_init().is_ok(),
    }
}

/// Initialize tracing with sensible defaults (INFO, plain text).
pub fn init_default() -> bool {
    init("info", None)
}
