//! `tracing` initialization, following the registry + env-filter + fmt layer
//! wiring used throughout the server and MCP binaries.

use tracing_subscriber::{EnvFilter, prelude::*};

/// Initialize tracing for the long-running HTTP/WebSocket server. Writes to
/// stdout.
pub fn init_tracing_stdout() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();
}

/// Initialize tracing for the MCP binary. Writes to stderr because stdout is
/// reserved for the stdio MCP transport.
pub fn init_tracing_stderr() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter),
        )
        .init();
}
