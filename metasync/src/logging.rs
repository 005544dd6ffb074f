//! Tracing setup for the CLI.
//!
//! Diagnostics go to stderr and are controlled by `RUST_LOG`. Run records under
//! `.metasync/runs/` are product output and are written regardless of the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `info`.
///
/// # Example
/// ```bash
/// RUST_LOG=metasync=debug metasync run --event sync
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
