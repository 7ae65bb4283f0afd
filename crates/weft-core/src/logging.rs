#![forbid(unsafe_code)]

//! Optional structured logging.
//!
//! With the `tracing` feature the usual macros are re-exported here (and at
//! the crate root) so downstream crates can log through `weft_core` without
//! naming `tracing` themselves. With `tracing-json`, [`init_json_logging`]
//! installs a JSON subscriber filtered by `RUST_LOG`.

#[cfg(feature = "tracing")]
pub use tracing::{debug, debug_span, error, info, trace, trace_span, warn};

/// Install a global JSON subscriber honoring `RUST_LOG`.
///
/// Returns an error if a global subscriber is already installed.
#[cfg(feature = "tracing-json")]
pub fn init_json_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
}
