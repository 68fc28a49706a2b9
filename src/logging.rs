//! Tracing subscriber setup.
//!
//! Levels used by the fabric:
//! - WARN: teardown anomalies, buffers that could not be recycled
//! - INFO: lifecycle (fabric created/destroyed, interface up/down)
//! - DEBUG: per-frame deliveries and drops, frame dumps
//! - TRACE: address table probes

use tracing_subscriber::EnvFilter;

/// Install a subscriber filtered by `RUST_LOG`, defaulting to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Subscriber for tests; safe to call from every test.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
