// crates/observability/src/lib.rs
//! Tracing initialization shared by consumers and integration tests.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, filtered by `RUST_LOG` with an
/// `info` default. Safe to call more than once; later calls are no-ops.
pub fn init() {
    init_with_filter("info");
}

/// Like [`init`] but with an explicit default filter directive, used by
/// tests that want `debug` output for the tracker crates only.
pub fn init_with_filter(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_init_does_not_panic() {
        init();
        init();
        init_with_filter("debug");
        tracing::info!("subscriber installed");
    }
}
