//! Tracing initialisation for tests.

use tracing_subscriber::EnvFilter;

/// Install a subscriber writing to the test-harness writer, filtered by
/// `RUST_LOG` (default `debug` for llmrelay crates).
///
/// Idempotent; later calls are ignored.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,llmrelay_core=debug")),
        )
        .with_test_writer()
        .try_init();
}
