pub mod builders;
pub mod fake_executor;
pub mod probe;
pub mod reporter;

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{RunConfigBuilder, task};
pub use fake_executor::{FakeBehaviour, FakeExecutor};
pub use probe::ScriptedProbe;
pub use reporter::RecordingReporter;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Logs go through `with_test_writer()`, so the harness only shows them for
/// failing tests. Pick levels with e.g. `RUST_LOG=xp=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}
