use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

static INIT: Once = Once::new();

/// Install a process-wide subscriber for integration tests.
///
/// `#[traced_test]` only captures events from the test crate itself, so
/// warnings emitted by `cluster_bootstrap` while joining would be lost.
/// Tests in this directory call this instead, which is safe to call from
/// every test since only the first call installs anything.
pub fn tracing_logger() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("peer_discovery=debug,cluster_bootstrap=trace"));
        let subscriber = FmtSubscriber::builder()
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .with_env_filter(filter)
            .with_test_writer()
            .finish();

        // another harness in the same process may have won the race.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
