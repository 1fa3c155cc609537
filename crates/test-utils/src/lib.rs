//! Shared fixtures for the integration tests: config/request builders,
//! scripted work units, a recording document and notifier, and a fake
//! process launcher.

pub mod builders;
pub mod fakes;

use std::path::PathBuf;
use std::sync::{Arc, Once};

use remote_runner::fs::mock::MockFileSystem;
use remote_runner::fs::FileSystem;
use remote_runner::store::DropZone;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Drop-zone directory used by in-memory tests.
pub const SPOOL: &str = "/spool";

/// Initialise tracing for tests. Output is captured per test and only shown
/// for failures; set `RUST_LOG=remote_runner=debug` for more.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("remote_runner=debug,info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// A drop zone at [`SPOOL`] over a fresh in-memory filesystem. The returned
/// filesystem shares its tree with the drop zone.
pub fn mock_drop_zone() -> (MockFileSystem, DropZone) {
    let fs = MockFileSystem::new();
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    (fs, DropZone::new(PathBuf::from(SPOOL), shared))
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}
