//! Shared test helpers for creating TaskManager instances in tests.

use crate::config::{ApiConfig, Config, PersistenceConfig, PollingConfig};
use crate::manager::TaskManager;
use crate::test_helpers::FakeService;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};

/// Poll interval used by manager tests
pub(crate) const TEST_INTERVAL: Duration = Duration::from_millis(50);

/// Config pointing at a database inside `dir`
pub(crate) fn test_config(dir: &Path) -> Config {
    // Built field by field so the environment-dependent default is never read
    Config {
        api: ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout: None,
        },
        polling: PollingConfig {
            interval: TEST_INTERVAL,
        },
        persistence: PersistenceConfig {
            database_path: dir.join("test.db"),
        },
    }
}

/// Helper to create a TaskManager backed by a scripted service.
/// Returns the manager, the service and the tempdir (which must be kept alive).
pub(crate) async fn create_test_manager() -> (TaskManager, Arc<FakeService>, TempDir) {
    let temp_dir = tempdir().unwrap();
    let service = FakeService::new();
    let manager = TaskManager::with_service(test_config(temp_dir.path()), service.clone())
        .await
        .unwrap();
    (manager, service, temp_dir)
}

/// Re-open a manager on an existing database, as a restarted process would
pub(crate) async fn reopen_manager(dir: &Path, service: Arc<FakeService>) -> TaskManager {
    TaskManager::with_service(test_config(dir), service)
        .await
        .unwrap()
}
