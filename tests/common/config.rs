//! Test configuration helpers for mock servers and live credentials

use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use videogen_tasks::config::{ApiConfig, PersistenceConfig, PollingConfig};
use videogen_tasks::{Config, TaskManager};

/// A credential that passes format validation (never valid against the real service)
pub const TEST_KEY: &str = "sk-abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUV";

/// Poll interval for tests against a mock server
pub const FAST_INTERVAL: Duration = Duration::from_millis(50);

/// Config for a manager talking to `base_url` with its database inside `dir`
pub fn mock_config(base_url: &str, dir: &Path) -> Config {
    Config {
        api: ApiConfig {
            base_url: base_url.to_string(),
            request_timeout: Some(Duration::from_secs(5)),
        },
        polling: PollingConfig {
            interval: FAST_INTERVAL,
        },
        persistence: PersistenceConfig {
            database_path: dir.join("test.db"),
        },
    }
}

/// Create a manager against a mock server with [`TEST_KEY`] already set
///
/// Returns the manager and temp directory (keep temp_dir alive for test duration)
pub async fn create_mock_manager(base_url: &str) -> (TaskManager, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let manager = TaskManager::new(mock_config(base_url, temp_dir.path()))
        .await
        .expect("Failed to create manager");
    manager
        .set_credential(TEST_KEY)
        .await
        .expect("Test key should be accepted");
    (manager, temp_dir)
}

/// Load the live API key from the environment (`VIDEOGEN_API_KEY`, `.env` supported)
pub fn load_live_key() -> Option<String> {
    dotenvy::dotenv().ok();
    std::env::var("VIDEOGEN_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Skip the current test if no live API key is available
#[macro_export]
macro_rules! skip_if_no_live_key {
    () => {
        if $crate::common::load_live_key().is_none() {
            eprintln!("Skipping test: VIDEOGEN_API_KEY not found in environment or .env");
            return;
        }
    };
}
