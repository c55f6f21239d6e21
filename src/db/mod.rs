//! Database layer for videogen-tasks
//!
//! Handles SQLite persistence for the session state that must survive a process
//! restart: the active task identifier and the last validated credential.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Opening the database, versioned schema steps
//! - [`state`] - Key/value runtime state

use sqlx::sqlite::SqlitePool;

mod migrations;
mod state;

/// Well-known runtime state keys
pub mod keys {
    /// Identifier of the task currently being polled
    pub const CURRENT_TASK_ID: &str = "current_task_id";
    /// Last credential that passed format validation
    pub const API_KEY: &str = "x_api_key";
}

/// Database handle for videogen-tasks
pub struct Database {
    pool: SqlitePool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
