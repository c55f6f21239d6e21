//! Runtime state: plain-text key/value entries that outlive a process run.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Read a runtime state value
    ///
    /// Returns `None` if the key has never been written or was deleted.
    pub async fn get_state(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar(
            r#"
            SELECT value FROM runtime_state WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read runtime state '{}': {}",
                key, e
            )))
        })
    }

    /// Insert or overwrite a runtime state value
    pub async fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO runtime_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write runtime state '{}': {}",
                key, e
            )))
        })?;

        Ok(())
    }

    /// Remove a runtime state value
    ///
    /// Deleting a missing key is not an error.
    pub async fn delete_state(&self, key: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM runtime_state WHERE key = ?
            "#,
        )
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to delete runtime state '{}': {}",
                key, e
            )))
        })?;

        Ok(())
    }
}
