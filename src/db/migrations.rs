//! Opening the session database and bringing its schema up to date.

use crate::error::DatabaseError;
use crate::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool};
use std::path::Path;
use std::str::FromStr;

use super::Database;

/// One schema step: version, short description, statements
struct Migration {
    version: i64,
    description: &'static str,
    statements: &'static [&'static str],
}

/// Ordered schema history; versions must be strictly increasing
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "session runtime state",
    statements: &[r#"
        CREATE TABLE IF NOT EXISTS runtime_state (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#],
}];

fn open_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::ConnectionFailed(format!("{context}: {e}")))
}

fn migration_error(version: i64, e: impl std::fmt::Display) -> Error {
    Error::Database(DatabaseError::MigrationFailed(format!(
        "session schema v{version}: {e}"
    )))
}

impl Database {
    /// Open (or create) the session database at `path`
    ///
    /// Missing parent directories are created and pending schema steps are
    /// applied before the handle is returned.
    pub async fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| open_error("cannot create session directory", e))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| open_error("invalid session database path", e))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| open_error("cannot open session database", e))?;

        let db = Self { pool };
        db.apply_pending_migrations().await?;
        Ok(db)
    }

    async fn apply_pending_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| migration_error(0, e))?;

        let applied: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "cannot read session schema version: {e}"
                    )))
                })?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
            self.apply(migration).await?;
        }
        Ok(())
    }

    /// Apply one step atomically; a failure rolls back when the transaction drops
    async fn apply(&self, migration: &Migration) -> Result<()> {
        let version = migration.version;
        tracing::info!(
            version,
            description = migration.description,
            "upgrading session schema"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| migration_error(version, e))?;

        for statement in migration.statements {
            sqlx::query(*statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| migration_error(version, e))?;
        }

        sqlx::query(
            "INSERT INTO schema_version (version, description, applied_at) VALUES (?, ?, ?)",
        )
        .bind(version)
        .bind(migration.description)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| migration_error(version, e))?;

        tx.commit().await.map_err(|e| migration_error(version, e))?;
        Ok(())
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
