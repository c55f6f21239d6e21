//! Durable session state
//!
//! Everything that must survive a process restart goes through this module: the
//! identifier of the task being polled and (via [`CredentialStore`](crate::credentials::CredentialStore))
//! the last validated credential. No other component touches durable storage.
//!
//! Writes are best-effort. A failed write is logged and broadcast as
//! [`Event::PersistenceFailed`]; the operation that triggered it still succeeds.

use crate::db::{Database, keys};
use crate::types::{Event, TaskHandle};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Best-effort access to the runtime state table
#[derive(Clone)]
pub(crate) struct DurableState {
    db: Arc<Database>,
    event_tx: broadcast::Sender<Event>,
}

impl DurableState {
    pub(crate) fn new(db: Arc<Database>, event_tx: broadcast::Sender<Event>) -> Self {
        Self { db, event_tx }
    }

    /// Read a value, treating storage failures as "absent"
    pub(crate) async fn read(&self, key: &str) -> Option<String> {
        match self.db.get_state(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read session state");
                None
            }
        }
    }

    /// Write a value; returns false if the write did not reach storage
    pub(crate) async fn write(&self, key: &str, value: &str) -> bool {
        match self.db.set_state(key, value).await {
            Ok(()) => true,
            Err(e) => {
                self.report_failure(key, &e);
                false
            }
        }
    }

    /// Remove a value; returns false if the delete did not reach storage
    pub(crate) async fn remove(&self, key: &str) -> bool {
        match self.db.delete_state(key).await {
            Ok(()) => true,
            Err(e) => {
                self.report_failure(key, &e);
                false
            }
        }
    }

    fn report_failure(&self, key: &str, error: &crate::Error) {
        tracing::warn!(key, error = %error, "failed to persist session state");
        self.event_tx
            .send(Event::PersistenceFailed {
                key: key.to_string(),
                error: error.to_string(),
            })
            .ok();
    }
}

/// Everything read back from storage at process start
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistedSession {
    /// Task that was being polled when the previous run ended
    pub task: Option<TaskHandle>,
    /// Raw credential text stored by the previous run
    pub credential: Option<String>,
}

/// Persists the active task handle
#[derive(Clone)]
pub struct SessionStore {
    state: DurableState,
}

impl SessionStore {
    pub(crate) fn new(state: DurableState) -> Self {
        Self { state }
    }

    /// Read both persisted entries
    pub async fn load(&self) -> PersistedSession {
        PersistedSession {
            task: self.active_task().await,
            credential: self
                .state
                .read(keys::API_KEY)
                .await
                .filter(|v| !v.is_empty()),
        }
    }

    /// The persisted active task, if any
    pub async fn active_task(&self) -> Option<TaskHandle> {
        self.state
            .read(keys::CURRENT_TASK_ID)
            .await
            .filter(|v| !v.is_empty())
            .map(TaskHandle::from)
    }

    /// Record `handle` as the active task
    pub async fn save_active_task(&self, handle: &TaskHandle) -> bool {
        self.state
            .write(keys::CURRENT_TASK_ID, handle.as_str())
            .await
    }

    /// Forget the active task
    pub async fn clear_active_task(&self) -> bool {
        self.state.remove(keys::CURRENT_TASK_ID).await
    }
}
