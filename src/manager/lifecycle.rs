//! Startup and shutdown coordination.

use crate::error::Result;
use crate::types::{Event, TaskHandle};

use super::TaskManager;

impl TaskManager {
    /// Restore the previous session
    ///
    /// Loads the persisted credential into the credential cache (format check
    /// only, nothing is sent to the service) and, if a task was being polled when
    /// the previous run ended, starts polling it again without re-submitting.
    ///
    /// Returns the resumed task, if any. A persisted task without a usable
    /// credential is left in storage and not resumed.
    ///
    /// # Errors
    ///
    /// Storage read failures are not errors (the session is treated as empty).
    pub async fn resume(&self) -> Result<Option<TaskHandle>> {
        let persisted = self.session.load().await;

        if let Some(stored) = persisted.credential.as_deref() {
            self.credentials.restore(stored).await;
        }

        let Some(handle) = persisted.task else {
            tracing::debug!("no task to resume");
            return Ok(None);
        };

        if self.credentials.current().await.is_none() {
            tracing::warn!(task_id = %handle, "persisted task found but no valid credential, not resuming");
            return Ok(None);
        }

        tracing::info!(task_id = %handle, "resuming task from previous session");
        self.poller.resume(handle.clone()).await?;
        Ok(Some(handle))
    }

    /// Acknowledge the finished task and return to idle
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`](crate::Error::InvalidState) while the task is
    /// still running.
    pub async fn acknowledge(&self) -> Result<()> {
        self.poller.acknowledge().await
    }

    /// Stop observing the active task and forget it
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`](crate::Error::InvalidState) when idle.
    pub async fn cancel(&self) -> Result<()> {
        self.poller.cancel().await
    }

    /// Gracefully shut down the manager
    ///
    /// Disarms the poll timer but keeps the persisted task, so the next
    /// [`resume`](Self::resume) picks it up again.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("initiating shutdown");

        self.poller.shutdown().await;
        self.event_tx.send(Event::Shutdown).ok();

        tracing::info!("shutdown complete - database connections close when the manager is dropped");
        Ok(())
    }
}
