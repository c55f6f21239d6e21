//! Job submission.

use crate::error::{Error, Result};
use crate::types::{Event, GenerationRequest, TaskHandle};
use std::sync::atomic::Ordering;

use super::TaskManager;

/// Resets the submitting flag when a submission ends, however it ends
struct SubmittingGuard<'a>(&'a std::sync::atomic::AtomicBool);

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TaskManager {
    /// Submit a generation job and start polling it
    ///
    /// The request is checked locally first (credential present, prompt non-empty,
    /// images present for image-to-video); nothing is sent if that fails. On success
    /// the returned handle becomes the active task, replacing any task that was
    /// being polled.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthenticated`] if no credential is set
    /// - [`Error::Validation`] if the request is incomplete
    /// - [`Error::RemoteRejected`] / [`Error::MalformedResponse`] / [`Error::Network`]
    ///   if the service did not accept the job
    pub async fn submit(&self, request: GenerationRequest) -> Result<TaskHandle> {
        if self.credentials.current().await.is_none() {
            return Err(Error::Unauthenticated);
        }
        request.validate()?;

        let handle = {
            self.submitting.store(true, Ordering::SeqCst);
            let _guard = SubmittingGuard(&self.submitting);
            self.service.submit(&request).await
        };

        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, model = ?request.model, "job submission failed");
                return Err(e);
            }
        };

        tracing::info!(task_id = %handle, model = ?request.model, mode = ?request.mode, "job submitted");
        self.event_tx
            .send(Event::Submitted {
                handle: handle.clone(),
            })
            .ok();

        self.poller.start(handle.clone()).await?;
        Ok(handle)
    }
}
