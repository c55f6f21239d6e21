//! Task manager facade split into focused submodules.
//!
//! The `TaskManager` struct and its methods are organized by concern:
//! - [`credentials`] - Credential entry and validity
//! - [`submit`] - Job submission
//! - [`lifecycle`] - Resumption, acknowledgment, cancellation and shutdown

mod credentials;
mod lifecycle;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::client::{JobService, RemoteJobClient};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::db::Database;
use crate::error::Result;
use crate::poller::TaskPoller;
use crate::session::{DurableState, SessionStore};
use crate::types::{Event, TaskView};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Main entry point (cloneable - all fields are Arc-wrapped)
///
/// Owns one generation session: the credential, at most one active task and the
/// poller observing it.
#[derive(Clone)]
pub struct TaskManager {
    /// Database instance for persistence
    /// Public for integration tests to inspect persisted session state
    pub db: Arc<Database>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Credential validation and storage
    pub(crate) credentials: CredentialStore,
    /// Persisted active task
    pub(crate) session: SessionStore,
    /// Remote generation service
    pub(crate) service: Arc<dyn JobService>,
    /// Poller for the active task
    pub(crate) poller: TaskPoller,
    /// Set while a submission is in flight
    pub(crate) submitting: Arc<AtomicBool>,
}

impl TaskManager {
    /// Create a new TaskManager talking to the configured HTTP service
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Opens/creates the SQLite database and runs migrations
    /// - Sets up the event broadcast channel
    /// - Builds the HTTP client
    ///
    /// Nothing is resumed yet; call [`resume`](Self::resume) to pick up a task left
    /// over from a previous run.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let (event_tx, _rx) = broadcast::channel(1000);

        let state = DurableState::new(db.clone(), event_tx.clone());
        let credentials = CredentialStore::new(state.clone(), event_tx.clone());
        let client = RemoteJobClient::new(&config.api, credentials.clone())?;

        tracing::info!(
            base_url = client.base_url(),
            interval = ?config.polling.interval,
            "task manager initialized"
        );

        Ok(Self::assemble(
            config,
            db,
            event_tx,
            state,
            credentials,
            Arc::new(client),
        ))
    }

    /// Create a TaskManager backed by a custom [`JobService`]
    ///
    /// Useful for alternative transports and for tests. The service is responsible
    /// for authenticating itself; the manager still refuses to submit or poll while
    /// no valid credential is set.
    pub async fn with_service(config: Config, service: Arc<dyn JobService>) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::new(&config.persistence.database_path).await?);
        let (event_tx, _rx) = broadcast::channel(1000);

        let state = DurableState::new(db.clone(), event_tx.clone());
        let credentials = CredentialStore::new(state.clone(), event_tx.clone());

        Ok(Self::assemble(config, db, event_tx, state, credentials, service))
    }

    fn assemble(
        config: Config,
        db: Arc<Database>,
        event_tx: broadcast::Sender<Event>,
        state: DurableState,
        credentials: CredentialStore,
        service: Arc<dyn JobService>,
    ) -> Self {
        let session = SessionStore::new(state);
        let poller = TaskPoller::new(
            service.clone(),
            credentials.clone(),
            session.clone(),
            config.polling.interval,
            event_tx.clone(),
        );

        Self {
            db,
            config: Arc::new(config),
            event_tx,
            credentials,
            session,
            service,
            poller,
            submitting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to task events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// A subscriber that falls behind by more than 1000 events receives
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Snapshot of the active task for display
    ///
    /// `loading` is also set while a submission is in flight.
    pub async fn view(&self) -> TaskView {
        let mut view = self.poller.view().await;
        view.loading |= self.submitting.load(Ordering::SeqCst);
        view
    }

    /// The task poller
    pub fn poller(&self) -> &TaskPoller {
        &self.poller
    }

    /// The credential store
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// The session store
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
