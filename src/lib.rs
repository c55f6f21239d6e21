//! # videogen-tasks
//!
//! Client-side lifecycle manager for remote video generation jobs.
//!
//! A job is submitted once, then observed by a poller until the service reports a
//! terminal state. The active task and the API credential are persisted, so a
//! restarted process resumes observing a job instead of submitting it again.
//!
//! ## Design Philosophy
//!
//! - **One task at a time** - submitting again replaces the task being observed
//! - **Library-first** - no CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - consumers subscribe to events or render [`TaskView`] snapshots
//!
//! ## Quick Start
//!
//! ```no_run
//! use videogen_tasks::{Config, GenerationRequest, Model, TaskManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = TaskManager::new(Config::default()).await?;
//!
//!     let mut events = manager.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Pick up a job left over from the previous run, or start a new one
//!     if manager.resume().await?.is_none() {
//!         manager.set_credential("sk-...").await?;
//!         manager
//!             .submit(GenerationRequest::text_to_video("a cat walking", Model::Sora2))
//!             .await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote job client
pub mod client;
/// Configuration types
pub mod config;
/// Credential validation and storage
pub mod credentials;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Task manager facade
pub mod manager;
/// Task poller state machine
pub mod poller;
/// Progress normalization
pub mod progress;
/// Durable session state
pub mod session;
/// Core types and events
pub mod types;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use client::{JobService, RemoteJobClient};
pub use config::{ApiConfig, Config, PersistenceConfig, PollingConfig};
pub use credentials::{Credential, CredentialStore};
pub use db::Database;
pub use error::{DatabaseError, Error, Result, ValidationError};
pub use manager::TaskManager;
pub use poller::TaskPoller;
pub use session::{PersistedSession, SessionStore};
pub use types::{
    AspectRatio, ClipDuration, Event, GenerationMode, GenerationRequest, Model, PollerState,
    TaskHandle, TaskState, TaskStatus, TaskView,
};

/// Run the manager until a termination signal arrives, then shut it down.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to whichever one can be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The active task stays persisted, so the next run's [`TaskManager::resume`]
/// continues observing it.
///
/// # Example
///
/// ```no_run
/// use videogen_tasks::{Config, TaskManager, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = TaskManager::new(Config::default()).await?;
///     manager.resume().await?;
///
///     run_with_shutdown(manager).await?;
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(manager: TaskManager) -> Result<()> {
    wait_for_signal().await;
    manager.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register any signal handler, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
    }
}
