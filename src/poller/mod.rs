//! Task poller state machine
//!
//! Tracks one remote task at a time through `Idle → Polling → Succeeded | Failed`.
//!
//! # Timer ownership
//!
//! The repeating timer is an owned field of the poller's state record. Arming and
//! disarming are the only operations that touch it, and arming always disarms first,
//! so at most one timer exists per poller at any instant.
//!
//! # Stale responses
//!
//! Every (re)start bumps an arming epoch. A status result is applied only if the
//! handle it was fetched for is still active *and* the epoch it was fetched under is
//! still current; anything else is discarded. An in-flight call is never aborted by
//! disarming, it simply has its result thrown away.
//!
//! # Ticks
//!
//! Each tick awaits its status call before applying the result; ticks are never
//! pipelined and ticks missed while a call was outstanding are skipped. A failing
//! tick never changes state; the next scheduled tick is the retry.

use crate::client::JobService;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::progress;
use crate::session::SessionStore;
use crate::types::{Event, PollerState, TaskHandle, TaskState, TaskStatus, TaskView};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Shown when the service reports FAILURE without a reason
const DEFAULT_FAILURE_REASON: &str = "video generation failed";

/// What a tick did to the state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TickOutcome {
    /// Still polling; keep the timer armed
    Continue,
    /// Reached Succeeded or Failed
    Terminal,
    /// Result belonged to a handle/epoch that is no longer current
    Stale,
}

/// The armed repeating timer
struct PollTimer {
    epoch: u64,
    token: CancellationToken,
}

/// Mutable state record of the poller
#[derive(Default)]
struct PollerInner {
    state: PollerState,
    active: Option<TaskHandle>,
    epoch: u64,
    timer: Option<PollTimer>,
    status: Option<TaskStatus>,
    progress: String,
    output: Option<String>,
    failure: Option<String>,
    last_error: Option<String>,
    loading: bool,
}

impl PollerInner {
    /// Cancel the armed timer, if any; returns whether one was armed
    fn disarm(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                tracing::debug!(epoch = timer.epoch, "disarming poll timer");
                timer.token.cancel();
                true
            }
            None => false,
        }
    }

    fn is_current(&self, handle: &TaskHandle, epoch: u64) -> bool {
        self.epoch == epoch && self.active.as_ref() == Some(handle)
    }

    /// Forget everything about the active task and return to Idle
    fn reset(&mut self) -> Option<TaskHandle> {
        self.disarm();
        self.epoch += 1;
        self.state = PollerState::Idle;
        self.status = None;
        self.progress.clear();
        self.output = None;
        self.failure = None;
        self.last_error = None;
        self.loading = false;
        self.active.take()
    }

    fn view(&self) -> TaskView {
        TaskView {
            state: self.state,
            handle: self.active.clone(),
            status: self.status.clone(),
            progress: self.progress.clone(),
            output: self.output.clone(),
            failure: self.failure.clone(),
            last_error: self.last_error.clone(),
            loading: self.loading,
            armed: self.timer.is_some(),
        }
    }
}

struct Shared {
    service: Arc<dyn JobService>,
    credentials: CredentialStore,
    session: SessionStore,
    interval: Duration,
    event_tx: broadcast::Sender<Event>,
    inner: Mutex<PollerInner>,
    /// Number of timer loops still running (including ones finishing a stale call)
    live_loops: AtomicUsize,
}

/// Decrements the live loop counter when a timer loop exits
struct LoopGuard<'a>(&'a AtomicUsize);

impl<'a> LoopGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for LoopGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Polls the remote service for the active task until it reaches a terminal state
///
/// Cheap to clone; clones share the same state machine.
#[derive(Clone)]
pub struct TaskPoller {
    shared: Arc<Shared>,
}

impl TaskPoller {
    /// Create an idle poller
    pub fn new(
        service: Arc<dyn JobService>,
        credentials: CredentialStore,
        session: SessionStore,
        interval: Duration,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                credentials,
                session,
                interval,
                event_tx,
                inner: Mutex::new(PollerInner::default()),
                live_loops: AtomicUsize::new(0),
            }),
        }
    }

    /// Start polling `handle`
    ///
    /// Records the handle as active, persists it, performs one status fetch right
    /// away and then arms the repeating timer (unless that first fetch already
    /// reached a terminal state). Any previously armed timer is disarmed first, so
    /// calling this while polling replaces the active task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without changing state if no credential
    /// is set. Status fetch failures are not errors; they are recorded in the view
    /// and polling continues.
    pub async fn start(&self, handle: TaskHandle) -> Result<()> {
        self.begin(handle, false).await
    }

    /// Replace the active task with `handle`
    ///
    /// Same as [`start`](Self::start): the old timer is disarmed before the new one
    /// is armed and late results for the old task are discarded.
    pub async fn replace(&self, handle: TaskHandle) -> Result<()> {
        self.begin(handle, false).await
    }

    /// Start polling a task restored from a previous session
    pub(crate) async fn resume(&self, handle: TaskHandle) -> Result<()> {
        self.begin(handle, true).await
    }

    async fn begin(&self, handle: TaskHandle, resumed: bool) -> Result<()> {
        if self.shared.credentials.current().await.is_none() {
            return Err(Error::Unauthenticated);
        }

        let epoch = {
            let mut inner = self.shared.inner.lock().await;
            if let Some(previous) = inner.reset() {
                tracing::info!(previous = %previous, task_id = %handle, "replacing active task");
            }
            inner.state = PollerState::Polling;
            inner.active = Some(handle.clone());
            inner.loading = true;

            // Persisted under the lock so concurrent starts cannot reorder writes
            self.shared.session.save_active_task(&handle).await;
            inner.epoch
        };

        tracing::info!(task_id = %handle, resumed, "polling started");
        self.shared
            .event_tx
            .send(Event::PollingStarted {
                handle: handle.clone(),
                resumed,
            })
            .ok();

        if self.tick(&handle, epoch).await == TickOutcome::Continue {
            self.arm(handle, epoch).await;
        }

        Ok(())
    }

    /// Arm the repeating timer for `handle` if it is still the current task
    async fn arm(&self, handle: TaskHandle, epoch: u64) {
        let token = CancellationToken::new();
        {
            let mut inner = self.shared.inner.lock().await;
            if !inner.is_current(&handle, epoch) || inner.state != PollerState::Polling {
                tracing::debug!(task_id = %handle, "task superseded before timer was armed");
                return;
            }
            inner.disarm();
            inner.timer = Some(PollTimer {
                epoch,
                token: token.clone(),
            });
        }

        let poller = self.clone();
        tokio::spawn(async move {
            poller.run_timer(handle, epoch, token).await;
        });
    }

    async fn run_timer(&self, handle: TaskHandle, epoch: u64, token: CancellationToken) {
        let _guard = LoopGuard::enter(&self.shared.live_loops);
        let interval = self.shared.interval;

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::debug!(task_id = %handle, ?interval, "poll timer armed");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if self.tick(&handle, epoch).await != TickOutcome::Continue {
                break;
            }
            if token.is_cancelled() {
                break;
            }
        }

        tracing::debug!(task_id = %handle, "poll timer stopped");
    }

    /// Fetch one status snapshot and apply it
    async fn tick(&self, handle: &TaskHandle, epoch: u64) -> TickOutcome {
        let result = self.shared.service.fetch_status(handle).await;

        let mut inner = self.shared.inner.lock().await;
        if !inner.is_current(handle, epoch) {
            tracing::debug!(task_id = %handle, "discarding stale status response");
            return TickOutcome::Stale;
        }

        match result {
            Ok(status) => self.apply(&mut inner, handle, status),
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!(task_id = %handle, error = %e, "status poll failed, retrying next tick");
                } else {
                    tracing::error!(task_id = %handle, error = %e, "status poll failed, retrying next tick");
                }
                inner.last_error = Some(e.to_string());
                self.shared
                    .event_tx
                    .send(Event::PollFailed {
                        handle: handle.clone(),
                        code: e.error_code().to_string(),
                        error: e.to_string(),
                    })
                    .ok();
                TickOutcome::Continue
            }
        }
    }

    fn apply(&self, inner: &mut PollerInner, handle: &TaskHandle, status: TaskStatus) -> TickOutcome {
        inner.progress = progress::normalize(&status.progress);
        inner.last_error = None;

        let state = status.status;
        let output = status.output().map(str::to_string);
        let reason = status.failure_reason().map(str::to_string);
        inner.status = Some(status);

        match (state, output) {
            (TaskState::Success, Some(output)) => {
                inner.disarm();
                inner.state = PollerState::Succeeded;
                inner.output = Some(output.clone());
                inner.loading = false;

                tracing::info!(task_id = %handle, output = %output, "task succeeded");
                self.shared
                    .event_tx
                    .send(Event::Succeeded {
                        handle: handle.clone(),
                        output,
                    })
                    .ok();
                TickOutcome::Terminal
            }
            (TaskState::Failure, _) => {
                let reason = reason.unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
                inner.disarm();
                inner.state = PollerState::Failed;
                inner.failure = Some(reason.clone());
                inner.loading = false;

                tracing::warn!(task_id = %handle, reason = %reason, "task failed");
                self.shared
                    .event_tx
                    .send(Event::Failed {
                        handle: handle.clone(),
                        reason,
                    })
                    .ok();
                TickOutcome::Terminal
            }
            (state, _) => {
                if state == TaskState::Success {
                    tracing::debug!(task_id = %handle, "task reported success without output, waiting");
                } else {
                    tracing::debug!(task_id = %handle, %state, progress = %inner.progress, "task status updated");
                }
                self.shared
                    .event_tx
                    .send(Event::StatusUpdated {
                        handle: handle.clone(),
                        state,
                        progress: inner.progress.clone(),
                    })
                    .ok();
                TickOutcome::Continue
            }
        }
    }

    /// Acknowledge a finished task and return to Idle
    ///
    /// Allowed in `Succeeded` and `Failed`, and while still `Polling` if the latest
    /// snapshot already reports a terminal remote state. Clears the active handle,
    /// the snapshot and the persisted task entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] in any other state.
    pub async fn acknowledge(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;

        let terminal_snapshot = inner
            .status
            .as_ref()
            .is_some_and(|s| s.status.is_terminal());
        let allowed = inner.state.is_terminal()
            || (inner.state == PollerState::Polling && terminal_snapshot);
        if !allowed {
            return Err(Error::InvalidState {
                operation: "acknowledge".to_string(),
                current_state: inner.state.to_string(),
            });
        }

        let handle = inner.reset();
        self.shared.session.clear_active_task().await;
        drop(inner);

        if let Some(handle) = handle {
            tracing::info!(task_id = %handle, "task acknowledged");
            self.shared
                .event_tx
                .send(Event::Acknowledged { handle })
                .ok();
        }
        Ok(())
    }

    /// Abandon the active task without waiting for it to finish
    ///
    /// The remote job is not cancelled; this poller just stops observing it and
    /// forgets the persisted entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] when idle.
    pub async fn cancel(&self) -> Result<()> {
        let mut inner = self.shared.inner.lock().await;

        if inner.state == PollerState::Idle {
            return Err(Error::InvalidState {
                operation: "cancel".to_string(),
                current_state: inner.state.to_string(),
            });
        }

        let handle = inner.reset();
        self.shared.session.clear_active_task().await;
        drop(inner);

        if let Some(handle) = handle {
            tracing::info!(task_id = %handle, "task polling cancelled");
            self.shared.event_tx.send(Event::Cancelled { handle }).ok();
        }
        Ok(())
    }

    /// Stop the timer but keep the persisted task for the next run
    pub async fn shutdown(&self) {
        let mut inner = self.shared.inner.lock().await;
        let was_armed = inner.disarm();
        if inner.active.is_some() {
            // Invalidates the timer loop and any first fetch still in flight
            inner.epoch += 1;
            tracing::info!(task_id = ?inner.active, was_armed, "polling stopped for shutdown");
        }
    }

    /// Snapshot of the poller for display
    pub async fn view(&self) -> TaskView {
        self.shared.inner.lock().await.view()
    }

    /// Current state
    pub async fn state(&self) -> PollerState {
        self.shared.inner.lock().await.state
    }

    /// Whether the repeating timer is armed
    pub async fn is_armed(&self) -> bool {
        self.shared.inner.lock().await.timer.is_some()
    }

    /// Timer loops that have not exited yet
    #[cfg(test)]
    pub(crate) fn live_loops(&self) -> usize {
        self.shared.live_loops.load(Ordering::SeqCst)
    }
}
