//! Shared test helpers: a scripted in-memory job service and event waiters.

use crate::client::JobService;
use crate::error::{Error, Result};
use crate::types::{Event, GenerationRequest, TaskHandle, TaskOutput, TaskState, TaskStatus};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};

/// A credential that passes format validation
pub(crate) const VALID_KEY: &str = "sk-abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUV";

/// Upper bound for any single wait in async tests
pub(crate) const WAIT: Duration = Duration::from_secs(3);

/// Build a status snapshot
pub(crate) fn snapshot(
    id: &str,
    state: TaskState,
    progress: &str,
    output: Option<&str>,
    reason: Option<&str>,
) -> TaskStatus {
    TaskStatus {
        task_id: TaskHandle::new(id),
        platform: "sora".to_string(),
        action: "generate".to_string(),
        status: state,
        fail_reason: reason.map(str::to_string),
        submit_time: 1_700_000_000,
        start_time: 0,
        finish_time: 0,
        progress: progress.to_string(),
        data: TaskOutput {
            output: output.map(str::to_string),
        },
        search_item: String::new(),
    }
}

/// One scripted answer to `fetch_status`
#[derive(Clone, Debug)]
pub(crate) enum Reply {
    Status(TaskStatus),
    Rejected(u16),
}

impl Reply {
    pub(crate) fn in_progress(id: &str, progress: &str) -> Self {
        Reply::Status(snapshot(id, TaskState::InProgress, progress, None, None))
    }

    pub(crate) fn success(id: &str, output: Option<&str>) -> Self {
        Reply::Status(snapshot(id, TaskState::Success, "100", output, None))
    }

    pub(crate) fn failure(id: &str, reason: Option<&str>) -> Self {
        Reply::Status(snapshot(id, TaskState::Failure, "", None, reason))
    }

    fn into_result(self) -> Result<TaskStatus> {
        match self {
            Reply::Status(status) => Ok(status),
            Reply::Rejected(status) => Err(Error::RemoteRejected {
                status,
                body: "scripted rejection".to_string(),
            }),
        }
    }
}

/// In-memory [`JobService`] driven by per-task scripts
///
/// Each task's replies are consumed in order; the last one repeats forever. A task
/// with a gate blocks every fetch until a permit is released.
#[derive(Default)]
pub(crate) struct FakeService {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    submissions: Mutex<VecDeque<Result<TaskHandle>>>,
    fetches: Mutex<Vec<TaskHandle>>,
    submitted: Mutex<Vec<GenerationRequest>>,
}

impl FakeService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn script(&self, id: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), replies.into());
    }

    /// Block fetches for `id`; each permit added to the returned semaphore lets one through
    pub(crate) fn gate(&self, id: &str, permits: usize) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(permits));
        self.gates
            .lock()
            .unwrap()
            .insert(id.to_string(), gate.clone());
        gate
    }

    pub(crate) fn accept(&self, id: &str) {
        self.submissions
            .lock()
            .unwrap()
            .push_back(Ok(TaskHandle::new(id)));
    }

    pub(crate) fn reject_submit(&self, status: u16) {
        self.submissions
            .lock()
            .unwrap()
            .push_back(Err(Error::RemoteRejected {
                status,
                body: "scripted rejection".to_string(),
            }));
    }

    pub(crate) fn fetch_count(&self, id: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|h| h.as_str() == id)
            .count()
    }

    pub(crate) fn submitted(&self) -> Vec<GenerationRequest> {
        self.submitted.lock().unwrap().clone()
    }

    fn next_reply(&self, id: &str) -> Reply {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(id) {
            Some(replies) if replies.len() > 1 => replies.pop_front().unwrap(),
            Some(replies) if !replies.is_empty() => replies[0].clone(),
            _ => Reply::in_progress(id, ""),
        }
    }
}

#[async_trait]
impl JobService for FakeService {
    async fn submit(&self, request: &GenerationRequest) -> Result<TaskHandle> {
        request.validate()?;
        self.submitted.lock().unwrap().push(request.clone());
        self.submissions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::MalformedResponse("no scripted submission".to_string())))
    }

    async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        self.fetches.lock().unwrap().push(handle.clone());

        let gate = self.gates.lock().unwrap().get(handle.as_str()).cloned();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }

        self.next_reply(handle.as_str()).into_result()
    }
}

/// Wait for the first event matching `pred`, skipping everything else
pub(crate) async fn wait_for_event<F>(rx: &mut broadcast::Receiver<Event>, pred: F) -> Event
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Check `cond` every few milliseconds until it holds
pub(crate) async fn wait_until<F>(cond: F)
where
    F: Fn() -> bool,
{
    tokio::time::timeout(WAIT, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
