//! Custom test assertions for integration tests

use std::time::Duration;
use tokio::sync::broadcast;
use videogen_tasks::{Event, TaskHandle};

/// Result of waiting for a task to finish
#[derive(Debug)]
pub enum WaitResult {
    /// Task produced an artifact
    Succeeded(String),
    /// Task failed with a reason
    Failed(String),
    /// Timeout waiting for a terminal event
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for `handle` to reach a terminal state
pub async fn wait_for_terminal(
    events: &mut broadcast::Receiver<Event>,
    handle: &TaskHandle,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::Succeeded { handle: h, output }) if &h == handle => {
                    return WaitResult::Succeeded(output);
                }
                Ok(Event::Failed { handle: h, reason }) if &h == handle => {
                    return WaitResult::Failed(reason);
                }
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return WaitResult::ChannelClosed,
            }
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Wait for the first event matching `pred`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    pred: F,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}
