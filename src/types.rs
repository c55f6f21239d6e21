//! Core types and events for videogen-tasks

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Opaque identifier of a remote generation task
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    /// Create a new TaskHandle
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as sent by the service
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TaskHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for TaskHandle {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl PartialEq<&str> for TaskHandle {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generation model offered by the service
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    /// Standard model
    #[default]
    #[serde(rename = "sora-2")]
    Sora2,
    /// Pro model; the only one that accepts HD and duration
    #[serde(rename = "sora-2-pro")]
    Sora2Pro,
}

impl Model {
    /// Whether HD and duration are transmitted for this model
    pub fn supports_hd_and_duration(&self) -> bool {
        matches!(self, Model::Sora2Pro)
    }
}

/// Output aspect ratio
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    /// Landscape
    #[default]
    #[serde(rename = "16:9")]
    Landscape,
    /// Portrait
    #[serde(rename = "9:16")]
    Portrait,
}

/// Clip length in seconds (pro model only)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClipDuration {
    /// Ten seconds
    #[default]
    #[serde(rename = "10")]
    Ten,
    /// Fifteen seconds
    #[serde(rename = "15")]
    Fifteen,
}

/// How the video is generated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    /// Prompt only
    #[default]
    TextToVideo,
    /// Prompt plus one or more reference images
    ImageToVideo,
}

/// A video generation job as the caller describes it
///
/// The wire body is derived from this by [`GenerationRequest::to_body`], which applies
/// the mode and model gating rules.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GenerationRequest {
    /// Text prompt (must be non-empty after trimming)
    pub prompt: String,
    /// Model to generate with
    pub model: Model,
    /// Text-to-video or image-to-video
    pub mode: GenerationMode,
    /// Base64 image payloads or data URLs (image-to-video only)
    pub images: Vec<String>,
    /// Output aspect ratio
    pub aspect_ratio: Option<AspectRatio>,
    /// HD output (pro model only)
    pub hd: Option<bool>,
    /// Clip duration (pro model only)
    pub duration: Option<ClipDuration>,
    /// Callback URL the service notifies on completion
    pub notify_hook: Option<String>,
}

impl GenerationRequest {
    /// Create a text-to-video request
    pub fn text_to_video(prompt: impl Into<String>, model: Model) -> Self {
        Self {
            prompt: prompt.into(),
            model,
            ..Default::default()
        }
    }

    /// Create an image-to-video request
    pub fn image_to_video(prompt: impl Into<String>, model: Model, images: Vec<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model,
            mode: GenerationMode::ImageToVideo,
            images,
            ..Default::default()
        }
    }

    /// Check the required fields
    ///
    /// # Errors
    ///
    /// - [`ValidationError::EmptyPrompt`] if the prompt is blank
    /// - [`ValidationError::MissingImages`] in image-to-video mode without images
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        if self.mode == GenerationMode::ImageToVideo && self.images.is_empty() {
            return Err(ValidationError::MissingImages);
        }
        Ok(())
    }

    /// Build the JSON body sent to the service
    ///
    /// The prompt is trimmed, images are only included in image-to-video mode (with
    /// any data-URL prefix stripped), and `hd`/`duration` are only included for the
    /// pro model.
    pub fn to_body(&self) -> SubmitBody {
        let images = match self.mode {
            GenerationMode::ImageToVideo => self
                .images
                .iter()
                .map(|image| strip_data_url_prefix(image).to_string())
                .collect(),
            GenerationMode::TextToVideo => Vec::new(),
        };

        let pro = self.model.supports_hd_and_duration();

        SubmitBody {
            prompt: self.prompt.trim().to_string(),
            model: self.model,
            images,
            aspect_ratio: self.aspect_ratio,
            hd: if pro { self.hd } else { None },
            duration: if pro { self.duration } else { None },
            notify_hook: self.notify_hook.clone(),
        }
    }
}

/// Reduce a `data:<mime>;base64,<payload>` URL to its payload
///
/// Input without a comma is returned unchanged.
pub fn strip_data_url_prefix(image: &str) -> &str {
    match image.find(',') {
        Some(idx) => &image[idx + 1..],
        None => image,
    }
}

/// JSON body of `POST /v2/videos/generations`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmitBody {
    /// Trimmed prompt
    pub prompt: String,
    /// Model name
    pub model: Model,
    /// Raw base64 images
    pub images: Vec<String>,
    /// Aspect ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<AspectRatio>,
    /// HD flag (pro model only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hd: Option<bool>,
    /// Duration (pro model only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<ClipDuration>,
    /// Completion callback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_hook: Option<String>,
}

/// Success body of the submit call
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub(crate) task_id: Option<String>,
}

/// Remote lifecycle state of a task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    /// Accepted but not yet picked up
    NotStart,
    /// Being generated
    InProgress,
    /// Finished successfully
    Success,
    /// Finished with an error
    Failure,
}

impl TaskState {
    /// Whether the service will not change this state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Success | TaskState::Failure)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TaskState::NotStart => "not started",
            TaskState::InProgress => "in progress",
            TaskState::Success => "completed",
            TaskState::Failure => "failed",
        };
        f.write_str(label)
    }
}

/// Result payload attached to a task
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    /// Reference (usually a URL) to the produced video
    #[serde(default, deserialize_with = "non_empty_string")]
    pub output: Option<String>,
}

/// Snapshot of a task as returned by `GET /v2/videos/generations/{task_id}`
///
/// Each poll produces a fresh snapshot; snapshots are never merged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Task identifier
    pub task_id: TaskHandle,
    /// Backend platform name
    #[serde(default, deserialize_with = "null_as_default")]
    pub platform: String,
    /// Backend action name
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    /// Lifecycle state
    pub status: TaskState,
    /// Failure reason (only meaningful for FAILURE)
    #[serde(default, deserialize_with = "non_empty_string")]
    pub fail_reason: Option<String>,
    /// Unix timestamp of submission
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub submit_time: i64,
    /// Unix timestamp generation started
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub start_time: i64,
    /// Unix timestamp generation finished
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub finish_time: i64,
    /// Raw progress as sent by the service ("10", "10%", 10, ...)
    #[serde(default, deserialize_with = "progress_as_text")]
    pub progress: String,
    /// Result payload
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: TaskOutput,
    /// Opaque search key
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_item: String,
}

impl TaskStatus {
    /// Artifact reference, present only once the task succeeded with a payload
    pub fn output(&self) -> Option<&str> {
        match self.status {
            TaskState::Success => self.data.output.as_deref(),
            _ => None,
        }
    }

    /// Failure reason, present only for failed tasks
    pub fn failure_reason(&self) -> Option<&str> {
        match self.status {
            TaskState::Failure => self.fail_reason.as_deref(),
            _ => None,
        }
    }
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Bookkeeping timestamps are informational; anything that is not a number
/// (null, text, objects) decodes as 0 and fractional seconds are truncated.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .unwrap_or_default(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().map_or(0, |f| {
            if f.is_finite() { f as i64 } else { 0 }
        }),
        _ => 0,
    })
}

fn progress_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Local state of the task poller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollerState {
    /// No active task
    #[default]
    Idle,
    /// A task is active and the timer is armed
    Polling,
    /// The active task produced a result
    Succeeded,
    /// The active task failed
    Failed,
}

impl PollerState {
    /// Whether acknowledgment is required before the next task
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollerState::Succeeded | PollerState::Failed)
    }
}

impl std::fmt::Display for PollerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PollerState::Idle => "idle",
            PollerState::Polling => "polling",
            PollerState::Succeeded => "succeeded",
            PollerState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Point-in-time view of the task poller, suitable for rendering
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TaskView {
    /// Poller state
    pub state: PollerState,
    /// Active task, if any
    pub handle: Option<TaskHandle>,
    /// Latest snapshot received for the active task
    pub status: Option<TaskStatus>,
    /// Normalized progress ("10%"), empty before the first snapshot
    pub progress: String,
    /// Produced artifact reference (Succeeded only)
    pub output: Option<String>,
    /// Failure reason (Failed only)
    pub failure: Option<String>,
    /// Last non-fatal poll error, cleared by the next good tick
    pub last_error: Option<String>,
    /// Whether a loading indicator should be shown
    pub loading: bool,
    /// Whether the repeating timer is armed
    pub armed: bool,
}

/// Event emitted during the task lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job was accepted by the service
    Submitted {
        /// Task handle returned by the service
        handle: TaskHandle,
    },

    /// The poller started observing a task
    PollingStarted {
        /// Task handle
        handle: TaskHandle,
        /// True when restored from a previous session
        resumed: bool,
    },

    /// A non-terminal (or payload-less SUCCESS) snapshot was applied
    StatusUpdated {
        /// Task handle
        handle: TaskHandle,
        /// Remote state
        state: TaskState,
        /// Normalized progress
        progress: String,
    },

    /// Task finished with a result
    Succeeded {
        /// Task handle
        handle: TaskHandle,
        /// Artifact reference
        output: String,
    },

    /// Task finished with an error
    Failed {
        /// Task handle
        handle: TaskHandle,
        /// Failure reason
        reason: String,
    },

    /// A poll tick failed; polling continues
    PollFailed {
        /// Task handle
        handle: TaskHandle,
        /// Machine-readable error code
        code: String,
        /// Error message
        error: String,
    },

    /// The terminal task was acknowledged and cleared
    Acknowledged {
        /// Task handle
        handle: TaskHandle,
    },

    /// The active task was abandoned by the user
    Cancelled {
        /// Task handle
        handle: TaskHandle,
    },

    /// A credential was committed or cleared
    CredentialChanged {
        /// Validity of the new credential (None when cleared)
        valid: Option<bool>,
    },

    /// A best-effort write to durable storage failed
    PersistenceFailed {
        /// Storage key
        key: String,
        /// Error message
        error: String,
    },

    /// Task manager is shutting down
    Shutdown,
}
