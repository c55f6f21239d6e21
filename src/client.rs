//! Remote job client
//!
//! Wraps the two HTTP operations of the generation service behind the
//! [`JobService`] trait so the poller can be driven by any implementation.

use crate::config::ApiConfig;
use crate::credentials::{Credential, CredentialStore};
use crate::error::{Error, Result};
use crate::types::{GenerationRequest, SubmitResponse, TaskHandle, TaskStatus};
use async_trait::async_trait;

/// Path of the generation collection, relative to the base URL
const GENERATIONS_PATH: &str = "/v2/videos/generations";

/// The remote generation service
///
/// Implementations make exactly one network call per method and never retry; the
/// poller's next tick is the only retry mechanism.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submit a new generation job
    async fn submit(&self, request: &GenerationRequest) -> Result<TaskHandle>;

    /// Fetch the current status snapshot of a job
    async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatus>;
}

/// HTTP implementation of [`JobService`]
///
/// Borrows the credential from the [`CredentialStore`] for the duration of each call.
#[derive(Clone)]
pub struct RemoteJobClient {
    http: reqwest::Client,
    base_url: String,
    credentials: CredentialStore,
}

impl RemoteJobClient {
    /// Create a client for the configured service origin
    pub fn new(api: &ApiConfig, credentials: CredentialStore) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = api.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn credential(&self) -> Result<Credential> {
        self.credentials.current().await.ok_or(Error::Unauthenticated)
    }

    /// Read the body and turn non-success statuses into `RemoteRejected`
    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), body = %body, "remote service rejected request");
            return Err(Error::RemoteRejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl JobService for RemoteJobClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<TaskHandle> {
        let credential = self.credential().await?;
        request.validate()?;

        let body = request.to_body();
        tracing::debug!(
            model = ?body.model,
            images = body.images.len(),
            "submitting generation job"
        );

        let response = self
            .http
            .post(format!("{}{}", self.base_url, GENERATIONS_PATH))
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await?;

        let text = Self::read_body(response).await?;

        let parsed: SubmitResponse = serde_json::from_str(&text).map_err(|e| {
            Error::MalformedResponse(format!("submit response is not valid JSON: {}", e))
        })?;

        match parsed.task_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                tracing::info!(task_id = %id, "generation job accepted");
                Ok(TaskHandle::from(id))
            }
            None => Err(Error::MalformedResponse(
                "submit response has no task_id".to_string(),
            )),
        }
    }

    async fn fetch_status(&self, handle: &TaskHandle) -> Result<TaskStatus> {
        let credential = self.credential().await?;

        let response = self
            .http
            .get(format!(
                "{}{}/{}",
                self.base_url,
                GENERATIONS_PATH,
                urlencoding::encode(handle.as_str())
            ))
            .bearer_auth(credential.expose())
            .send()
            .await?;

        let text = Self::read_body(response).await?;

        serde_json::from_str(&text).map_err(|e| {
            Error::MalformedResponse(format!("status response for {} is invalid: {}", handle, e))
        })
    }
}
