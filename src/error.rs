//! Error types for videogen-tasks
//!
//! This module provides the error taxonomy for the library:
//! - Validation failures detected before any network call
//! - Authentication failures (no credential at call time)
//! - Remote service rejections and malformed responses
//! - Ambient failures (database, transport, configuration)
//!
//! Every variant maps to a stable machine-readable code via [`Error::error_code`].

use thiserror::Error;

/// Result type alias for videogen-tasks operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for videogen-tasks
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before any network call was attempted
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No credential is stored, so the remote service cannot be called
    #[error("no valid API credential is set")]
    Unauthenticated,

    /// The remote service answered with a non-success HTTP status
    #[error("remote service rejected the request with status {status}: {body}")]
    RemoteRejected {
        /// HTTP status code returned by the service
        status: u16,
        /// Raw response body, kept verbatim for diagnostics
        body: String,
    },

    /// The remote service answered with a success status but an unusable body
    #[error("malformed response from remote service: {0}")]
    MalformedResponse(String),

    /// Operation not allowed in the poller's current state
    #[error("cannot {operation} while task poller is {current_state}")]
    InvalidState {
        /// The operation that was attempted (e.g., "acknowledge")
        operation: String,
        /// The current poller state that prevents the operation
        current_state: String,
    },

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "api.base_url")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Transport-level failure talking to the remote service
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Input validation failures
///
/// These are reported to the user immediately; no network call is attempted and no
/// state changes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Prompt is empty or only whitespace
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// Image-to-video mode was requested without any images
    #[error("image-to-video mode requires at least one image")]
    MissingImages,

    /// Credential does not match the expected `sk-` format
    #[error("credential must be {expected_len} characters long and start with \"{prefix}\"")]
    InvalidCredential {
        /// Required credential length
        expected_len: usize,
        /// Required literal prefix
        prefix: &'static str,
    },
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

impl Error {
    /// Machine-readable error code
    ///
    /// Stable across releases; suitable for programmatic handling by embedding
    /// applications and for the `PollFailed` event payload.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Validation(e) => match e {
                ValidationError::EmptyPrompt => "empty_prompt",
                ValidationError::MissingImages => "missing_images",
                ValidationError::InvalidCredential { .. } => "invalid_credential",
            },
            Error::Unauthenticated => "unauthenticated",
            Error::RemoteRejected { .. } => "remote_rejected",
            Error::MalformedResponse(_) => "malformed_response",
            Error::InvalidState { .. } => "invalid_state",
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Network(_) => "network_error",
        }
    }

    /// Whether a poll tick that failed with this error should simply wait for the
    /// next scheduled tick
    ///
    /// Remote and transport failures never abandon an in-flight job; the remote
    /// service stays the source of truth.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RemoteRejected { .. } | Error::MalformedResponse(_) | Error::Network(_)
        )
    }
}
