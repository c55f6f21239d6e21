//! Credential entry.

use crate::credentials::{CREDENTIAL_LEN, CREDENTIAL_PREFIX};
use crate::error::{Result, ValidationError};

use super::TaskManager;

impl TaskManager {
    /// Validate and store an API credential
    ///
    /// An empty candidate only resets the validity flag. A malformed candidate is
    /// rejected and the previously stored credential stays in effect.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCredential`] for a non-empty candidate that
    /// fails the format check.
    pub async fn set_credential(&self, candidate: &str) -> Result<()> {
        if self.credentials.commit(candidate).await || candidate.is_empty() {
            return Ok(());
        }

        Err(ValidationError::InvalidCredential {
            expected_len: CREDENTIAL_LEN,
            prefix: CREDENTIAL_PREFIX,
        }
        .into())
    }

    /// Remove the stored credential
    ///
    /// An active task keeps its state, but further ticks fail with
    /// `Unauthenticated` until a new credential is set.
    pub async fn clear_credential(&self) {
        self.credentials.clear().await;
    }

    /// Cached result of the last credential check
    pub async fn credential_valid(&self) -> Option<bool> {
        self.credentials.is_valid().await
    }
}
