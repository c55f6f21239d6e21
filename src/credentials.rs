//! API credential validation and storage
//!
//! A credential is valid when it is exactly [`CREDENTIAL_LEN`] characters long and
//! starts with [`CREDENTIAL_PREFIX`]. Only valid credentials are ever persisted.

use crate::db::keys;
use crate::error::ValidationError;
use crate::session::DurableState;
use crate::types::Event;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Required credential length in characters
pub const CREDENTIAL_LEN: usize = 51;

/// Required literal credential prefix
pub const CREDENTIAL_PREFIX: &str = "sk-";

/// Check the structural format of a credential
///
/// Depends only on the length and the prefix, never on the characters after it.
pub fn validate(candidate: &str) -> bool {
    candidate.chars().count() == CREDENTIAL_LEN && candidate.starts_with(CREDENTIAL_PREFIX)
}

/// A credential that passed [`validate`]
///
/// `Debug` output is redacted so credentials never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validate and wrap a candidate
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCredential`] if the format check fails.
    pub fn parse(candidate: &str) -> Result<Self, ValidationError> {
        if validate(candidate) {
            Ok(Self(candidate.to_string()))
        } else {
            Err(ValidationError::InvalidCredential {
                expected_len: CREDENTIAL_LEN,
                prefix: CREDENTIAL_PREFIX,
            })
        }
    }

    /// The raw token, for building the `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential({}***)", CREDENTIAL_PREFIX)
    }
}

#[derive(Default)]
struct Cached {
    value: Option<Credential>,
    valid: Option<bool>,
}

/// Owns the API credential: validation, persistence and the cached validity flag
///
/// The in-memory cache is authoritative once populated (this store is the only
/// writer); storage is consulted when the cache is empty.
#[derive(Clone)]
pub struct CredentialStore {
    state: DurableState,
    cache: Arc<RwLock<Cached>>,
    event_tx: broadcast::Sender<Event>,
}

impl CredentialStore {
    pub(crate) fn new(state: DurableState, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            state,
            cache: Arc::new(RwLock::new(Cached::default())),
            event_tx,
        }
    }

    /// Persist `candidate` as the current credential if it is valid
    ///
    /// An invalid candidate leaves the previously stored credential untouched but
    /// still updates the validity flag. An empty candidate resets the flag without
    /// touching storage. Returns whether the candidate was valid.
    pub async fn commit(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            self.cache.write().await.valid = None;
            return false;
        }

        let credential = match Credential::parse(candidate) {
            Ok(credential) => credential,
            Err(_) => {
                tracing::debug!("rejected credential with invalid format");
                self.cache.write().await.valid = Some(false);
                self.event_tx
                    .send(Event::CredentialChanged { valid: Some(false) })
                    .ok();
                return false;
            }
        };

        {
            let mut cache = self.cache.write().await;
            cache.value = Some(credential.clone());
            cache.valid = Some(true);
        }
        self.state.write(keys::API_KEY, credential.expose()).await;

        tracing::info!("API credential stored");
        self.event_tx
            .send(Event::CredentialChanged { valid: Some(true) })
            .ok();
        true
    }

    /// Remove the stored credential and reset the validity flag
    pub async fn clear(&self) {
        {
            let mut cache = self.cache.write().await;
            cache.value = None;
            cache.valid = None;
        }
        self.state.remove(keys::API_KEY).await;

        tracing::info!("API credential cleared");
        self.event_tx
            .send(Event::CredentialChanged { valid: None })
            .ok();
    }

    /// The current credential, or `None` if none is set
    pub async fn current(&self) -> Option<Credential> {
        if let Some(credential) = self.cache.read().await.value.clone() {
            return Some(credential);
        }

        let stored = self.state.read(keys::API_KEY).await?;
        match Credential::parse(&stored) {
            Ok(credential) => Some(credential),
            Err(_) => {
                tracing::warn!("stored credential has an invalid format, ignoring it");
                None
            }
        }
    }

    /// Result of the last validity check (`None` = never checked or cleared)
    pub async fn is_valid(&self) -> Option<bool> {
        self.cache.read().await.valid
    }

    /// Load a credential read back from storage into the cache
    ///
    /// Only the structural format is checked; nothing is written back.
    pub(crate) async fn restore(&self, stored: &str) -> bool {
        let parsed = Credential::parse(stored).ok();
        let valid = parsed.is_some();

        let mut cache = self.cache.write().await;
        cache.value = parsed;
        cache.valid = Some(valid);

        if !valid {
            tracing::warn!("restored credential has an invalid format");
        }
        valid
    }
}
