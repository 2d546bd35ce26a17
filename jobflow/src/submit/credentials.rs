//! Per-project credential cache with invalidate-and-refresh.

use crate::errors::{JobflowError, StoreError};
use crate::store::SecretStore;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

/// A bearer credential scoped to one project.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    /// Wraps a bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw bearer token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never log token material.
        f.debug_struct("Credential").field("token", &"***").finish()
    }
}

/// Cache of project credentials, the only cross-call shared mutable state
/// in the engine.
///
/// Entries are keyed by project id; concurrent readers may trigger
/// concurrent refreshes of the same key without affecting other projects'
/// entries.
pub struct CredentialCache {
    secrets: Arc<dyn SecretStore>,
    entries: DashMap<String, Credential>,
}

impl CredentialCache {
    /// Creates a cache over a secret store.
    #[must_use]
    pub fn new(secrets: Arc<dyn SecretStore>) -> Self {
        Self {
            secrets,
            entries: DashMap::new(),
        }
    }

    /// Returns the cached credential for a project, fetching it from the
    /// secret store on a miss.
    ///
    /// # Errors
    ///
    /// Fails when the store errors or holds no secret for the project.
    pub async fn bearer(&self, project: &str) -> Result<Credential, JobflowError> {
        if let Some(entry) = self.entries.get(project) {
            return Ok(entry.clone());
        }

        let credential = self
            .secrets
            .secret_for(project)
            .await?
            .ok_or_else(|| StoreError::not_found("secret_for", project))?;
        self.entries
            .insert(project.to_string(), credential.clone());
        Ok(credential)
    }

    /// Drops the cached entry for a project; the next [`Self::bearer`] call
    /// fetches a fresh one.
    pub fn invalidate(&self, project: &str) {
        self.entries.remove(project);
    }
}

impl fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}
