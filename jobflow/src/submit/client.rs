//! Submission client: retry loop plus credential refresh around the
//! backend seam.

use super::{retry_fixed, CredentialCache, ExecutionBackend, RetryPolicy};
use super::{Credential, RunLogs, RunStatePayload, RunSubmitRequest};
use crate::core::RunHandle;
use crate::errors::{BackendError, JobflowError};
use std::future::Future;
use std::sync::Arc;

/// Client for submitting, cancelling, and observing backend runs.
///
/// Submission runs under the caller's fixed-delay retry policy. Every call
/// carries the project's bearer credential; if the backend reports the
/// credential expired, the cache entry is invalidated and the whole call is
/// re-issued exactly once, outside the retry budget.
pub struct SubmissionClient {
    backend: Arc<dyn ExecutionBackend>,
    credentials: Arc<CredentialCache>,
}

impl SubmissionClient {
    /// Creates a client over a backend and credential cache.
    #[must_use]
    pub fn new(backend: Arc<dyn ExecutionBackend>, credentials: Arc<CredentialCache>) -> Self {
        Self {
            backend,
            credentials,
        }
    }

    /// Submits a task batch, returning the backend's run handle.
    ///
    /// # Errors
    ///
    /// Propagates the last retryable error once the policy's attempt budget
    /// is exhausted; non-retryable backend errors escalate immediately.
    pub async fn submit(
        &self,
        project: &str,
        request: &RunSubmitRequest,
        policy: &RetryPolicy,
    ) -> Result<RunHandle, JobflowError> {
        let backend = &self.backend;
        self.with_credential(project, |credential| async move {
            retry_fixed(policy, "runs/submit", || {
                backend.submit_run(&credential, request)
            })
            .await
        })
        .await
    }

    /// Cancels a run.
    ///
    /// # Errors
    ///
    /// Propagates backend failures; credential expiry is refreshed once.
    pub async fn cancel(&self, project: &str, run: &RunHandle) -> Result<(), JobflowError> {
        let backend = &self.backend;
        self.with_credential(project, |credential| async move {
            backend.cancel_run(&credential, run).await
        })
        .await
    }

    /// Polls a run's backend state.
    ///
    /// # Errors
    ///
    /// Propagates backend failures; credential expiry is refreshed once.
    pub async fn run_state(
        &self,
        project: &str,
        run: &RunHandle,
    ) -> Result<RunStatePayload, JobflowError> {
        let backend = &self.backend;
        self.with_credential(project, |credential| async move {
            backend.run_state(&credential, run).await
        })
        .await
    }

    /// Exports a run's logs.
    ///
    /// # Errors
    ///
    /// Propagates backend failures; credential expiry is refreshed once.
    pub async fn run_logs(&self, project: &str, run: &RunHandle) -> Result<RunLogs, JobflowError> {
        let backend = &self.backend;
        self.with_credential(project, |credential| async move {
            backend.run_logs(&credential, run).await
        })
        .await
    }

    async fn with_credential<T, F, Fut>(&self, project: &str, call: F) -> Result<T, JobflowError>
    where
        F: Fn(Credential) -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut refreshed = false;
        loop {
            let credential = self.credentials.bearer(project).await?;
            match call(credential).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_auth_expired() && !refreshed => {
                    tracing::debug!(project, "backend credential expired, refreshing");
                    self.credentials.invalidate(project);
                    refreshed = true;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl std::fmt::Debug for SubmissionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionClient").finish_non_exhaustive()
    }
}
