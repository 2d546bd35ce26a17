//! Execution-backend seam: wire types, response classification, trait.

use super::Credential;
use crate::core::{LifecycleState, ResultState, RunHandle};
use crate::errors::BackendError;
use crate::task::Task;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// The batch submitted to the backend as one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSubmitRequest {
    /// Display name of the run.
    pub run_name: String,
    /// The flattened task batch.
    pub tasks: Vec<Task>,
}

/// Backend state of one task within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRunState {
    /// The task's lifecycle state.
    pub lifecycle_state: Option<LifecycleState>,
    /// The task's result state, present once terminated.
    pub result_state: Option<ResultState>,
}

/// Per-task entry of a status poll response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskStatePayload {
    /// The task key the batch was submitted with.
    pub task_key: String,
    /// The task's backend state.
    #[serde(default)]
    pub state: TaskRunState,
}

/// Status poll response for a whole run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunStatePayload {
    /// The run's lifecycle state.
    pub lifecycle_state: Option<LifecycleState>,
    /// The run's result state, present once terminated.
    pub result_state: Option<ResultState>,
    /// Per-task states.
    #[serde(default)]
    pub tasks: Vec<TaskStatePayload>,
    /// Epoch milliseconds the run started.
    pub start_time: Option<i64>,
    /// Epoch milliseconds the run ended.
    pub end_time: Option<i64>,
}

/// Exported logs of a finished run, base64-encoded by the backend.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunLogs {
    /// Base64-encoded log content.
    pub content: Option<String>,
}

impl RunLogs {
    /// Decodes the log content to UTF-8 text.
    ///
    /// # Errors
    ///
    /// Fails when the payload is not valid base64 or not valid UTF-8.
    pub fn decoded(&self) -> Result<String, BackendError> {
        let Some(content) = &self.content else {
            return Ok(String::new());
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(content)
            .map_err(|e| BackendError::Decode(format!("log content: {e}")))?;
        String::from_utf8(bytes).map_err(|e| BackendError::Decode(format!("log content: {e}")))
    }
}

/// Configuration of the backend client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the backend API.
    pub base_url: String,
    /// Response codes the retry loop may catch.
    pub retryable_statuses: Vec<u16>,
    /// Response codes meaning the bearer credential expired.
    pub auth_expired_statuses: Vec<u16>,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            retryable_statuses: vec![429, 500, 502, 503, 504],
            auth_expired_statuses: vec![401, 403],
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Creates a config for a backend base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Sets the retryable status set.
    #[must_use]
    pub fn with_retryable_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.retryable_statuses = statuses;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Classifies an error response into the backend error taxonomy.
    #[must_use]
    pub fn classify(&self, status: u16, message: impl Into<String>) -> BackendError {
        if self.auth_expired_statuses.contains(&status) {
            BackendError::AuthExpired { status }
        } else if self.retryable_statuses.contains(&status) {
            BackendError::Retryable {
                status,
                message: message.into(),
            }
        } else {
            BackendError::Fatal {
                status,
                message: message.into(),
            }
        }
    }
}

/// The external job-execution backend.
///
/// Every call carries the caller's bearer credential; implementations do
/// not cache or refresh credentials themselves.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Submits a task batch as one run.
    async fn submit_run(
        &self,
        credential: &Credential,
        request: &RunSubmitRequest,
    ) -> Result<RunHandle, BackendError>;

    /// Cancels a run.
    async fn cancel_run(
        &self,
        credential: &Credential,
        run: &RunHandle,
    ) -> Result<(), BackendError>;

    /// Polls a run's state.
    async fn run_state(
        &self,
        credential: &Credential,
        run: &RunHandle,
    ) -> Result<RunStatePayload, BackendError>;

    /// Exports a run's logs.
    async fn run_logs(
        &self,
        credential: &Credential,
        run: &RunHandle,
    ) -> Result<RunLogs, BackendError>;
}
