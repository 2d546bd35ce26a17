//! Collaborator interfaces: pipeline/job definitions, run history, secrets.
//!
//! Persistence itself is out of scope; the engine only consumes these seams.

use crate::core::{PipelineRecord, RunHandle, RunStatus};
use crate::errors::StoreError;
use crate::graph::Graph;
use crate::submit::Credential;
use crate::utils::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored job definition, fetched during task materialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// The job's display name.
    pub name: String,
    /// The backend-facing job settings, passed through untouched.
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

impl JobSpec {
    /// Creates a job spec with empty settings.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Map::new(),
        }
    }

    /// Adds a settings entry.
    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.insert(key.into(), value);
        self
    }
}

/// One row of run history, appended when a batch is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunHistoryEntry {
    /// The launched pipeline's store id.
    pub pipeline_id: String,
    /// The backend run handle.
    pub run: RunHandle,
    /// The run name sent to the backend.
    pub run_name: String,
    /// When the batch was submitted.
    pub submitted_at: Timestamp,
    /// How many tasks the batch carried.
    pub task_count: usize,
}

/// Store of pipeline graphs and pipeline entity records.
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Fetches the authored graph for a pipeline id.
    async fn pipeline_graph(&self, pipeline_id: &str) -> Result<Option<Graph>, StoreError>;

    /// Loads a pipeline entity record.
    async fn load(&self, project: &str, pipeline_id: &str)
        -> Result<Option<PipelineRecord>, StoreError>;

    /// Persists a record's run state: status, handle, and timestamps.
    async fn update_run_state(
        &self,
        project: &str,
        pipeline_id: &str,
        status: RunStatus,
        run: Option<RunHandle>,
        started_at: Option<Timestamp>,
        ended_at: Option<Timestamp>,
    ) -> Result<(), StoreError>;
}

/// Store of job definitions.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetches the job spec referenced by a `Job` node.
    async fn job_spec(&self, job_id: &str) -> Result<Option<JobSpec>, StoreError>;
}

/// Store of run history and archived logs.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends a run-history row.
    async fn record_run(&self, project: &str, entry: RunHistoryEntry) -> Result<(), StoreError>;

    /// Archives the decoded logs of a finished run.
    async fn archive_logs(
        &self,
        project: &str,
        pipeline_id: &str,
        run: &RunHandle,
        logs: &str,
    ) -> Result<(), StoreError>;
}

/// Store of per-project backend credentials.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetches the credential scoped to a project.
    async fn secret_for(&self, project: &str) -> Result<Option<Credential>, StoreError>;
}
