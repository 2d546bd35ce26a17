//! In-memory collaborator stores.

use crate::core::{PipelineRecord, RunHandle, RunStatus};
use crate::errors::StoreError;
use crate::graph::Graph;
use crate::store::{HistoryStore, JobSpec, JobStore, PipelineStore, RunHistoryEntry, SecretStore};
use crate::submit::Credential;
use crate::utils::Timestamp;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// In-memory pipeline store holding graphs and entity records.
#[derive(Debug, Default)]
pub struct InMemoryPipelineStore {
    graphs: DashMap<String, Graph>,
    records: DashMap<(String, String), PipelineRecord>,
}

impl InMemoryPipelineStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pipeline graph.
    #[must_use]
    pub fn with_graph(self, pipeline_id: impl Into<String>, graph: Graph) -> Self {
        self.graphs.insert(pipeline_id.into(), graph);
        self
    }

    /// Inserts or replaces a record.
    pub fn put_record(&self, project: &str, record: PipelineRecord) {
        self.records
            .insert((project.to_string(), record.id.clone()), record);
    }

    /// Reads back a record.
    #[must_use]
    pub fn record(&self, project: &str, pipeline_id: &str) -> Option<PipelineRecord> {
        self.records
            .get(&(project.to_string(), pipeline_id.to_string()))
            .map(|r| r.clone())
    }
}

#[async_trait]
impl PipelineStore for InMemoryPipelineStore {
    async fn pipeline_graph(&self, pipeline_id: &str) -> Result<Option<Graph>, StoreError> {
        Ok(self.graphs.get(pipeline_id).map(|g| g.clone()))
    }

    async fn load(
        &self,
        project: &str,
        pipeline_id: &str,
    ) -> Result<Option<PipelineRecord>, StoreError> {
        Ok(self
            .records
            .get(&(project.to_string(), pipeline_id.to_string()))
            .map(|r| r.clone()))
    }

    async fn update_run_state(
        &self,
        project: &str,
        pipeline_id: &str,
        status: RunStatus,
        run: Option<RunHandle>,
        started_at: Option<Timestamp>,
        ended_at: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        let key = (project.to_string(), pipeline_id.to_string());
        let mut record = self
            .records
            .get_mut(&key)
            .ok_or_else(|| StoreError::not_found("update_run_state", pipeline_id))?;
        record.status = status;
        record.run = run;
        record.started_at = started_at;
        record.ended_at = ended_at;
        Ok(())
    }
}

/// In-memory job-definition store.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    specs: DashMap<String, JobSpec>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a job spec.
    #[must_use]
    pub fn with_spec(self, job_id: impl Into<String>, spec: JobSpec) -> Self {
        self.specs.insert(job_id.into(), spec);
        self
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn job_spec(&self, job_id: &str) -> Result<Option<JobSpec>, StoreError> {
        Ok(self.specs.get(job_id).map(|s| s.clone()))
    }
}

/// History store that records everything it is given.
#[derive(Debug, Default)]
pub struct RecordingHistoryStore {
    entries: Mutex<Vec<(String, RunHistoryEntry)>>,
    logs: Mutex<Vec<String>>,
}

impl RecordingHistoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorded run-history entries.
    #[must_use]
    pub fn entries(&self) -> Vec<RunHistoryEntry> {
        self.entries.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// The archived log contents, in arrival order.
    #[must_use]
    pub fn archived(&self) -> Vec<String> {
        self.logs.lock().clone()
    }
}

#[async_trait]
impl HistoryStore for RecordingHistoryStore {
    async fn record_run(&self, project: &str, entry: RunHistoryEntry) -> Result<(), StoreError> {
        self.entries.lock().push((project.to_string(), entry));
        Ok(())
    }

    async fn archive_logs(
        &self,
        _project: &str,
        _pipeline_id: &str,
        _run: &RunHandle,
        logs: &str,
    ) -> Result<(), StoreError> {
        self.logs.lock().push(logs.to_string());
        Ok(())
    }
}

/// Secret store with fixed per-project tokens and a fetch counter.
#[derive(Debug)]
pub struct StaticSecretStore {
    secrets: DashMap<String, String>,
    fetches: AtomicUsize,
}

impl StaticSecretStore {
    /// Creates a store holding one project's token.
    #[must_use]
    pub fn new(project: impl Into<String>, token: impl Into<String>) -> Self {
        let secrets = DashMap::new();
        secrets.insert(project.into(), token.into());
        Self {
            secrets,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Adds another project's token.
    #[must_use]
    pub fn with_secret(self, project: impl Into<String>, token: impl Into<String>) -> Self {
        self.secrets.insert(project.into(), token.into());
        self
    }

    /// How many times the store was queried.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for StaticSecretStore {
    async fn secret_for(&self, project: &str) -> Result<Option<Credential>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .secrets
            .get(project)
            .map(|token| Credential::new(token.clone())))
    }
}
