//! Run handles, run snapshots, and persisted pipeline records.

use super::RunStatus;
use crate::utils::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque handle to one backend run, returned by submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunHandle {
    /// The backend's run identifier.
    pub run_id: u64,
}

impl RunHandle {
    /// Creates a handle from a backend run id.
    #[must_use]
    pub fn new(run_id: u64) -> Self {
        Self { run_id }
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run:{}", self.run_id)
    }
}

/// One reconciliation observation of a backend run.
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    /// The run that was polled.
    pub run: RunHandle,
    /// The mapped domain status of the run as a whole.
    pub status: RunStatus,
    /// Mapped status per task key.
    pub task_statuses: HashMap<String, RunStatus>,
    /// When the backend started the run.
    pub started_at: Option<Timestamp>,
    /// When the backend finished the run.
    pub ended_at: Option<Timestamp>,
}

impl RunSnapshot {
    /// Aggregates this snapshot's task statuses into one pipeline status.
    #[must_use]
    pub fn aggregate_tasks(&self) -> RunStatus {
        RunStatus::aggregate(self.task_statuses.values().copied())
    }

    /// Aggregates the statuses of the tasks with the given keys.
    ///
    /// Used to derive the status of an inlined sub-pipeline from its own
    /// slice of the flattened task set.
    #[must_use]
    pub fn aggregate_for<'a, I>(&self, keys: I) -> RunStatus
    where
        I: IntoIterator<Item = &'a str>,
    {
        RunStatus::aggregate(
            keys.into_iter()
                .filter_map(|k| self.task_statuses.get(k).copied()),
        )
    }
}

/// A persisted pipeline entity, as loaded from the pipeline store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRecord {
    /// The pipeline's store identifier.
    pub id: String,
    /// The pipeline's display name.
    pub name: String,
    /// The current domain status.
    #[serde(default)]
    pub status: RunStatus,
    /// The latest run handle, if the pipeline was ever submitted.
    pub run: Option<RunHandle>,
    /// When the latest run started.
    pub started_at: Option<Timestamp>,
    /// When the latest run ended.
    pub ended_at: Option<Timestamp>,
}

impl PipelineRecord {
    /// Creates a new draft record.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: RunStatus::Draft,
            run: None,
            started_at: None,
            ended_at: None,
        }
    }

    /// Sets the status.
    #[must_use]
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the run handle.
    #[must_use]
    pub fn with_run(mut self, run: RunHandle) -> Self {
        self.run = Some(run);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_handle_display() {
        assert_eq!(RunHandle::new(42).to_string(), "run:42");
    }

    #[test]
    fn test_record_defaults_to_draft() {
        let record = PipelineRecord::new("p-1", "nightly");
        assert_eq!(record.status, RunStatus::Draft);
        assert!(record.run.is_none());
    }

    #[test]
    fn test_snapshot_aggregate_for_subset() {
        let mut task_statuses = HashMap::new();
        task_statuses.insert("a_n1".to_string(), RunStatus::Succeeded);
        task_statuses.insert("b_n2-x".to_string(), RunStatus::Running);
        task_statuses.insert("c_n2-y".to_string(), RunStatus::Succeeded);

        let snapshot = RunSnapshot {
            run: RunHandle::new(1),
            status: RunStatus::Running,
            task_statuses,
            started_at: None,
            ended_at: None,
        };

        assert_eq!(snapshot.aggregate_tasks(), RunStatus::Running);
        assert_eq!(
            snapshot.aggregate_for(["b_n2-x", "c_n2-y"]),
            RunStatus::Running
        );
        assert_eq!(snapshot.aggregate_for(["a_n1"]), RunStatus::Succeeded);
    }
}
