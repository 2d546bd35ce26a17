//! Best-effort reconciliation of backend run state into domain status.

use crate::core::{PipelineRecord, RunHandle, RunSnapshot, RunStatus};
use crate::errors::JobflowError;
use crate::events::{EventSink, NoOpEventSink};
use crate::store::{HistoryStore, PipelineStore};
use crate::submit::SubmissionClient;
use crate::utils::timestamp_from_millis;
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Configuration of the reconciler.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ReconcilerConfig {
    /// Deadline for one fan-out over a page of records, in seconds.
    pub poll_timeout_secs: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            poll_timeout_secs: 3,
        }
    }
}

impl ReconcilerConfig {
    /// Creates the default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fan-out deadline.
    #[must_use]
    pub fn with_poll_timeout_secs(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }
}

/// Polls backend runs for active pipeline records and maps the results
/// back into domain status, persisting transitions through the stores.
pub struct StatusReconciler {
    client: Arc<SubmissionClient>,
    pipelines: Arc<dyn PipelineStore>,
    history: Arc<dyn HistoryStore>,
    events: Arc<dyn EventSink>,
    config: ReconcilerConfig,
}

impl StatusReconciler {
    /// Creates a reconciler over the client and stores.
    #[must_use]
    pub fn new(
        client: Arc<SubmissionClient>,
        pipelines: Arc<dyn PipelineStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            client,
            pipelines,
            history,
            events: Arc::new(NoOpEventSink),
            config: ReconcilerConfig::default(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the config.
    #[must_use]
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Polls one record's run and persists any status transition.
    ///
    /// Records that are not in an active status, or that have no run
    /// handle, are a no-op. On transition to a terminal status the run's
    /// start/finish timestamps are persisted and its logs are archived
    /// best-effort.
    ///
    /// # Errors
    ///
    /// Propagates backend and store failures; log archiving failures are
    /// logged and swallowed.
    pub async fn check_and_update(
        &self,
        project: &str,
        record: &PipelineRecord,
    ) -> Result<Option<RunSnapshot>, JobflowError> {
        if !record.status.is_active() {
            return Ok(None);
        }
        let Some(run) = record.run else {
            return Ok(None);
        };

        let payload = self.client.run_state(project, &run).await?;
        let status = RunStatus::from_backend(payload.lifecycle_state, payload.result_state);
        let task_statuses = payload
            .tasks
            .iter()
            .map(|t| {
                (
                    t.task_key.clone(),
                    RunStatus::from_backend(t.state.lifecycle_state, t.state.result_state),
                )
            })
            .collect();

        let snapshot = RunSnapshot {
            run,
            status,
            task_statuses,
            started_at: timestamp_from_millis(payload.start_time),
            ended_at: timestamp_from_millis(payload.end_time),
        };

        if status == record.status {
            return Ok(Some(snapshot));
        }

        self.events.emit(
            "status.changed",
            Some(json!({
                "pipeline": record.id,
                "run_id": run.run_id,
                "from": record.status.to_string(),
                "to": status.to_string(),
            })),
        );
        self.pipelines
            .update_run_state(
                project,
                &record.id,
                status,
                Some(run),
                snapshot.started_at,
                snapshot.ended_at,
            )
            .await?;

        if status.is_terminal() {
            self.archive_logs_best_effort(project, &record.id, &run).await;
        }

        Ok(Some(snapshot))
    }

    /// Checks a page of records concurrently against one shared deadline.
    ///
    /// Records whose check has not completed by the deadline keep their
    /// previous status for this round; a failed check never blocks results
    /// for sibling records.
    pub async fn check_all(
        &self,
        project: &str,
        records: &[PipelineRecord],
    ) -> Vec<(String, Option<RunSnapshot>)> {
        let deadline = Instant::now() + Duration::from_secs(self.config.poll_timeout_secs);

        let mut pending: FuturesUnordered<_> = records
            .iter()
            .map(|record| async move {
                (
                    record.id.clone(),
                    self.check_and_update(project, record).await,
                )
            })
            .collect();

        let mut results = Vec::with_capacity(records.len());
        loop {
            let next = tokio::time::timeout_at(deadline, pending.next()).await;
            match next {
                Ok(Some((id, Ok(snapshot)))) => results.push((id, snapshot)),
                Ok(Some((id, Err(err)))) => {
                    tracing::warn!(pipeline = %id, error = %err, "status check failed");
                    results.push((id, None));
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        remaining = pending.len(),
                        timeout_secs = self.config.poll_timeout_secs,
                        "status fan-out deadline reached; remaining records keep their status"
                    );
                    break;
                }
            }
        }
        results
    }

    async fn archive_logs_best_effort(&self, project: &str, pipeline_id: &str, run: &RunHandle) {
        let content = match self.client.run_logs(project, run).await {
            Ok(logs) => match logs.decoded() {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(pipeline = %pipeline_id, error = %err, "failed to decode run logs");
                    return;
                }
            },
            Err(err) => {
                tracing::warn!(pipeline = %pipeline_id, error = %err, "failed to fetch run logs");
                return;
            }
        };

        match self
            .history
            .archive_logs(project, pipeline_id, run, &content)
            .await
        {
            Ok(()) => self.events.emit(
                "logs.archived",
                Some(json!({ "pipeline": pipeline_id, "run_id": run.run_id })),
            ),
            Err(err) => {
                tracing::warn!(pipeline = %pipeline_id, error = %err, "failed to archive run logs");
            }
        }
    }
}

impl std::fmt::Debug for StatusReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
