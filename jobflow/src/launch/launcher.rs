//! Orchestration entry point for launching and cancelling pipeline runs.

use crate::core::{RunHandle, RunStatus};
use crate::errors::{JobflowError, StoreError};
use crate::events::{EventSink, NoOpEventSink};
use crate::resolve::resolve;
use crate::store::{HistoryStore, JobStore, PipelineStore, RunHistoryEntry};
use crate::submit::{RetryPolicy, RunSubmitRequest, SubmissionClient};
use crate::task::{materialize_tasks, sanitize_name, RunEnvironment};
use crate::utils::{now_utc, short_run_id};
use serde_json::json;
use std::sync::Arc;

/// Settings applied to every launch.
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct LaunchSettings {
    /// Retry policy for the submission call.
    pub retry: RetryPolicy,
}

impl LaunchSettings {
    /// Creates the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the submission retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// The result of one successful launch.
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    /// The backend run handle.
    pub run: RunHandle,
    /// The run name the batch was submitted under.
    pub run_name: String,
    /// How many tasks the flattened graph produced.
    pub task_count: usize,
}

/// Launches pipelines: fetches the authored graph, flattens it, converts
/// it into a task batch, and submits that batch as one backend run.
///
/// Each launch is a pure function of the graphs fetched at that moment;
/// nothing resolved is cached across calls.
pub struct PipelineLauncher {
    pipelines: Arc<dyn PipelineStore>,
    jobs: Arc<dyn JobStore>,
    history: Arc<dyn HistoryStore>,
    client: Arc<SubmissionClient>,
    events: Arc<dyn EventSink>,
    settings: LaunchSettings,
}

impl PipelineLauncher {
    /// Creates a launcher over the stores and submission client.
    #[must_use]
    pub fn new(
        pipelines: Arc<dyn PipelineStore>,
        jobs: Arc<dyn JobStore>,
        history: Arc<dyn HistoryStore>,
        client: Arc<SubmissionClient>,
    ) -> Self {
        Self {
            pipelines,
            jobs,
            history,
            client,
            events: Arc::new(NoOpEventSink),
            settings: LaunchSettings::default(),
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the launch settings.
    #[must_use]
    pub fn with_settings(mut self, settings: LaunchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Launches one run of a pipeline.
    ///
    /// At most one submission is made per call; idempotency across process
    /// restarts is the backend's concern.
    ///
    /// # Errors
    ///
    /// Structural graph errors, missing collaborator data, and post-budget
    /// backend errors all surface to the caller.
    pub async fn launch(
        &self,
        project: &str,
        pipeline_id: &str,
    ) -> Result<LaunchOutcome, JobflowError> {
        let record = self
            .pipelines
            .load(project, pipeline_id)
            .await?
            .ok_or_else(|| StoreError::not_found("load", pipeline_id))?;
        let graph = self
            .pipelines
            .pipeline_graph(pipeline_id)
            .await?
            .ok_or_else(|| StoreError::not_found("pipeline_graph", pipeline_id))?;

        let resolution = resolve(&graph, self.pipelines.as_ref()).await?;
        let environment = RunEnvironment::for_run(project, &graph, &self.settings.retry);
        let tasks = materialize_tasks(&resolution, self.jobs.as_ref(), &environment).await?;

        let run_name = format!("{}-{}", sanitize_name(&record.name), short_run_id());
        let task_count = tasks.len();
        let request = RunSubmitRequest {
            run_name: run_name.clone(),
            tasks,
        };

        tracing::info!(
            project,
            pipeline = pipeline_id,
            run_name = %run_name,
            tasks = task_count,
            "submitting pipeline run"
        );
        let run = self
            .client
            .submit(project, &request, &self.settings.retry)
            .await?;

        self.pipelines
            .update_run_state(project, pipeline_id, RunStatus::Pending, Some(run), None, None)
            .await?;
        self.history
            .record_run(
                project,
                RunHistoryEntry {
                    pipeline_id: pipeline_id.to_string(),
                    run,
                    run_name: run_name.clone(),
                    submitted_at: now_utc(),
                    task_count,
                },
            )
            .await?;
        self.events.emit(
            "run.submitted",
            Some(json!({
                "pipeline": pipeline_id,
                "run_id": run.run_id,
                "tasks": task_count,
            })),
        );

        Ok(LaunchOutcome {
            run,
            run_name,
            task_count,
        })
    }

    /// Cancels the pipeline's latest run, if it has one.
    ///
    /// # Errors
    ///
    /// Fails when the record is missing or the backend rejects the cancel.
    pub async fn cancel(&self, project: &str, pipeline_id: &str) -> Result<(), JobflowError> {
        let record = self
            .pipelines
            .load(project, pipeline_id)
            .await?
            .ok_or_else(|| StoreError::not_found("load", pipeline_id))?;
        let Some(run) = record.run else {
            tracing::debug!(project, pipeline = pipeline_id, "no run to cancel");
            return Ok(());
        };

        self.client.cancel(project, &run).await?;
        self.events.emit(
            "run.cancelled",
            Some(json!({ "pipeline": pipeline_id, "run_id": run.run_id })),
        );
        Ok(())
    }
}

impl std::fmt::Debug for PipelineLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLauncher")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
