//! End-to-end tests: JSON graph in, submitted batch and reconciled
//! status out.

use crate::core::{LifecycleState, PipelineRecord, ResultState, RunStatus};
use crate::errors::JobflowError;
use crate::events::CollectingEventSink;
use crate::graph::Graph;
use crate::launch::{LaunchSettings, PipelineLauncher};
use crate::status::StatusReconciler;
use crate::store::JobSpec;
use crate::submit::{
    CredentialCache, RetryPolicy, RunStatePayload, SubmissionClient, TaskRunState,
    TaskStatePayload,
};
use crate::task::RunIf;
use crate::testing::{
    InMemoryJobStore, InMemoryPipelineStore, MockBackend, RecordingHistoryStore,
    StaticSecretStore,
};
use anyhow::Result;
use std::sync::Arc;

const TOP_GRAPH: &str = r#"{
    "graph": [
        { "id": "n1", "vertex": true,
          "value": { "operation": "JOB", "name": "extract", "jobId": "job-extract" } },
        { "id": "n2", "vertex": true,
          "value": { "operation": "PIPELINE", "name": "enrich", "pipelineId": "sub-1" } },
        { "id": "n3", "vertex": true,
          "value": { "operation": "JOB", "name": "load", "jobId": "job-load" } },
        { "id": "e1", "edge": true, "source": "n1", "target": "n2",
          "value": { "successPath": "true" } },
        { "id": "e2", "edge": true, "source": "n2", "target": "n3",
          "value": { "successPath": "true" } }
    ]
}"#;

const SUB_GRAPH: &str = r#"{
    "graph": [
        { "id": "c1", "vertex": true,
          "value": { "operation": "JOB", "name": "clean", "jobId": "job-clean" } },
        { "id": "c2", "vertex": true,
          "value": { "operation": "JOB", "name": "dedupe", "jobId": "job-dedupe" } },
        { "id": "e1", "edge": true, "source": "c1", "target": "c2",
          "value": { "successPath": "true" } }
    ]
}"#;

struct Harness {
    backend: Arc<MockBackend>,
    pipelines: Arc<InMemoryPipelineStore>,
    history: Arc<RecordingHistoryStore>,
    events: Arc<CollectingEventSink>,
    launcher: PipelineLauncher,
    reconciler: StatusReconciler,
}

fn harness(pipelines: InMemoryPipelineStore, jobs: InMemoryJobStore) -> Harness {
    let backend = Arc::new(MockBackend::new());
    let secrets = Arc::new(StaticSecretStore::new("proj", "tok"));
    let cache = Arc::new(CredentialCache::new(secrets));
    let client = Arc::new(SubmissionClient::new(backend.clone(), cache));
    let pipelines = Arc::new(pipelines);
    let jobs = Arc::new(jobs);
    let history = Arc::new(RecordingHistoryStore::new());
    let events = Arc::new(CollectingEventSink::new());

    let launcher = PipelineLauncher::new(
        pipelines.clone(),
        jobs.clone(),
        history.clone(),
        client.clone(),
    )
    .with_events(events.clone())
    .with_settings(LaunchSettings::new().with_retry(RetryPolicy::new(10, 2)));
    let reconciler = StatusReconciler::new(client, pipelines.clone(), history.clone())
        .with_events(events.clone());

    Harness {
        backend,
        pipelines,
        history,
        events,
        launcher,
        reconciler,
    }
}

fn standard_jobs() -> InMemoryJobStore {
    InMemoryJobStore::new()
        .with_spec("job-extract", JobSpec::new("extract"))
        .with_spec("job-load", JobSpec::new("load"))
        .with_spec("job-clean", JobSpec::new("clean"))
        .with_spec("job-dedupe", JobSpec::new("dedupe"))
}

async fn nested_harness() -> Result<Harness> {
    let pipelines = InMemoryPipelineStore::new()
        .with_graph("top", Graph::parse(TOP_GRAPH)?)
        .with_graph("sub-1", Graph::parse(SUB_GRAPH)?);
    let h = harness(pipelines, standard_jobs());
    h.pipelines
        .put_record("proj", PipelineRecord::new("top", "nightly etl"));
    Ok(h)
}

fn depends_of(h: &Harness, task_key: &str) -> Vec<String> {
    let request = h.backend.last_request().unwrap();
    let task = request
        .tasks
        .iter()
        .find(|t| t.task_key == task_key)
        .unwrap_or_else(|| panic!("no task {task_key}"));
    task.depends_on.iter().map(|d| d.task_key.clone()).collect()
}

#[tokio::test]
async fn test_launch_flattens_nested_pipeline() -> Result<()> {
    let h = nested_harness().await?;

    let outcome = h.launcher.launch("proj", "top").await?;
    assert_eq!(outcome.task_count, 4);
    assert!(outcome.run_name.starts_with("nightly_etl-"));

    let request = h.backend.last_request().unwrap();
    let mut keys: Vec<&str> = request.tasks.iter().map(|t| t.task_key.as_str()).collect();
    keys.sort_unstable();
    assert_eq!(
        keys,
        ["clean_n2-c1", "dedupe_n2-c2", "extract_n1", "load_n3"]
    );

    // Hand-flattened dependency chains.
    assert!(depends_of(&h, "extract_n1").is_empty());
    assert_eq!(depends_of(&h, "clean_n2-c1"), vec!["extract_n1"]);
    assert_eq!(depends_of(&h, "dedupe_n2-c2"), vec!["clean_n2-c1"]);
    assert_eq!(depends_of(&h, "load_n3"), vec!["dedupe_n2-c2"]);
    Ok(())
}

#[tokio::test]
async fn test_launch_marks_record_pending_and_records_history() -> Result<()> {
    let h = nested_harness().await?;

    let outcome = h.launcher.launch("proj", "top").await?;

    let record = h.pipelines.record("proj", "top").unwrap();
    assert_eq!(record.status, RunStatus::Pending);
    assert_eq!(record.run, Some(outcome.run));

    let entries = h.history.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].pipeline_id, "top");
    assert_eq!(entries[0].task_count, 4);
    assert_eq!(h.events.event_types(), vec!["run.submitted"]);
    Ok(())
}

#[tokio::test]
async fn test_double_inclusion_yields_disjoint_task_keys() -> Result<()> {
    let top = r#"{
        "graph": [
            { "id": "p1", "vertex": true,
              "value": { "operation": "PIPELINE", "name": "first", "pipelineId": "sub-1" } },
            { "id": "p2", "vertex": true,
              "value": { "operation": "PIPELINE", "name": "second", "pipelineId": "sub-1" } },
            { "id": "e1", "edge": true, "source": "p1", "target": "p2",
              "value": { "successPath": "true" } }
        ]
    }"#;
    let pipelines = InMemoryPipelineStore::new()
        .with_graph("twice", Graph::parse(top)?)
        .with_graph("sub-1", Graph::parse(SUB_GRAPH)?);
    let h = harness(pipelines, standard_jobs());
    h.pipelines
        .put_record("proj", PipelineRecord::new("twice", "twice"));

    let outcome = h.launcher.launch("proj", "twice").await?;
    assert_eq!(outcome.task_count, 4);

    let request = h.backend.last_request().unwrap();
    let keys: std::collections::HashSet<&str> =
        request.tasks.iter().map(|t| t.task_key.as_str()).collect();
    assert_eq!(keys.len(), 4);
    assert!(keys.contains("clean_p1-c1"));
    assert!(keys.contains("clean_p2-c1"));

    // The second inclusion's entry depends on the first's exit.
    assert_eq!(depends_of(&h, "clean_p2-c1"), vec!["dedupe_p1-c2"]);
    Ok(())
}

#[tokio::test]
async fn test_conflicting_conditions_surface_from_launch() -> Result<()> {
    let top = r#"{
        "graph": [
            { "id": "a", "vertex": true,
              "value": { "operation": "JOB", "name": "a", "jobId": "job-extract" } },
            { "id": "b", "vertex": true,
              "value": { "operation": "JOB", "name": "b", "jobId": "job-load" } },
            { "id": "m", "vertex": true,
              "value": { "operation": "JOB", "name": "merge", "jobId": "job-clean" } },
            { "id": "e1", "edge": true, "source": "a", "target": "m",
              "value": { "successPath": "true" } },
            { "id": "e2", "edge": true, "source": "b", "target": "m",
              "value": { "successPath": "false" } }
        ]
    }"#;
    let pipelines = InMemoryPipelineStore::new().with_graph("bad", Graph::parse(top)?);
    let h = harness(pipelines, standard_jobs());
    h.pipelines
        .put_record("proj", PipelineRecord::new("bad", "bad"));

    let err = h.launcher.launch("proj", "bad").await.unwrap_err();
    assert!(matches!(err, JobflowError::ConflictingPathCondition(_)));
    assert_eq!(h.backend.submit_call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn test_submission_wire_payload_shape() -> Result<()> {
    let h = nested_harness().await?;
    h.launcher.launch("proj", "top").await?;

    let request = h.backend.last_request().unwrap();
    let value = serde_json::to_value(&request)?;

    assert!(value["runName"].as_str().unwrap().starts_with("nightly_etl-"));
    let tasks = value["tasks"].as_array().unwrap();
    let load = tasks
        .iter()
        .find(|t| t["taskKey"] == "load_n3")
        .unwrap();
    assert_eq!(load["runIf"], "ALL_SUCCESS");
    assert_eq!(load["dependsOn"][0]["taskKey"], "dedupe_n2-c2");
    assert_eq!(load["environment"]["project"], "proj");
    assert_eq!(load["environment"]["retryIntervalSecs"], 2);
    assert!(load["environment"]["pipelineGraph"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_failure_gated_task_submits_all_failed() -> Result<()> {
    let top = r#"{
        "graph": [
            { "id": "a", "vertex": true,
              "value": { "operation": "JOB", "name": "step", "jobId": "job-extract" } },
            { "id": "b", "vertex": true,
              "value": { "operation": "JOB", "name": "cleanup", "jobId": "job-load" } },
            { "id": "e1", "edge": true, "source": "a", "target": "b",
              "value": { "successPath": "false" } }
        ]
    }"#;
    let pipelines = InMemoryPipelineStore::new().with_graph("guard", Graph::parse(top)?);
    let h = harness(pipelines, standard_jobs());
    h.pipelines
        .put_record("proj", PipelineRecord::new("guard", "guard"));

    h.launcher.launch("proj", "guard").await?;

    let request = h.backend.last_request().unwrap();
    let cleanup = request
        .tasks
        .iter()
        .find(|t| t.task_key == "cleanup_b")
        .unwrap();
    assert_eq!(cleanup.run_if, RunIf::AllFailed);
    Ok(())
}

#[tokio::test]
async fn test_launch_then_reconcile_to_succeeded() -> Result<()> {
    let h = nested_harness().await?;
    let outcome = h.launcher.launch("proj", "top").await?;

    h.backend.set_run_state(
        outcome.run.run_id,
        RunStatePayload {
            lifecycle_state: Some(LifecycleState::Terminated),
            result_state: Some(ResultState::Success),
            start_time: Some(1_700_000_000_000),
            end_time: Some(1_700_000_060_000),
            tasks: vec![TaskStatePayload {
                task_key: "extract_n1".to_string(),
                state: TaskRunState {
                    lifecycle_state: Some(LifecycleState::Terminated),
                    result_state: Some(ResultState::Success),
                },
            }],
        },
    );
    h.backend.set_run_logs(outcome.run.run_id, "done");

    let record = h.pipelines.record("proj", "top").unwrap();
    let snapshot = h
        .reconciler
        .check_and_update("proj", &record)
        .await?
        .unwrap();

    assert_eq!(snapshot.status, RunStatus::Succeeded);
    let stored = h.pipelines.record("proj", "top").unwrap();
    assert_eq!(stored.status, RunStatus::Succeeded);
    assert_eq!(h.history.archived(), vec!["done".to_string()]);
    assert_eq!(
        h.events.event_types(),
        vec!["run.submitted", "status.changed", "logs.archived"]
    );
    Ok(())
}

#[tokio::test]
async fn test_cancel_uses_stored_handle() -> Result<()> {
    let h = nested_harness().await?;
    let outcome = h.launcher.launch("proj", "top").await?;

    h.launcher.cancel("proj", "top").await?;
    assert_eq!(h.backend.cancelled(), vec![outcome.run]);

    // A draft pipeline with no run is a no-op.
    h.pipelines
        .put_record("proj", PipelineRecord::new("idle", "idle"));
    h.launcher.cancel("proj", "idle").await?;
    assert_eq!(h.backend.cancelled().len(), 1);
    Ok(())
}
