//! Conversion of resolved graph nodes into submittable tasks.

use crate::errors::{JobflowError, StoreError, UnknownPredecessorError};
use crate::graph::{ConditionKind, NodeKind};
use crate::resolve::Resolution;
use crate::store::{JobSpec, JobStore};
use crate::submit::RetryPolicy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// The conditional execution policy of a task relative to its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunIf {
    /// Run when every dependency succeeded.
    AllSuccess,
    /// Run when every dependency failed.
    AllFailed,
}

impl Default for RunIf {
    fn default() -> Self {
        Self::AllSuccess
    }
}

/// A reference to an upstream task within the same batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    /// The upstream task's key.
    pub task_key: String,
}

/// Run-scoped environment attached to every task payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEnvironment {
    /// The owning project; names the credential scope of the run.
    pub project: String,
    /// Serialized copy of the originating graph.
    pub pipeline_graph: String,
    /// Content hash of the originating graph.
    pub graph_hash: String,
    /// Total retry budget of the submission, in seconds.
    pub retry_within_secs: u64,
    /// Fixed delay between submission attempts, in seconds.
    pub retry_interval_secs: u64,
}

impl RunEnvironment {
    /// Builds the environment for one run of `graph` under `project`.
    #[must_use]
    pub fn for_run(
        project: impl Into<String>,
        graph: &crate::graph::Graph,
        retry: &RetryPolicy,
    ) -> Self {
        Self {
            project: project.into(),
            pipeline_graph: graph.serialize(),
            graph_hash: graph.content_hash(),
            retry_within_secs: retry.within_secs,
            retry_interval_secs: retry.interval_secs,
        }
    }
}

/// One unit of execution submitted to the backend, derived 1:1 from a
/// `Job` node after full inlining.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Deterministic key: `sanitize(name)_namespacedId`.
    pub task_key: String,
    /// Upstream tasks this task waits on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskDependency>,
    /// Gate relative to the dependencies.
    pub run_if: RunIf,
    /// The stored job definition.
    #[serde(flatten)]
    pub job: JobSpec,
    /// Run-scoped environment.
    pub environment: RunEnvironment,
}

fn sanitizer() -> &'static Regex {
    static SANITIZER: OnceLock<Regex> = OnceLock::new();
    SANITIZER.get_or_init(|| Regex::new(r"[^A-Za-z0-9_\-]+").expect("literal pattern"))
}

/// Replaces every run of characters outside `[A-Za-z0-9_-]` with `_`.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    sanitizer().replace_all(name, "_").into_owned()
}

/// The deterministic task key for a node name and namespaced id.
#[must_use]
pub fn task_key(name: &str, namespaced_id: &str) -> String {
    format!("{}_{}", sanitize_name(name), namespaced_id)
}

/// Materializes every `Job` node of a resolution into a task, resolving
/// dependency ids to task keys and fetching job specs from `jobs`.
///
/// # Errors
///
/// Fails when a job spec is missing from the store or a dependency
/// references a node with no task counterpart.
pub async fn materialize_tasks(
    resolution: &Resolution,
    jobs: &dyn JobStore,
    environment: &RunEnvironment,
) -> Result<Vec<Task>, JobflowError> {
    let job_nodes = resolution.job_nodes();

    let key_index: HashMap<&str, String> = job_nodes
        .iter()
        .map(|n| (n.id.as_str(), task_key(n.name(), &n.id)))
        .collect();

    let mut tasks = Vec::with_capacity(job_nodes.len());
    for node in job_nodes {
        let NodeKind::Job { job_id } = &node.kind else {
            continue;
        };

        let spec = jobs
            .job_spec(job_id)
            .await?
            .ok_or_else(|| StoreError::not_found("job_spec", job_id))?;

        let mut depends_on = Vec::new();
        let mut run_if = RunIf::AllSuccess;
        if let Some(set) = resolution.dependencies(&node.id) {
            for dep in set {
                let key = key_index.get(dep.predecessor.as_str()).ok_or_else(|| {
                    UnknownPredecessorError::new(&node.id, &dep.predecessor)
                })?;
                depends_on.push(TaskDependency {
                    task_key: key.clone(),
                });
                // Kinds are uniform across the set by the edge-pass check.
                run_if = match dep.condition.kind() {
                    ConditionKind::Failure => RunIf::AllFailed,
                    ConditionKind::Success => RunIf::AllSuccess,
                };
            }
            depends_on.sort_by(|a, b| a.task_key.cmp(&b.task_key));
        }

        tasks.push(Task {
            task_key: key_index[node.id.as_str()].clone(),
            depends_on,
            run_if,
            job: spec,
            environment: environment.clone(),
        });
    }

    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Graph, Node, PathCondition};
    use crate::resolve::resolve;
    use crate::testing::{InMemoryJobStore, InMemoryPipelineStore};

    fn job(id: &str, name: &str) -> Node {
        Node::new(id, NodeKind::Job {
            job_id: format!("job-{id}"),
        })
        .with_name(name)
    }

    fn environment() -> RunEnvironment {
        RunEnvironment {
            project: "proj".to_string(),
            pipeline_graph: String::new(),
            graph_hash: String::new(),
            retry_within_secs: 10,
            retry_interval_secs: 2,
        }
    }

    fn job_store_for(graph: &Graph) -> InMemoryJobStore {
        let mut store = InMemoryJobStore::new();
        for node in graph.nodes() {
            if let NodeKind::Job { job_id } = &node.kind {
                store = store.with_spec(job_id, JobSpec::new(node.name()));
            }
        }
        store
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("extract users"), "extract_users");
        assert_eq!(sanitize_name("a.b/c"), "a_b_c");
        assert_eq!(sanitize_name("clean-name_1"), "clean-name_1");
    }

    #[test]
    fn test_task_key_formula() {
        assert_eq!(task_key("load data", "P-n1"), "load_data_P-n1");
    }

    #[tokio::test]
    async fn test_one_task_per_job_node_with_direct_predecessors() {
        let graph = Graph::new(
            vec![job("a", "first"), job("b", "second")],
            vec![Edge::new("a", "b", PathCondition::success())],
        );
        let pipelines = InMemoryPipelineStore::new();
        let jobs = job_store_for(&graph);

        let resolution = resolve(&graph, &pipelines).await.unwrap();
        let tasks = materialize_tasks(&resolution, &jobs, &environment())
            .await
            .unwrap();

        assert_eq!(tasks.len(), 2);
        let second = tasks.iter().find(|t| t.task_key == "second_b").unwrap();
        assert_eq!(second.depends_on.len(), 1);
        assert_eq!(second.depends_on[0].task_key, "first_a");
        assert_eq!(second.run_if, RunIf::AllSuccess);
    }

    #[tokio::test]
    async fn test_failure_gate_yields_all_failed() {
        let graph = Graph::new(
            vec![job("a", "step"), job("cleanup", "cleanup")],
            vec![Edge::new("a", "cleanup", PathCondition::failure())],
        );
        let pipelines = InMemoryPipelineStore::new();
        let jobs = job_store_for(&graph);

        let resolution = resolve(&graph, &pipelines).await.unwrap();
        let tasks = materialize_tasks(&resolution, &jobs, &environment())
            .await
            .unwrap();

        let cleanup = tasks
            .iter()
            .find(|t| t.task_key == "cleanup_cleanup")
            .unwrap();
        assert_eq!(cleanup.run_if, RunIf::AllFailed);
    }

    #[tokio::test]
    async fn test_missing_job_spec_fails() {
        let graph = Graph::new(vec![job("a", "first")], vec![]);
        let pipelines = InMemoryPipelineStore::new();
        let jobs = InMemoryJobStore::new();

        let resolution = resolve(&graph, &pipelines).await.unwrap();
        let err = materialize_tasks(&resolution, &jobs, &environment())
            .await
            .unwrap_err();
        assert!(matches!(err, JobflowError::Store(_)));
    }

    #[test]
    fn test_task_wire_shape() {
        let task = Task {
            task_key: "first_a".to_string(),
            depends_on: vec![],
            run_if: RunIf::AllSuccess,
            job: JobSpec::new("first")
                .with_setting("timeoutSeconds", serde_json::json!(600)),
            environment: environment(),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["taskKey"], "first_a");
        assert_eq!(value["runIf"], "ALL_SUCCESS");
        assert_eq!(value["timeoutSeconds"], 600);
        assert!(value.get("dependsOn").is_none());
    }
}
