//! Recursive graph resolution with pipeline inlining.
//!
//! Two passes per graph level. The edge pass records, for every edge, the
//! pair `(source, condition)` into the target's dependency set. The inlining
//! pass replaces each `Pipeline` node with the resolved contents of the
//! graph it references: entry nodes inherit the replaced node's dependency
//! set, and dependents of the replaced node are rewritten onto its exit
//! nodes. Sub-graph ids are namespaced with the instantiating node's id
//! before recursion, so the same pipeline included at two positions cannot
//! collide.
//!
//! All state lives in a [`Resolution`] accumulator built per call; nothing
//! is shared across invocations.

use crate::errors::{
    ConflictingPathConditionError, CyclicPipelineReferenceError, JobflowError,
    UnresolvedPipelineReferenceError,
};
use crate::graph::{Graph, Node, NodeKind, PathCondition};
use crate::store::PipelineStore;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::{HashMap, HashSet};

/// One incoming dependency of a node: a predecessor and the path condition
/// the edge carried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    /// The predecessor node id.
    pub predecessor: String,
    /// The path condition gating the edge.
    pub condition: PathCondition,
}

impl Dependency {
    /// Creates a dependency entry.
    #[must_use]
    pub fn new(predecessor: impl Into<String>, condition: PathCondition) -> Self {
        Self {
            predecessor: predecessor.into(),
            condition,
        }
    }
}

/// A node's full set of incoming dependencies.
pub type DependencySet = HashSet<Dependency>;

/// The result of resolving one graph: a flat dependency map plus an index
/// of the concrete nodes that remain after inlining.
#[derive(Debug, Default)]
pub struct Resolution {
    deps: HashMap<String, DependencySet>,
    nodes: HashMap<String, Node>,
    entries: Vec<String>,
    exits: Vec<String>,
}

impl Resolution {
    /// The dependency set recorded for a node, if any.
    #[must_use]
    pub fn dependencies(&self, id: &str) -> Option<&DependencySet> {
        self.deps.get(id)
    }

    /// Looks up a concrete node by (namespaced) id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All concrete nodes remaining after inlining, in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// The `Job` nodes remaining after inlining, ordered by id.
    #[must_use]
    pub fn job_nodes(&self) -> Vec<&Node> {
        let mut jobs: Vec<&Node> = self.nodes.values().filter(|n| n.kind.is_job()).collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        jobs
    }

    /// Entry nodes of the resolved graph (no internal incoming edges).
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Exit nodes of the resolved graph (no internal outgoing edges).
    #[must_use]
    pub fn exits(&self) -> &[String] {
        &self.exits
    }
}

/// Resolves a top-level graph into a flat dependency map, recursively
/// inlining every `Pipeline` node through `provider`.
///
/// # Errors
///
/// `ConflictingPathCondition` when a node's incoming edges disagree on the
/// success/failure kind, `UnresolvedPipelineReference` when a referenced
/// graph cannot be fetched, `CyclicPipelineReference` when a pipeline
/// directly or transitively references itself.
pub async fn resolve(
    top: &Graph,
    provider: &dyn PipelineStore,
) -> Result<Resolution, JobflowError> {
    let mut chain = Vec::new();
    resolve_level(top, provider, &mut chain).await
}

fn resolve_level<'a>(
    graph: &'a Graph,
    provider: &'a dyn PipelineStore,
    chain: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<Resolution, JobflowError>> {
    async move {
        let mut nodes: HashMap<String, Node> = graph
            .nodes()
            .iter()
            .filter(|n| n.kind.is_executable())
            .map(|n| (n.id.clone(), n.clone()))
            .collect();

        // Edge pass: record (source, condition) into each target's set.
        // Driven from each node's own outgoing list; merging, idempotent.
        let mut deps: HashMap<String, DependencySet> = HashMap::new();
        for node in graph.nodes() {
            if !node.kind.is_executable() {
                continue;
            }
            for edge in &node.outgoing {
                if !nodes.contains_key(&edge.target) {
                    tracing::debug!(
                        source = %edge.source,
                        target = %edge.target,
                        "skipping edge to non-executable node"
                    );
                    continue;
                }
                insert_dependency(
                    &mut deps,
                    &edge.target,
                    Dependency::new(edge.source.clone(), edge.condition()),
                )?;
            }
        }

        // Boundary nodes of this level, in graph order.
        let mut entries: Vec<String> = graph
            .nodes()
            .iter()
            .filter(|n| n.kind.is_executable())
            .filter(|n| deps.get(&n.id).map_or(true, HashSet::is_empty))
            .map(|n| n.id.clone())
            .collect();
        let mut exits: Vec<String> = graph
            .nodes()
            .iter()
            .filter(|n| n.kind.is_executable())
            .filter(|n| n.outgoing.iter().all(|e| !nodes.contains_key(&e.target)))
            .map(|n| n.id.clone())
            .collect();

        // Inlining pass. Sibling order does not matter: each inlining only
        // touches entries that reference its own node id.
        let pipeline_nodes: Vec<Node> = graph
            .nodes()
            .iter()
            .filter(|n| n.kind.is_pipeline())
            .cloned()
            .collect();

        for pnode in pipeline_nodes {
            let NodeKind::Pipeline { pipeline_id } = &pnode.kind else {
                continue;
            };

            if chain.iter().any(|seen| seen == pipeline_id) {
                let mut cycle = chain.clone();
                cycle.push(pipeline_id.clone());
                return Err(CyclicPipelineReferenceError::new(cycle).into());
            }

            let sub_graph = provider
                .pipeline_graph(pipeline_id)
                .await?
                .ok_or_else(|| {
                    UnresolvedPipelineReferenceError::new(&pnode.id, pipeline_id)
                })?;

            let namespaced = sub_graph.namespaced(&pnode.id);
            chain.push(pipeline_id.clone());
            let sub = resolve_level(&namespaced, provider, chain).await?;
            chain.pop();

            let inherited = deps.remove(&pnode.id).unwrap_or_default();
            nodes.remove(&pnode.id);
            deps.extend(sub.deps);
            nodes.extend(sub.nodes);

            // Entry nodes inherit the dependency set that pointed at the
            // replaced pipeline node.
            for entry in &sub.entries {
                let set = deps.entry(entry.clone()).or_default();
                set.extend(inherited.iter().cloned());
            }

            // Dependents of the pipeline node now depend on its exit nodes,
            // keeping the original path condition.
            if sub.exits.is_empty() {
                tracing::debug!(node = %pnode.id, "inlined sub-graph has no exit nodes");
            }
            for set in deps.values_mut() {
                let referencing: Vec<Dependency> = set
                    .iter()
                    .filter(|d| d.predecessor == pnode.id)
                    .cloned()
                    .collect();
                for dep in referencing {
                    set.remove(&dep);
                    for exit in &sub.exits {
                        set.insert(Dependency::new(exit.clone(), dep.condition.clone()));
                    }
                }
            }

            splice_boundary(&mut entries, &pnode.id, &sub.entries);
            splice_boundary(&mut exits, &pnode.id, &sub.exits);
        }

        Ok(Resolution {
            deps,
            nodes,
            entries,
            exits,
        })
    }
    .boxed()
}

fn insert_dependency(
    deps: &mut HashMap<String, DependencySet>,
    target: &str,
    dep: Dependency,
) -> Result<(), ConflictingPathConditionError> {
    let set = deps.entry(target.to_string()).or_default();
    if let Some(existing) = set.iter().next() {
        if existing.condition.kind() != dep.condition.kind() {
            return Err(ConflictingPathConditionError::new(
                target,
                existing.condition.as_str(),
                dep.condition.as_str(),
            ));
        }
    }
    set.insert(dep);
    Ok(())
}

/// Replaces one boundary id with the boundary ids of its inlined sub-graph.
fn splice_boundary(boundary: &mut Vec<String>, id: &str, replacements: &[String]) {
    if let Some(position) = boundary.iter().position(|b| b == id) {
        boundary.splice(position..=position, replacements.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, Graph, Node, NodeKind, PathCondition};
    use crate::testing::InMemoryPipelineStore;

    fn job(id: &str) -> Node {
        Node::new(id, NodeKind::Job {
            job_id: format!("job-{id}"),
        })
        .with_name(id)
    }

    fn pipeline(id: &str, pipeline_id: &str) -> Node {
        Node::new(id, NodeKind::Pipeline {
            pipeline_id: pipeline_id.to_string(),
        })
        .with_name(id)
    }

    fn success(source: &str, target: &str) -> Edge {
        Edge::new(source, target, PathCondition::success())
    }

    fn dep_ids(resolution: &Resolution, id: &str) -> Vec<String> {
        let mut ids: Vec<String> = resolution
            .dependencies(id)
            .map(|set| set.iter().map(|d| d.predecessor.clone()).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_flat_graph_direct_predecessors() {
        let graph = Graph::new(
            vec![job("a"), job("b"), job("c")],
            vec![success("a", "b"), success("b", "c")],
        );
        let store = InMemoryPipelineStore::new();

        let resolution = resolve(&graph, &store).await.unwrap();

        assert!(resolution.dependencies("a").is_none());
        assert_eq!(dep_ids(&resolution, "b"), vec!["a"]);
        assert_eq!(dep_ids(&resolution, "c"), vec!["b"]);
        assert_eq!(resolution.entries(), ["a"]);
        assert_eq!(resolution.exits(), ["c"]);
    }

    #[tokio::test]
    async fn test_edge_pass_merges_fan_in() {
        let graph = Graph::new(
            vec![job("a"), job("b"), job("c")],
            vec![success("a", "c"), success("b", "c")],
        );
        let store = InMemoryPipelineStore::new();

        let resolution = resolve(&graph, &store).await.unwrap();
        assert_eq!(dep_ids(&resolution, "c"), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_conflicting_condition_kinds_fail() {
        let graph = Graph::new(
            vec![job("a"), job("b"), job("merge")],
            vec![
                Edge::new("a", "merge", PathCondition::success()),
                Edge::new("b", "merge", PathCondition::failure()),
            ],
        );
        let store = InMemoryPipelineStore::new();

        let err = resolve(&graph, &store).await.unwrap_err();
        assert!(matches!(err, JobflowError::ConflictingPathCondition(_)));
    }

    #[tokio::test]
    async fn test_success_equivalent_labels_do_not_conflict() {
        let graph = Graph::new(
            vec![job("a"), job("b"), job("merge")],
            vec![
                Edge::new("a", "merge", PathCondition::new("true")),
                Edge::new("b", "merge", PathCondition::new("done")),
            ],
        );
        let store = InMemoryPipelineStore::new();

        let resolution = resolve(&graph, &store).await.unwrap();
        assert_eq!(dep_ids(&resolution, "merge"), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_single_inlining_rewires_boundary() {
        // before: j1 -> P(sub: x -> y) -> j2
        let top = Graph::new(
            vec![job("j1"), pipeline("P", "sub"), job("j2")],
            vec![success("j1", "P"), success("P", "j2")],
        );
        let sub = Graph::new(vec![job("x"), job("y")], vec![success("x", "y")]);
        let store = InMemoryPipelineStore::new().with_graph("sub", sub);

        let resolution = resolve(&top, &store).await.unwrap();

        assert!(resolution.node("P").is_none());
        assert_eq!(dep_ids(&resolution, "P-x"), vec!["j1"]);
        assert_eq!(dep_ids(&resolution, "P-y"), vec!["P-x"]);
        assert_eq!(dep_ids(&resolution, "j2"), vec!["P-y"]);
        assert_eq!(resolution.entries(), ["j1"]);
        assert_eq!(resolution.exits(), ["j2"]);
    }

    #[tokio::test]
    async fn test_double_inclusion_disjoint_namespaces() {
        let top = Graph::new(
            vec![pipeline("first", "sub"), pipeline("second", "sub")],
            vec![success("first", "second")],
        );
        let sub = Graph::new(vec![job("x")], vec![]);
        let store = InMemoryPipelineStore::new().with_graph("sub", sub);

        let resolution = resolve(&top, &store).await.unwrap();

        assert!(resolution.node("first-x").is_some());
        assert!(resolution.node("second-x").is_some());
        assert_eq!(dep_ids(&resolution, "second-x"), vec!["first-x"]);
    }

    #[tokio::test]
    async fn test_failure_condition_preserved_through_rewrite() {
        // j2 is failure-gated on the pipeline node; after inlining it must
        // be failure-gated on the sub-graph's exit node.
        let top = Graph::new(
            vec![pipeline("P", "sub"), job("j2")],
            vec![Edge::new("P", "j2", PathCondition::failure())],
        );
        let sub = Graph::new(vec![job("x")], vec![]);
        let store = InMemoryPipelineStore::new().with_graph("sub", sub);

        let resolution = resolve(&top, &store).await.unwrap();
        let deps = resolution.dependencies("j2").unwrap();
        let dep = deps.iter().next().unwrap();
        assert_eq!(dep.predecessor, "P-x");
        assert_eq!(dep.condition, PathCondition::failure());
    }

    #[tokio::test]
    async fn test_three_level_nesting_flattens() {
        // top: a -> P1; P1 -> mid: m -> P2; P2 -> leaf: z
        let top = Graph::new(
            vec![job("a"), pipeline("P1", "mid")],
            vec![success("a", "P1")],
        );
        let mid = Graph::new(
            vec![job("m"), pipeline("P2", "leaf")],
            vec![success("m", "P2")],
        );
        let leaf = Graph::new(vec![job("z")], vec![]);
        let store = InMemoryPipelineStore::new()
            .with_graph("mid", mid)
            .with_graph("leaf", leaf);

        let resolution = resolve(&top, &store).await.unwrap();

        // Hand-flattened expectation: a -> P1-m -> P1-P2-z
        assert_eq!(dep_ids(&resolution, "P1-m"), vec!["a"]);
        assert_eq!(dep_ids(&resolution, "P1-P2-z"), vec!["P1-m"]);
        assert_eq!(resolution.job_nodes().len(), 3);
        assert_eq!(resolution.exits(), ["P1-P2-z"]);
    }

    #[tokio::test]
    async fn test_unresolved_reference_fails() {
        let top = Graph::new(vec![pipeline("P", "missing")], vec![]);
        let store = InMemoryPipelineStore::new();

        let err = resolve(&top, &store).await.unwrap_err();
        assert!(matches!(err, JobflowError::UnresolvedPipelineReference(_)));
    }

    #[tokio::test]
    async fn test_self_reference_fails_with_cycle() {
        let inner = Graph::new(vec![pipeline("again", "loop")], vec![]);
        let top = Graph::new(vec![pipeline("P", "loop")], vec![]);
        let store = InMemoryPipelineStore::new().with_graph("loop", inner);

        let err = resolve(&top, &store).await.unwrap_err();
        match err {
            JobflowError::CyclicPipelineReference(cycle) => {
                assert_eq!(cycle.chain, vec!["loop", "loop"]);
            }
            other => panic!("expected cycle error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_other_nodes_are_ignored() {
        let note = Node::new("note", NodeKind::Other { operation: None });
        let graph = Graph::new(
            vec![job("a"), note, job("b")],
            vec![success("a", "b"), success("note", "a")],
        );
        let store = InMemoryPipelineStore::new();

        let resolution = resolve(&graph, &store).await.unwrap();
        assert!(resolution.dependencies("a").is_none());
        assert_eq!(dep_ids(&resolution, "b"), vec!["a"]);
        assert!(resolution.node("note").is_none());
    }
}
