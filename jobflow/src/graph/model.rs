//! Node, edge, and graph value types.

use serde_json::Map;
use std::fmt;

/// The success/failure kind a path condition classifies as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    /// Downstream runs when the predecessors succeeded.
    Success,
    /// Downstream runs when the predecessors failed.
    Failure,
}

/// The raw success-path label carried on an edge.
///
/// The literal `"false"` classifies as a failure gate; `"true"` and any
/// other label classify as success-equivalent. The raw label is preserved
/// through dependency rewriting and serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathCondition {
    label: String,
}

impl PathCondition {
    /// Wraps a raw condition label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// The conventional success condition (`"true"`).
    #[must_use]
    pub fn success() -> Self {
        Self::new("true")
    }

    /// The conventional failure condition (`"false"`).
    #[must_use]
    pub fn failure() -> Self {
        Self::new("false")
    }

    /// Returns the raw label.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.label
    }

    /// Classifies the label into a condition kind.
    #[must_use]
    pub fn kind(&self) -> ConditionKind {
        if self.label == "false" {
            ConditionKind::Failure
        } else {
            ConditionKind::Success
        }
    }
}

impl Default for PathCondition {
    fn default() -> Self {
        Self::success()
    }
}

impl fmt::Display for PathCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// What a node stands for, decoded once at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// An atomic compute job, referencing a stored job definition.
    Job {
        /// The referenced job id.
        job_id: String,
    },
    /// A reference to another, already-defined pipeline graph.
    Pipeline {
        /// The referenced pipeline id.
        pipeline_id: String,
    },
    /// Any other vertex; ignored by resolution and materialization.
    Other {
        /// The raw operation label, if one was present.
        operation: Option<String>,
    },
}

impl NodeKind {
    /// Returns true for kinds the engine executes (job or pipeline).
    #[must_use]
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Job { .. } | Self::Pipeline { .. })
    }

    /// Returns true for `Job` nodes.
    #[must_use]
    pub fn is_job(&self) -> bool {
        matches!(self, Self::Job { .. })
    }

    /// Returns true for `Pipeline` nodes.
    #[must_use]
    pub fn is_pipeline(&self) -> bool {
        matches!(self, Self::Pipeline { .. })
    }
}

/// A control-flow edge between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    pub(crate) condition: Option<PathCondition>,
    pub(crate) extra: Map<String, serde_json::Value>,
    pub(crate) value_extra: Map<String, serde_json::Value>,
}

impl Edge {
    /// Creates an edge with an explicit path condition.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        condition: PathCondition,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            condition: Some(condition),
            extra: Map::new(),
            value_extra: Map::new(),
        }
    }

    /// The edge's path condition; defaults to success when unspecified.
    #[must_use]
    pub fn condition(&self) -> PathCondition {
        self.condition.clone().unwrap_or_default()
    }

    fn namespaced(&self, prefix: &str) -> Self {
        let mut edge = self.clone();
        edge.source = namespaced_id(prefix, &self.source);
        edge.target = namespaced_id(prefix, &self.target);
        edge
    }
}

/// One stage of a pipeline graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The node id, unique within its graph.
    pub id: String,
    /// What the node stands for.
    pub kind: NodeKind,
    /// Outgoing edges, grouped from the graph's edge records at parse time.
    pub outgoing: Vec<Edge>,
    pub(crate) name: Option<String>,
    pub(crate) extra: Map<String, serde_json::Value>,
    pub(crate) value_extra: Map<String, serde_json::Value>,
}

impl Node {
    /// Creates a node with no outgoing edges.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            outgoing: Vec::new(),
            name: None,
            extra: Map::new(),
            value_extra: Map::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The node's display name; falls back to the id.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    fn namespaced(&self, prefix: &str) -> Self {
        let mut node = self.clone();
        node.id = namespaced_id(prefix, &self.id);
        node.outgoing = self.outgoing.iter().map(|e| e.namespaced(prefix)).collect();
        node
    }
}

/// A pipeline graph: nodes plus edges, in parse order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) edges: Vec<Edge>,
}

impl Graph {
    /// Builds a graph from nodes and edges, attaching each edge to its
    /// source node's outgoing list.
    #[must_use]
    pub fn new(mut nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        for node in &mut nodes {
            node.outgoing = edges
                .iter()
                .filter(|e| e.source == node.id)
                .cloned()
                .collect();
        }
        Self { nodes, edges }
    }

    /// The graph's nodes, in parse order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// The graph's edges, in parse order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns a copy with every node id and edge endpoint rewritten to
    /// `prefix-localId`.
    ///
    /// Applied before inlining so that re-inclusion of the same sub-graph
    /// at two positions cannot collide on ids.
    #[must_use]
    pub fn namespaced(&self, prefix: &str) -> Self {
        Self {
            nodes: self.nodes.iter().map(|n| n.namespaced(prefix)).collect(),
            edges: self.edges.iter().map(|e| e.namespaced(prefix)).collect(),
        }
    }
}

/// Joins an instantiation prefix and a local id.
#[must_use]
pub(crate) fn namespaced_id(prefix: &str, local: &str) -> String {
    format!("{prefix}-{local}")
}
