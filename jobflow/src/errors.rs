//! Error types for the jobflow engine.
//!
//! Structural errors (parse, path-condition conflicts, unresolved or cyclic
//! pipeline references) are local to one request and surfaced synchronously.
//! Backend errors are retried per policy and only escalate once the budget
//! is exhausted.

use thiserror::Error;

/// The main error type for jobflow operations.
#[derive(Debug, Error)]
pub enum JobflowError {
    /// The graph JSON did not have the expected shape.
    #[error("{0}")]
    Malformed(#[from] MalformedGraphError),

    /// A node received dependency edges with conflicting condition kinds.
    #[error("{0}")]
    ConflictingPathCondition(#[from] ConflictingPathConditionError),

    /// A `Pipeline` node referenced a graph the store could not supply.
    #[error("{0}")]
    UnresolvedPipelineReference(#[from] UnresolvedPipelineReferenceError),

    /// A pipeline directly or transitively references itself.
    #[error("{0}")]
    CyclicPipelineReference(#[from] CyclicPipelineReferenceError),

    /// A dependency entry pointed at a node absent from the resolved graph.
    #[error("{0}")]
    UnknownPredecessor(#[from] UnknownPredecessorError),

    /// An execution-backend call failed.
    #[error("{0}")]
    Backend(#[from] BackendError),

    /// A collaborator store call failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error raised when the graph JSON lacks the expected array-of-records shape.
#[derive(Debug, Clone, Error)]
#[error("malformed graph: {reason}")]
pub struct MalformedGraphError {
    /// Why the input was rejected.
    pub reason: String,
}

impl MalformedGraphError {
    /// Creates a new malformed-graph error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Error raised when a node's incoming dependency edges disagree on the
/// success/failure kind of their path condition.
#[derive(Debug, Clone, Error)]
#[error("conflicting path conditions on node '{node}': '{existing}' vs '{incoming}'")]
pub struct ConflictingPathConditionError {
    /// The node whose dependency set conflicted.
    pub node: String,
    /// The condition label already recorded.
    pub existing: String,
    /// The condition label that conflicted with it.
    pub incoming: String,
}

impl ConflictingPathConditionError {
    /// Creates a new conflicting-path-condition error.
    #[must_use]
    pub fn new(
        node: impl Into<String>,
        existing: impl Into<String>,
        incoming: impl Into<String>,
    ) -> Self {
        Self {
            node: node.into(),
            existing: existing.into(),
            incoming: incoming.into(),
        }
    }
}

/// Error raised when a referenced sub-graph cannot be fetched.
#[derive(Debug, Clone, Error)]
#[error("node '{node}' references unknown pipeline '{pipeline_id}'")]
pub struct UnresolvedPipelineReferenceError {
    /// The `Pipeline` node holding the reference.
    pub node: String,
    /// The pipeline id that could not be resolved.
    pub pipeline_id: String,
}

impl UnresolvedPipelineReferenceError {
    /// Creates a new unresolved-reference error.
    #[must_use]
    pub fn new(node: impl Into<String>, pipeline_id: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            pipeline_id: pipeline_id.into(),
        }
    }
}

/// Error raised when pipeline inlining would recurse forever.
#[derive(Debug, Clone, Error)]
#[error("cyclic pipeline reference: {}", chain.join(" -> "))]
pub struct CyclicPipelineReferenceError {
    /// The chain of pipeline ids forming the cycle.
    pub chain: Vec<String>,
}

impl CyclicPipelineReferenceError {
    /// Creates a new cyclic-reference error.
    #[must_use]
    pub fn new(chain: Vec<String>) -> Self {
        Self { chain }
    }
}

/// Error raised when a dependency predecessor has no task counterpart.
#[derive(Debug, Clone, Error)]
#[error("node '{node}' depends on '{predecessor}', which is not an executable node")]
pub struct UnknownPredecessorError {
    /// The node carrying the dependency.
    pub node: String,
    /// The missing predecessor id.
    pub predecessor: String,
}

impl UnknownPredecessorError {
    /// Creates a new unknown-predecessor error.
    #[must_use]
    pub fn new(node: impl Into<String>, predecessor: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            predecessor: predecessor.into(),
        }
    }
}

/// Errors returned by the execution backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend answered with a status from the configured retryable set.
    #[error("retryable backend error (status {status}): {message}")]
    Retryable {
        /// The HTTP status code.
        status: u16,
        /// The backend's error message.
        message: String,
    },

    /// The bearer credential was rejected as expired.
    #[error("backend rejected credential (status {status})")]
    AuthExpired {
        /// The HTTP status code.
        status: u16,
    },

    /// A non-retryable backend failure.
    #[error("backend error (status {status}): {message}")]
    Fatal {
        /// The HTTP status code.
        status: u16,
        /// The backend's error message.
        message: String,
    },

    /// The call never produced a response.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded.
    #[error("backend response decode error: {0}")]
    Decode(String),
}

impl BackendError {
    /// Returns true if the retry loop may catch this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// Returns true if a credential refresh should be attempted.
    #[must_use]
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}

/// Error raised by a collaborator store.
#[derive(Debug, Clone, Error)]
#[error("store error during {operation}: {detail}")]
pub struct StoreError {
    /// The store operation that failed.
    pub operation: String,
    /// What went wrong.
    pub detail: String,
}

impl StoreError {
    /// Creates a new store error.
    #[must_use]
    pub fn new(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    /// Creates a not-found store error.
    #[must_use]
    pub fn not_found(operation: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            detail: format!("'{}' not found", id.into()),
        }
    }
}
