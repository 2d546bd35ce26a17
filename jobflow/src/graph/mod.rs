//! Graph model: parse, represent, and serialize authored pipeline graphs.
//!
//! A graph is a value type: nodes (stages) and edges (control flow gated on
//! a success/failure path condition). It may be the top-level object of a
//! run request or a `Pipeline` node's inlined sub-graph.

mod codec;
mod model;

pub use model::{ConditionKind, Edge, Graph, Node, NodeKind, PathCondition};
