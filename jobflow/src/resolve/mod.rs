//! Dependency resolution: flattening a graph-of-graphs into one
//! single-level dependency map of concrete executable nodes.

mod resolver;

pub use resolver::{resolve, Dependency, DependencySet, Resolution};
