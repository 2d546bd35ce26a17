//! Task materialization: turning resolved `Job` nodes into the concrete
//! executable task descriptors submitted to the backend.

mod materializer;

pub use materializer::{
    materialize_tasks, sanitize_name, task_key, RunEnvironment, RunIf, Task, TaskDependency,
};
