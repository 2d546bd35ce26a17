//! # Jobflow
//!
//! Pipeline-graph resolution and execution orchestration.
//!
//! Jobflow takes an authored directed graph of stages (atomic compute jobs
//! or references to other pipelines) and executes it as one batch of
//! dependent tasks on an external execution backend:
//!
//! - **Graph model**: parse and serialize the authored graph, decoding node
//!   kinds once into a typed sum
//! - **Dependency resolution**: recursively inline nested pipelines into a
//!   single-level dependency map with collision-free namespaced ids
//! - **Task materialization**: one executable task per job node, with
//!   deterministic keys and success/failure run gates
//! - **Submission**: bounded fixed-delay retry plus one credential refresh
//!   per call
//! - **Status reconciliation**: concurrent, deadline-bounded mapping of
//!   backend state back into per-task and per-pipeline status
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobflow::prelude::*;
//!
//! let launcher = PipelineLauncher::new(pipelines, jobs, history, client);
//! let outcome = launcher.launch("project", "pipeline-id").await?;
//!
//! let reconciler = StatusReconciler::new(client, pipelines, history);
//! let snapshots = reconciler.check_all("project", &records).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod core;
pub mod errors;
pub mod events;
pub mod graph;
pub mod launch;
pub mod resolve;
pub mod status;
pub mod store;
pub mod submit;
pub mod task;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::core::{
        LifecycleState, PipelineRecord, ResultState, RunHandle, RunSnapshot, RunStatus,
    };
    pub use crate::errors::{BackendError, JobflowError, StoreError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::graph::{ConditionKind, Edge, Graph, Node, NodeKind, PathCondition};
    pub use crate::launch::{LaunchOutcome, LaunchSettings, PipelineLauncher};
    pub use crate::resolve::{resolve, Dependency, Resolution};
    pub use crate::status::{ReconcilerConfig, StatusReconciler};
    pub use crate::store::{HistoryStore, JobSpec, JobStore, PipelineStore, SecretStore};
    pub use crate::submit::{
        BackendConfig, Credential, CredentialCache, ExecutionBackend, RetryPolicy,
        RunSubmitRequest, SubmissionClient,
    };
    #[cfg(feature = "client")]
    pub use crate::submit::HttpBackend;
    pub use crate::task::{materialize_tasks, RunEnvironment, RunIf, Task};
    pub use crate::utils::{iso_timestamp, now_utc, Timestamp};
}
