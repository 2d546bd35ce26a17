//! Submission: retry policy, credential cache, backend seam, and the
//! client that drives them.

mod backend;
mod client;
mod credentials;
#[cfg(feature = "client")]
mod http;
mod policy;

pub use backend::{
    BackendConfig, ExecutionBackend, RunLogs, RunStatePayload, RunSubmitRequest, TaskRunState,
    TaskStatePayload,
};
pub use client::SubmissionClient;
pub use credentials::{Credential, CredentialCache};
#[cfg(feature = "client")]
pub use http::HttpBackend;
pub use policy::{retry_fixed, RetryPolicy};
