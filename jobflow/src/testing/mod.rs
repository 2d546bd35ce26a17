//! Testing utilities: in-memory stores and a scriptable backend.
//!
//! These doubles back the crate's own tests and are exported for
//! downstream integration testing against the engine.

mod backend;
mod stores;

pub use backend::MockBackend;
pub use stores::{
    InMemoryJobStore, InMemoryPipelineStore, RecordingHistoryStore, StaticSecretStore,
};

/// Installs a fmt tracing subscriber honoring `RUST_LOG`, once.
///
/// Safe to call from every test; repeat installs are ignored.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
