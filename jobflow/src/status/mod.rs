//! Status reconciliation: polling backend run state and feeding it back
//! into persisted pipeline status.

mod reconciler;

pub use reconciler::{ReconcilerConfig, StatusReconciler};
