//! Pipeline launching: the full resolve → materialize → submit flow.

#[cfg(test)]
mod integration_tests;
mod launcher;

pub use launcher::{LaunchOutcome, LaunchSettings, PipelineLauncher};
