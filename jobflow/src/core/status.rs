//! Domain status, backend state vocabulary, and status aggregation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The user-facing lifecycle label of a pipeline or task.
///
/// Distinct from the backend's own lifecycle/result vocabulary, which is
/// mapped through [`RunStatus::from_backend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Never submitted, or no statuses known yet.
    Draft,
    /// Submitted, waiting for the backend to start it.
    Pending,
    /// The backend is executing it.
    Running,
    /// Finished with a successful result.
    Succeeded,
    /// Finished with any non-success result.
    Failed,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl RunStatus {
    /// Returns true for statuses that will never change again.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true for statuses worth polling the backend about.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Running)
    }

    /// Maps backend lifecycle/result states into a domain status.
    ///
    /// Priority order: a pending/blocked lifecycle wins, then a running
    /// lifecycle; any other lifecycle is judged by the result state, where
    /// only an explicit success counts.
    #[must_use]
    pub fn from_backend(
        lifecycle: Option<LifecycleState>,
        result: Option<ResultState>,
    ) -> Self {
        match lifecycle {
            Some(LifecycleState::Pending | LifecycleState::Blocked) => Self::Pending,
            Some(LifecycleState::Running) => Self::Running,
            _ => {
                if result == Some(ResultState::Success) {
                    Self::Succeeded
                } else {
                    Self::Failed
                }
            }
        }
    }

    /// Aggregates many task statuses into one pipeline status.
    ///
    /// Priority order: `Running` > `Pending` > `Failed` > `Succeeded`
    /// (iff every task succeeded) > `Draft` (no statuses known).
    #[must_use]
    pub fn aggregate<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        let mut seen_any = false;
        let mut has_running = false;
        let mut has_pending = false;
        let mut has_failed = false;
        let mut all_succeeded = true;

        for status in statuses {
            seen_any = true;
            match status {
                Self::Running => has_running = true,
                Self::Pending => has_pending = true,
                Self::Failed => has_failed = true,
                Self::Succeeded | Self::Draft => {}
            }
            if status != Self::Succeeded {
                all_succeeded = false;
            }
        }

        if has_running {
            Self::Running
        } else if has_pending {
            Self::Pending
        } else if has_failed {
            Self::Failed
        } else if seen_any && all_succeeded {
            Self::Succeeded
        } else {
            Self::Draft
        }
    }
}

/// Backend lifecycle states, as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Queued, not yet started.
    Pending,
    /// Waiting on upstream tasks.
    Blocked,
    /// Executing.
    Running,
    /// Shutting down.
    Terminating,
    /// Finished; the result state carries the outcome.
    Terminated,
    /// Skipped by the backend.
    Skipped,
    /// The backend failed internally.
    InternalError,
    /// Any lifecycle label this crate does not know.
    #[serde(other)]
    Unknown,
}

/// Backend result states, as reported on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultState {
    /// The run succeeded.
    Success,
    /// The run failed.
    Failed,
    /// The run hit its time limit.
    TimedOut,
    /// The run was cancelled.
    Canceled,
    /// Any result label this crate does not know.
    #[serde(other)]
    Unknown,
}
