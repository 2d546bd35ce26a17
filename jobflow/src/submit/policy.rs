//! Fixed-delay retry policy and combinator.

use crate::errors::BackendError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Retry policy for backend submission.
///
/// The attempt budget is derived from a total window and a fixed delay:
/// `attempts = floor(within / interval) + 1`. Backoff is constant at the
/// interval; there is no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total retry budget, in seconds.
    pub within_secs: u64,
    /// Fixed delay between attempts, in seconds.
    pub interval_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            within_secs: 20,
            interval_secs: 10,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy from a total window and a fixed interval.
    #[must_use]
    pub fn new(within_secs: u64, interval_secs: u64) -> Self {
        Self {
            within_secs,
            interval_secs,
        }
    }

    /// Sets the total retry window.
    #[must_use]
    pub fn with_within_secs(mut self, within_secs: u64) -> Self {
        self.within_secs = within_secs;
        self
    }

    /// Sets the fixed delay between attempts.
    #[must_use]
    pub fn with_interval_secs(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    /// Total attempts the policy allows, including the initial one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        if self.interval_secs == 0 {
            1
        } else {
            u32::try_from(self.within_secs / self.interval_secs)
                .unwrap_or(u32::MAX)
                .saturating_add(1)
        }
    }

    /// The fixed delay between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Runs a backend call under the policy's fixed-delay retry loop.
///
/// Only retryable errors are caught; once the attempt budget is exhausted
/// the last retryable error propagates. Non-retryable errors escalate
/// immediately.
///
/// # Errors
///
/// Returns the call's error after the budget is exhausted, or immediately
/// for non-retryable errors.
pub async fn retry_fixed<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let attempts = policy.attempts();
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < attempts => {
                tracing::debug!(
                    operation,
                    attempt,
                    delay_secs = policy.interval_secs,
                    error = %err,
                    "retrying backend call"
                );
                tokio::time::sleep(policy.delay()).await;
            }
            Err(err) => return Err(err),
        }
    }
}
