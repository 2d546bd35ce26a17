//! Scriptable execution backend for tests.

use crate::core::RunHandle;
use crate::errors::BackendError;
use crate::submit::{Credential, ExecutionBackend, RunLogs, RunStatePayload, RunSubmitRequest};
use async_trait::async_trait;
use base64::Engine;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A backend double with queued submit results, per-run scripted states,
/// and optional per-run polling delays.
///
/// Submit results are consumed front-to-back; once the queue is empty,
/// submissions succeed with generated run ids. Polling an unscripted run
/// fails with a fatal error.
#[derive(Debug, Default)]
pub struct MockBackend {
    submit_results: Mutex<VecDeque<Result<RunHandle, BackendError>>>,
    submit_calls: AtomicUsize,
    state_calls: AtomicUsize,
    last_request: Mutex<Option<RunSubmitRequest>>,
    cancels: Mutex<Vec<RunHandle>>,
    states: DashMap<u64, RunStatePayload>,
    state_delays: DashMap<u64, Duration>,
    logs: DashMap<u64, RunLogs>,
}

impl MockBackend {
    /// Creates an unscripted backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next submit outcome.
    pub fn push_submit_result(&self, result: Result<RunHandle, BackendError>) {
        self.submit_results.lock().push_back(result);
    }

    /// Scripts the state returned when polling a run.
    pub fn set_run_state(&self, run_id: u64, payload: RunStatePayload) {
        self.states.insert(run_id, payload);
    }

    /// Delays state polls of a run, for deadline tests.
    pub fn set_state_delay(&self, run_id: u64, delay: Duration) {
        self.state_delays.insert(run_id, delay);
    }

    /// Scripts a run's exported logs from plain text.
    pub fn set_run_logs(&self, run_id: u64, content: &str) {
        self.logs.insert(
            run_id,
            RunLogs {
                content: Some(base64::engine::general_purpose::STANDARD.encode(content)),
            },
        );
    }

    /// How many submissions were attempted.
    #[must_use]
    pub fn submit_call_count(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// How many state polls were made.
    #[must_use]
    pub fn state_call_count(&self) -> usize {
        self.state_calls.load(Ordering::SeqCst)
    }

    /// The last submitted request.
    #[must_use]
    pub fn last_request(&self) -> Option<RunSubmitRequest> {
        self.last_request.lock().clone()
    }

    /// The runs that were cancelled.
    #[must_use]
    pub fn cancelled(&self) -> Vec<RunHandle> {
        self.cancels.lock().clone()
    }
}

#[async_trait]
impl ExecutionBackend for MockBackend {
    async fn submit_run(
        &self,
        _credential: &Credential,
        request: &RunSubmitRequest,
    ) -> Result<RunHandle, BackendError> {
        let count = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_request.lock() = Some(request.clone());
        match self.submit_results.lock().pop_front() {
            Some(result) => result,
            None => Ok(RunHandle::new(1000 + count as u64)),
        }
    }

    async fn cancel_run(
        &self,
        _credential: &Credential,
        run: &RunHandle,
    ) -> Result<(), BackendError> {
        self.cancels.lock().push(*run);
        Ok(())
    }

    async fn run_state(
        &self,
        _credential: &Credential,
        run: &RunHandle,
    ) -> Result<RunStatePayload, BackendError> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.state_delays.get(&run.run_id).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.states
            .get(&run.run_id)
            .map(|p| p.clone())
            .ok_or_else(|| BackendError::Fatal {
                status: 404,
                message: format!("no scripted state for run {}", run.run_id),
            })
    }

    async fn run_logs(
        &self,
        _credential: &Credential,
        run: &RunHandle,
    ) -> Result<RunLogs, BackendError> {
        self.logs
            .get(&run.run_id)
            .map(|l| l.clone())
            .ok_or_else(|| BackendError::Fatal {
                status: 404,
                message: format!("no scripted logs for run {}", run.run_id),
            })
    }
}
