//! Reqwest implementation of the execution backend.

use super::{
    BackendConfig, Credential, ExecutionBackend, RunLogs, RunStatePayload, RunSubmitRequest,
};
use crate::core::RunHandle;
use crate::errors::BackendError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    run_id: u64,
}

/// HTTP client for the execution backend.
#[derive(Debug)]
pub struct HttpBackend {
    http: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Builds a backend client from config.
    ///
    /// # Errors
    ///
    /// Fails when the underlying HTTP client cannot be constructed.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(self.config.classify(status, message));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ExecutionBackend for HttpBackend {
    async fn submit_run(
        &self,
        credential: &Credential,
        request: &RunSubmitRequest,
    ) -> Result<RunHandle, BackendError> {
        let response = self
            .http
            .post(self.url("runs/submit"))
            .bearer_auth(credential.token())
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let submitted: SubmitResponse = self.decode(response).await?;
        Ok(RunHandle::new(submitted.run_id))
    }

    async fn cancel_run(
        &self,
        credential: &Credential,
        run: &RunHandle,
    ) -> Result<(), BackendError> {
        let response = self
            .http
            .post(self.url("runs/cancel"))
            .bearer_auth(credential.token())
            .json(&serde_json::json!({ "run_id": run.run_id }))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(self.config.classify(status, message));
        }
        Ok(())
    }

    async fn run_state(
        &self,
        credential: &Credential,
        run: &RunHandle,
    ) -> Result<RunStatePayload, BackendError> {
        let response = self
            .http
            .get(self.url("runs/get"))
            .bearer_auth(credential.token())
            .query(&[("run_id", run.run_id)])
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        self.decode(response).await
    }

    async fn run_logs(
        &self,
        credential: &Credential,
        run: &RunHandle,
    ) -> Result<RunLogs, BackendError> {
        let response = self
            .http
            .get(self.url("runs/export"))
            .bearer_auth(credential.token())
            .query(&[("run_id", run.run_id)])
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        self.decode(response).await
    }
}
