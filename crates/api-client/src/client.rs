use std::time::Duration;

use xharvest_api::*;

use crate::error::ApiError;

/// Typed HTTP client for the xharvest backend API.
///
/// One method per endpoint; every method returns the deserialized body on
/// 2xx and an [`ApiError`] otherwise. The client never retries — retry
/// policy, where it exists at all, belongs to the transport layer behind
/// the backend, not to the controller.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new client with the given base URL and per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create from an existing `reqwest::Client` (e.g. shared in tests).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Ask whether the handle already has downloaded files on disk.
    pub async fn check_existing_files(
        &self,
        handle: &str,
    ) -> Result<ExistingFilesResponse, ApiError> {
        let resp = self
            .client
            .get(self.url(&format!("/lifecycle/check/{handle}")))
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Apply the chosen existing-file treatment before a fresh start.
    pub async fn prepare_start(
        &self,
        req: &PrepareStartRequest,
    ) -> Result<PrepareStartResponse, ApiError> {
        let resp = self
            .client
            .post(self.url("/lifecycle/prepare-start"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Clean up downloaded files after a cancel, per the chosen mode.
    pub async fn prepare_cancel(
        &self,
        req: &PrepareCancelRequest,
    ) -> Result<PrepareCancelResponse, ApiError> {
        let resp = self
            .client
            .post(self.url("/lifecycle/prepare-cancel"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    // ── Scheduler ─────────────────────────────────────────────────────────

    /// Enqueue a fresh run. 409 when the handle already has an active task.
    pub async fn start_run(&self, req: &RunRequest) -> Result<HandleState, ApiError> {
        let resp = self
            .client
            .post(self.url("/scheduler/start"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Enqueue a continuation run. Same conflict semantics as `start_run`.
    pub async fn continue_run(&self, req: &RunRequest) -> Result<HandleState, ApiError> {
        let resp = self
            .client
            .post(self.url("/scheduler/continue"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    pub async fn cancel_run(&self, req: &CancelRequest) -> Result<HandleState, ApiError> {
        let resp = self
            .client
            .post(self.url("/scheduler/cancel"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }

    /// Fetch the full scheduler snapshot. Polled by the reconciliation loop.
    pub async fn scheduler_state(&self) -> Result<SchedulerSnapshot, ApiError> {
        let resp = self.client.get(self.url("/scheduler/state")).send().await?;
        parse_response(resp).await
    }

    // ── Settings / os ─────────────────────────────────────────────────────

    pub async fn settings(&self) -> Result<SettingsResponse, ApiError> {
        let resp = self.client.get(self.url("/settings")).send().await?;
        parse_response(resp).await
    }

    pub async fn open_folder(
        &self,
        req: &OpenFolderRequest,
    ) -> Result<OpenFolderResponse, ApiError> {
        let resp = self
            .client
            .post(self.url("/os/open-folder"))
            .json(req)
            .send()
            .await?;
        parse_response(resp).await
    }
}

/// Parse an HTTP response: deserialize the body on 2xx, otherwise build a
/// status error with best-effort detail extraction.
async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ApiError> {
    if !resp.status().is_success() {
        let err = ApiError::from_response(resp).await;
        tracing::debug!("API call failed: {err}");
        return Err(err);
    }
    Ok(resp.json().await?)
}
