//! Remote HTTP surface the agent talks to.
//!
//! Two endpoints: the clock-status check and the screenshot ingest. Both sit
//! behind [`RemoteApi`] so the poller and the capture loop can be exercised
//! against in-memory fakes.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AgentConfig;

/// Body of `GET <clock_status_url>`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClockStatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(rename = "isClockedIn", default)]
    pub is_clocked_in: bool,
}

/// Body of `POST <screenshot_upload_url>`. The screenshot travels as a
/// base64 data URI and the timestamp as stringified epoch milliseconds.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenshotPayload {
    pub screenshot: String,
    pub timestamp: String,
}

impl ScreenshotPayload {
    pub fn new(data_uri: String, captured_at_ms: i64) -> Self {
        Self {
            screenshot: data_uri,
            timestamp: captured_at_ms.to_string(),
        }
    }
}

/// Success body of the screenshot ingest. `path` is only used for logging.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    pub path: String,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    error: Option<String>,
}

#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Asks the HR backend whether the user is currently clocked in.
    async fn fetch_clock_status(&self, token: &str) -> Result<ClockStatusResponse>;

    /// Uploads one encoded capture.
    async fn upload_screenshot(
        &self,
        token: &str,
        payload: &ScreenshotPayload,
    ) -> Result<UploadResponse>;
}

/// reqwest-backed implementation used by the running agent.
pub struct HttpApi {
    client: reqwest::Client,
    clock_status_url: String,
    screenshot_upload_url: String,
}

impl HttpApi {
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            clock_status_url: config.clock_status_url.clone(),
            screenshot_upload_url: config.screenshot_upload_url.clone(),
        }
    }
}

#[async_trait]
impl RemoteApi for HttpApi {
    async fn fetch_clock_status(&self, token: &str) -> Result<ClockStatusResponse> {
        let response = self
            .client
            .get(&self.clock_status_url)
            .bearer_auth(token)
            .send()
            .await
            .context("clock status request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("clock status endpoint returned {status}");
        }

        response
            .json::<ClockStatusResponse>()
            .await
            .context("clock status body was not valid JSON")
    }

    async fn upload_screenshot(
        &self,
        token: &str,
        payload: &ScreenshotPayload,
    ) -> Result<UploadResponse> {
        let response = self
            .client
            .post(&self.screenshot_upload_url)
            .bearer_auth(token)
            .json(payload)
            .send()
            .await
            .context("screenshot upload request failed")?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<UploadResponse>()
                .await
                .context("screenshot upload response was not valid JSON");
        }

        let message = response
            .json::<UploadErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| format!("screenshot upload endpoint returned {status}"));
        bail!("{message}")
    }
}
