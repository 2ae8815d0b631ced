use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::errors::{AgentError, AgentResult};
use crate::perception::types::Frame;
use crate::vlm::encode::encode_jpeg;
use crate::vlm::provider::VisionModel;
use crate::vlm::types::{HealthResponse, PredictResponse};

/// Returned instead of an error whenever the server cannot be reached or answers badly.
pub const FALLBACK_RESPONSE: &str = "wait";

/// Client for the `/predict` + `/health` inference server.
pub struct RemoteProvider {
    base_url: String,
    max_width: u32,
    client: reqwest::Client,
}

impl RemoteProvider {
    pub fn new(base_url: &str, timeout: Duration, max_width: u32) -> AgentResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(base_url, max_width, client))
    }

    pub fn with_client(base_url: &str, max_width: u32, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            max_width,
            client,
        }
    }

    async fn post_predict(&self, jpeg: Vec<u8>, instruction: &str) -> AgentResult<String> {
        let image = Part::bytes(jpeg)
            .file_name("screenshot.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new()
            .part("image", image)
            .text("instruction", instruction.to_string());

        let response = self
            .client
            .post(format!("{}/predict", self.base_url))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(AgentError::Model(format!("{status}: {err_body}")));
        }

        let body: PredictResponse = response.json().await?;
        Ok(body.action)
    }
}

#[async_trait]
impl VisionModel for RemoteProvider {
    fn name(&self) -> &str {
        "remote"
    }

    async fn predict(&self, frame: &Frame, instruction: &str) -> AgentResult<String> {
        let jpeg = encode_jpeg(frame, self.max_width)?;
        tracing::debug!(url = %self.base_url, bytes = jpeg.len(), "sending frame to remote VLM");

        match self.post_predict(jpeg, instruction).await {
            Ok(text) => {
                tracing::debug!(len = text.len(), "remote VLM responded");
                Ok(text)
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.base_url, "remote VLM failed; answering with fallback");
                Ok(FALLBACK_RESPONSE.to_string())
            }
        }
    }

    async fn health(&self) -> AgentResult<String> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await?
            .error_for_status()?;
        let body: HealthResponse = response.json().await?;
        Ok(body.status)
    }
}
