use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::perception::types::Frame;

/// A vision-language model backend: one frame and one instruction in, raw text out.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Backend identifier used in logs.
    fn name(&self) -> &str;

    async fn predict(&self, frame: &Frame, instruction: &str) -> AgentResult<String>;

    /// Readiness as reported by the backend.
    async fn health(&self) -> AgentResult<String> {
        Ok("ready".to_string())
    }
}
