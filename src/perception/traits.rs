use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::perception::types::Frame;

/// Produces one frame per call. Implementations keep no state between calls.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&self) -> AgentResult<Frame>;
}
