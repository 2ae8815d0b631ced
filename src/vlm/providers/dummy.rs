use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::perception::types::Frame;
use crate::vlm::provider::VisionModel;

pub const DUMMY_RESPONSE: &str = r#"{"type": "press_key", "key": "w", "duration": 1.0}"#;

/// Always answers with a forward key press. Exercises the loop without a model.
#[derive(Debug, Default)]
pub struct DummyProvider;

#[async_trait]
impl VisionModel for DummyProvider {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn predict(&self, _frame: &Frame, _instruction: &str) -> AgentResult<String> {
        Ok(DUMMY_RESPONSE.to_string())
    }
}
