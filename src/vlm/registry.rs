use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendConfig, BackendKind};
use crate::errors::{AgentError, AgentResult};
use crate::vlm::provider::VisionModel;
use crate::vlm::providers::dummy::DummyProvider;
use crate::vlm::providers::openai_compatible::OpenAiCompatibleProvider;
use crate::vlm::providers::remote::RemoteProvider;

/// Builds the backend selected by `config.kind`.
pub fn build_backend(config: &BackendConfig) -> AgentResult<Arc<dyn VisionModel>> {
    let kind = config
        .kind
        .ok_or_else(|| AgentError::Config("no model backend selected".into()))?;

    let backend: Arc<dyn VisionModel> = match kind {
        BackendKind::Dummy => Arc::new(DummyProvider),
        BackendKind::Openai => Arc::new(OpenAiCompatibleProvider::new(config.openai.clone())?),
        BackendKind::Remote => {
            let url = config
                .remote
                .url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| AgentError::Config("remote backend needs a server URL".into()))?;
            Arc::new(RemoteProvider::new(
                url.trim(),
                Duration::from_secs(config.remote.timeout_secs),
                config.remote.max_width,
            )?)
        }
    };

    tracing::info!(backend = backend.name(), "model backend ready");
    Ok(backend)
}
