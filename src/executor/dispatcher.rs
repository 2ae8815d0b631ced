// Maps a parsed action onto exactly one actuator call.
use std::sync::Arc;

use crate::agent_engine::state::ActionDescriptor;
use crate::errors::AgentResult;
use crate::executor::input::Actuator;

pub struct Dispatcher {
    actuator: Arc<dyn Actuator>,
}

impl Dispatcher {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self { actuator }
    }

    /// Performs `action`. Actuator errors are returned untouched; the caller
    /// decides whether they end the run.
    pub async fn execute(&self, action: &ActionDescriptor) -> AgentResult<()> {
        match action {
            ActionDescriptor::PressKey { key, duration } => {
                tracing::info!(key = %key, hold_ms = duration.as_millis() as u64, "press key");
                self.actuator.press_key(key, *duration).await
            }
            ActionDescriptor::MoveMouse { dx, dy } => {
                tracing::info!(dx, dy, "move mouse");
                self.actuator.move_mouse(*dx, *dy).await
            }
            ActionDescriptor::Click { button } => {
                tracing::info!(?button, "click");
                self.actuator.click(*button).await
            }
            ActionDescriptor::Wait { duration } => {
                tracing::info!(ms = duration.as_millis() as u64, "waiting");
                tokio::time::sleep(*duration).await;
                Ok(())
            }
            ActionDescriptor::Say { message } if message.trim().is_empty() => {
                tracing::debug!("empty say action skipped");
                Ok(())
            }
            ActionDescriptor::Say { message } => {
                tracing::info!(message = %message, "say");
                self.actuator.speak(message).await
            }
            ActionDescriptor::Unknown { raw } => {
                tracing::warn!(response = %raw, "unknown action, nothing executed");
                Ok(())
            }
        }
    }
}
