use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent_engine::state::MouseButton;
use crate::errors::{AgentError, AgentResult};
use crate::executor::input::Actuator;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PressKey(String, Duration),
    MoveMouse(i32, i32),
    Click(MouseButton),
    Speak(String),
}

/// Records every call; optionally fails on key presses.
#[derive(Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<Call>>,
    fail_keys: bool,
}

impl RecordingActuator {
    pub fn failing_keys() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_keys: true,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn press_key(&self, key: &str, hold: Duration) -> AgentResult<()> {
        self.record(Call::PressKey(key.to_string(), hold));
        if self.fail_keys {
            return Err(AgentError::Actuator(format!("unknown key name '{key}'")));
        }
        tokio::time::sleep(hold).await;
        Ok(())
    }

    async fn move_mouse(&self, dx: i32, dy: i32) -> AgentResult<()> {
        self.record(Call::MoveMouse(dx, dy));
        Ok(())
    }

    async fn click(&self, button: MouseButton) -> AgentResult<()> {
        self.record(Call::Click(button));
        Ok(())
    }

    async fn speak(&self, message: &str) -> AgentResult<()> {
        self.record(Call::Speak(message.to_string()));
        Ok(())
    }
}
