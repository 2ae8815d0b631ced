use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PRESS_DURATION: Duration = Duration::from_millis(100);
pub const DEFAULT_WAIT_DURATION: Duration = Duration::from_secs(1);

/// A device action decoded from a model response.
///
/// Every field is already defaulted and validated, so a descriptor can be
/// handed to the dispatcher as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDescriptor {
    PressKey {
        key: String,
        #[serde(serialize_with = "serialize_secs")]
        duration: Duration,
    },
    /// Relative pointer offset in pixels.
    MoveMouse { dx: i32, dy: i32 },
    Click { button: MouseButton },
    Wait {
        #[serde(serialize_with = "serialize_secs")]
        duration: Duration,
    },
    Say { message: String },
    /// No recognised action; keeps the response text for the log.
    Unknown { raw: String },
}

impl ActionDescriptor {
    /// The action used whenever a response cannot be turned into anything else.
    pub fn safe_default() -> Self {
        ActionDescriptor::Wait {
            duration: DEFAULT_WAIT_DURATION,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ActionDescriptor::PressKey { .. } => "press_key",
            ActionDescriptor::MoveMouse { .. } => "move_mouse",
            ActionDescriptor::Click { .. } => "click",
            ActionDescriptor::Wait { .. } => "wait",
            ActionDescriptor::Say { .. } => "say",
            ActionDescriptor::Unknown { .. } => "unknown",
        }
    }
}

/// Durations go out as fractional seconds, the unit models write them in.
fn serialize_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// What the parser returns when neither decode phase finds an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFallback {
    /// One-second wait.
    #[default]
    Wait,
    /// `ActionDescriptor::Unknown`: logged, no device effect.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Ask for one structured action per frame and execute it.
    Action,
    /// Ask for a scene description; only `say` records reach the actuator.
    Describe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// Ctrl+C or an explicit stop request.
    Cancelled,
    /// `max_iterations` or `max_duration_minutes` reached.
    LimitReached,
    /// An error escaped the iteration body.
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    Running,
    Stopped(StopReason),
}

/// Owned by the control loop and mutated only by it.
#[derive(Debug, Clone)]
pub struct LoopState {
    pub status: LoopStatus,
    /// Completed iterations. The loop limits are checked against this count.
    pub iterations: u64,
}

impl LoopState {
    pub fn new() -> Self {
        Self {
            status: LoopStatus::Running,
            iterations: 0,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == LoopStatus::Running
    }

    /// `Stopped` is terminal; later calls keep the first reason.
    pub fn stop(&mut self, reason: StopReason) {
        if self.is_running() {
            self.status = LoopStatus::Stopped(reason);
        }
    }
}

impl Default for LoopState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoopConfig {
    pub max_iterations: Option<u64>,
    pub max_duration_minutes: Option<u32>,
}
