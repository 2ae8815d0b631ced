// Physical input simulation through enigo.
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::agent_engine::state::MouseButton;
use crate::errors::{AgentError, AgentResult};
use crate::executor::keys::resolve_key;
use crate::executor::speech::SpeechCommand;

/// Primitive device operations. Implementations reject what they cannot perform
/// (e.g. unknown key names) by returning an error.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Key down, hold for `hold`, key up.
    async fn press_key(&self, key: &str, hold: Duration) -> AgentResult<()>;

    /// Moves the pointer by a relative offset in pixels.
    async fn move_mouse(&self, dx: i32, dy: i32) -> AgentResult<()>;

    async fn click(&self, button: MouseButton) -> AgentResult<()>;

    async fn speak(&self, message: &str) -> AgentResult<()>;
}

pub struct EnigoActuator {
    speech: SpeechCommand,
    /// Key currently between its down and up events.
    held: Mutex<Option<Key>>,
}

impl EnigoActuator {
    pub fn new(speech: SpeechCommand) -> Self {
        Self {
            speech,
            held: Mutex::new(None),
        }
    }

    /// Sends key-up for whatever key a pending `press_key` is holding.
    /// Best effort: failures are logged and swallowed.
    pub fn release_held_keys(&self) {
        let held = match self.held.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(key) = held else {
            return;
        };
        match Self::enigo().and_then(|mut enigo| {
            enigo
                .key(key, Direction::Release)
                .map_err(|e| AgentError::Actuator(e.to_string()))
        }) {
            Ok(()) => tracing::info!(?key, "released held key"),
            Err(e) => tracing::warn!(?key, "could not release held key: {e}"),
        }
    }

    fn set_held(&self, key: Option<Key>) {
        match self.held.lock() {
            Ok(mut guard) => *guard = key,
            Err(poisoned) => *poisoned.into_inner() = key,
        }
    }

    /// A fresh connection per operation keeps `Enigo` off the await points.
    fn enigo() -> AgentResult<Enigo> {
        let settings = Settings {
            release_keys_when_dropped: false,
            ..Settings::default()
        };
        Enigo::new(&settings).map_err(|e| {
            AgentError::Actuator(format!("failed to initialise input backend: {e}"))
        })
    }
}

fn enigo_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

#[async_trait]
impl Actuator for EnigoActuator {
    async fn press_key(&self, key: &str, hold: Duration) -> AgentResult<()> {
        let resolved = resolve_key(key)?;

        Self::enigo()?
            .key(resolved, Direction::Press)
            .map_err(|e| AgentError::Actuator(format!("key down '{key}' failed: {e}")))?;
        self.set_held(Some(resolved));

        tokio::time::sleep(hold).await;

        let released = Self::enigo()?
            .key(resolved, Direction::Release)
            .map_err(|e| AgentError::Actuator(format!("key up '{key}' failed: {e}")));
        self.set_held(None);
        released
    }

    async fn move_mouse(&self, dx: i32, dy: i32) -> AgentResult<()> {
        Self::enigo()?
            .move_mouse(dx, dy, Coordinate::Rel)
            .map_err(|e| AgentError::Actuator(format!("mouse move failed: {e}")))
    }

    async fn click(&self, button: MouseButton) -> AgentResult<()> {
        Self::enigo()?
            .button(enigo_button(button), Direction::Click)
            .map_err(|e| AgentError::Actuator(format!("{button:?} click failed: {e}")))
    }

    async fn speak(&self, message: &str) -> AgentResult<()> {
        self.speech.speak(message).await
    }
}
