// Key-name resolution for the actuator. Model output is passed through the
// dispatcher verbatim, so this is where bad key names get rejected.
use enigo::Key;

use crate::errors::{AgentError, AgentResult};

pub fn resolve_key(name: &str) -> AgentResult<Key> {
    let trimmed = name.trim();

    let mut chars = trimmed.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Ok(Key::Unicode(c.to_ascii_lowercase()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let key = match lower.as_str() {
        "space" | "spacebar" => Key::Space,
        "enter" | "return" => Key::Return,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "shift" => Key::Shift,
        "ctrl" | "control" => Key::Control,
        "alt" => Key::Alt,
        "meta" | "super" | "win" | "cmd" | "command" => Key::Meta,
        "capslock" => Key::CapsLock,
        "up" | "arrowup" => Key::UpArrow,
        "down" | "arrowdown" => Key::DownArrow,
        "left" | "arrowleft" => Key::LeftArrow,
        "right" | "arrowright" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        other => match function_key(other) {
            Some(k) => k,
            None => {
                return Err(AgentError::Actuator(format!(
                    "unknown key name '{name}'"
                )))
            }
        },
    };
    Ok(key)
}

fn function_key(name: &str) -> Option<Key> {
    let n: u8 = name.strip_prefix('f')?.parse().ok()?;
    Some(match n {
        1 => Key::F1,
        2 => Key::F2,
        3 => Key::F3,
        4 => Key::F4,
        5 => Key::F5,
        6 => Key::F6,
        7 => Key::F7,
        8 => Key::F8,
        9 => Key::F9,
        10 => Key::F10,
        11 => Key::F11,
        12 => Key::F12,
        _ => return None,
    })
}
