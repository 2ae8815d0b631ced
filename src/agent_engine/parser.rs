//! Turns free-form model text into an [`ActionDescriptor`].
//!
//! Models asked for a bare JSON record tend to wrap it in prose or markdown
//! fences, so decoding runs in two phases:
//!
//! 1. the whole trimmed response as one record;
//! 2. the span from the first `{` to the last `}`.
//!
//! If both fail the configured [`ParseFallback`] is returned. Parsing never errors.
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::agent_engine::state::{
    ActionDescriptor, MouseButton, ParseFallback, DEFAULT_PRESS_DURATION, DEFAULT_WAIT_DURATION,
};

/// Wire shape of the action protocol.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ActionRecord {
    PressKey {
        key: String,
        duration: Option<f64>,
    },
    MoveMouse {
        x: Option<i32>,
        y: Option<i32>,
    },
    Click {
        button: Option<MouseButton>,
    },
    Wait {
        duration: Option<f64>,
    },
    Say {
        message: Option<String>,
    },
}

#[derive(Debug, Error)]
enum DecodeError {
    #[error("invalid action record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid duration {0}")]
    Duration(f64),
}

impl TryFrom<ActionRecord> for ActionDescriptor {
    type Error = DecodeError;

    fn try_from(record: ActionRecord) -> Result<Self, Self::Error> {
        Ok(match record {
            ActionRecord::PressKey { key, duration } => ActionDescriptor::PressKey {
                key,
                duration: seconds(duration, DEFAULT_PRESS_DURATION)?,
            },
            ActionRecord::MoveMouse { x, y } => ActionDescriptor::MoveMouse {
                dx: x.unwrap_or(0),
                dy: y.unwrap_or(0),
            },
            ActionRecord::Click { button } => ActionDescriptor::Click {
                button: button.unwrap_or_default(),
            },
            ActionRecord::Wait { duration } => ActionDescriptor::Wait {
                duration: seconds(duration, DEFAULT_WAIT_DURATION)?,
            },
            ActionRecord::Say { message } => ActionDescriptor::Say {
                message: message.unwrap_or_default(),
            },
        })
    }
}

fn seconds(value: Option<f64>, default: Duration) -> Result<Duration, DecodeError> {
    match value {
        None => Ok(default),
        Some(secs) => Duration::try_from_secs_f64(secs).map_err(|_| DecodeError::Duration(secs)),
    }
}

fn decode(text: &str) -> Result<ActionDescriptor, DecodeError> {
    let record: ActionRecord = serde_json::from_str(text)?;
    ActionDescriptor::try_from(record)
}

/// Greedy `{ ... }` span: first opening brace to last closing brace.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Runs both decode phases. `None` means the response holds no usable record.
pub fn try_parse(raw: &str) -> Option<ActionDescriptor> {
    let text = raw.trim();

    match decode(text) {
        Ok(action) => return Some(action),
        Err(e) => tracing::debug!(error = %e, "whole-text decode failed"),
    }

    let span = brace_span(text)?;
    match decode(span) {
        Ok(action) => {
            tracing::debug!(span_len = span.len(), "action recovered from substring");
            Some(action)
        }
        Err(e) => {
            tracing::debug!(error = %e, "substring decode failed");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseParser {
    fallback: ParseFallback,
}

impl ResponseParser {
    pub fn new(fallback: ParseFallback) -> Self {
        Self { fallback }
    }

    pub fn parse(&self, raw: &str) -> ActionDescriptor {
        if let Some(action) = try_parse(raw) {
            return action;
        }
        tracing::warn!(
            response = %preview(raw),
            fallback = ?self.fallback,
            "no action record in model response"
        );
        match self.fallback {
            ParseFallback::Wait => ActionDescriptor::safe_default(),
            ParseFallback::Unknown => ActionDescriptor::Unknown {
                raw: raw.to_string(),
            },
        }
    }
}

/// Parses with the default (`wait`) fallback.
pub fn parse(raw: &str) -> ActionDescriptor {
    ResponseParser::default().parse(raw)
}

fn preview(raw: &str) -> String {
    const MAX: usize = 120;
    let mut out: String = raw.chars().take(MAX).collect();
    if raw.chars().count() > MAX {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wait_default() -> ActionDescriptor {
        ActionDescriptor::Wait {
            duration: Duration::from_secs(1),
        }
    }

    #[test]
    fn press_key_keeps_explicit_duration() {
        let action = parse(r#"{"type": "press_key", "key": "w", "duration": 1.0}"#);
        assert_eq!(
            action,
            ActionDescriptor::PressKey {
                key: "w".into(),
                duration: Duration::from_secs(1),
            }
        );
    }

    #[test]
    fn omitted_fields_get_defaults() {
        assert_eq!(
            parse(r#"{"type": "press_key", "key": "space"}"#),
            ActionDescriptor::PressKey {
                key: "space".into(),
                duration: Duration::from_millis(100),
            }
        );
        assert_eq!(
            parse(r#"{"type": "move_mouse", "x": -100}"#),
            ActionDescriptor::MoveMouse { dx: -100, dy: 0 }
        );
        assert_eq!(
            parse(r#"{"type": "click"}"#),
            ActionDescriptor::Click {
                button: MouseButton::Left
            }
        );
        assert_eq!(parse(r#"{"type": "wait"}"#), wait_default());
        assert_eq!(
            parse(r#"{"type": "say"}"#),
            ActionDescriptor::Say {
                message: String::new()
            }
        );
    }

    #[test]
    fn all_fields_preserved() {
        assert_eq!(
            parse(r#"{"type": "move_mouse", "x": 40, "y": -25}"#),
            ActionDescriptor::MoveMouse { dx: 40, dy: -25 }
        );
        assert_eq!(
            parse(r#"{"type": "click", "button": "middle"}"#),
            ActionDescriptor::Click {
                button: MouseButton::Middle
            }
        );
        assert_eq!(
            parse(r#"{"type": "wait", "duration": 2.5}"#),
            ActionDescriptor::Wait {
                duration: Duration::from_millis(2500)
            }
        );
        assert_eq!(
            parse(r#"{"type": "say", "message": "Hello"}"#),
            ActionDescriptor::Say {
                message: "Hello".into()
            }
        );
    }

    #[test]
    fn integer_duration_is_accepted() {
        assert_eq!(
            parse(r#"{"type": "wait", "duration": 3}"#),
            ActionDescriptor::Wait {
                duration: Duration::from_secs(3)
            }
        );
    }

    #[test]
    fn record_inside_code_fence_is_recovered() {
        let raw = "Sure! Here's the action:\n```json\n{\"type\": \"click\", \"button\": \"right\"}\n```\n";
        assert_eq!(
            parse(raw),
            ActionDescriptor::Click {
                button: MouseButton::Right
            }
        );
    }

    #[test]
    fn record_inside_prose_matches_bare_record() {
        let bare = r#"{"type": "press_key", "key": "a", "duration": 0.5}"#;
        let wrapped = format!("I will strafe left now. {bare} That should dodge the arrow.");
        assert_eq!(parse(&wrapped), parse(bare));
    }

    #[test]
    fn prose_without_json_waits() {
        assert_eq!(parse("I think you should move forward."), wait_default());
        assert_eq!(parse("wait"), wait_default());
        assert_eq!(parse(""), wait_default());
    }

    #[test]
    fn broken_spans_wait() {
        assert_eq!(parse(r#"{"type": "press_key", "key": "w""#), wait_default());
        assert_eq!(parse("} backwards {"), wait_default());
        // greedy span covers both objects and is not valid JSON
        assert_eq!(
            parse(r#"{"type": "click"} or {"type": "wait"}"#),
            wait_default()
        );
    }

    #[test]
    fn unknown_or_missing_type_waits() {
        assert_eq!(parse(r#"{"type": "jump"}"#), wait_default());
        assert_eq!(parse(r#"{"key": "w"}"#), wait_default());
        assert_eq!(parse(r#"{"type": "click", "button": "side"}"#), wait_default());
    }

    #[test]
    fn invalid_durations_are_rejected() {
        assert_eq!(
            parse(r#"{"type": "wait", "duration": -2.0}"#),
            wait_default()
        );
        assert_eq!(
            parse(r#"{"type": "press_key", "key": "w", "duration": -0.1}"#),
            wait_default()
        );
    }

    #[test]
    fn unknown_fallback_keeps_raw_text() {
        let parser = ResponseParser::new(ParseFallback::Unknown);
        assert_eq!(
            parser.parse("nothing useful"),
            ActionDescriptor::Unknown {
                raw: "nothing useful".into()
            }
        );
        assert_eq!(
            parser.parse(r#"{"type": "wait", "duration": 0.25}"#),
            ActionDescriptor::Wait {
                duration: Duration::from_millis(250)
            }
        );
    }

    #[test]
    fn parse_is_deterministic() {
        let inputs = [
            r#"{"type": "press_key", "key": "e"}"#,
            "```{\"type\": \"say\", \"message\": \"hi\"}```",
            "no action here",
        ];
        for raw in inputs {
            assert_eq!(parse(raw), parse(raw));
        }
    }

    #[test]
    fn try_parse_distinguishes_fallback() {
        assert!(try_parse("just a description of a forest").is_none());
        assert_eq!(
            try_parse(r#"The scene is calm. {"type": "say", "message": "Hello"}"#),
            Some(ActionDescriptor::Say {
                message: "Hello".into()
            })
        );
    }
}
