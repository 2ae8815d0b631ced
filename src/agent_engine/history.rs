use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{ActionDescriptor, RunMode};
use crate::errors::AgentResult;

/// One line of the session JSONL file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub ts: i64,
    pub iteration: u64,
    pub mode: RunMode,
    pub response: String,
    pub action: Option<serde_json::Value>,
}

/// Append-only log of model responses and the actions taken for them.
pub struct SessionHistory {
    pub session_id: String,
    file_path: PathBuf,
}

impl SessionHistory {
    /// Opens a new session under the platform data directory.
    pub fn new() -> AgentResult<Self> {
        Self::new_in(&sessions_dir())
    }

    pub fn new_in(dir: &Path) -> AgentResult<Self> {
        std::fs::create_dir_all(dir)?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        tracing::info!(path = %file_path.display(), "recording session history");
        Ok(Self {
            session_id,
            file_path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn record(
        &self,
        iteration: u64,
        mode: RunMode,
        response: &str,
        action: Option<&ActionDescriptor>,
    ) -> AgentResult<()> {
        let entry = HistoryEntry {
            ts: chrono::Utc::now().timestamp_millis(),
            iteration,
            mode,
            response: response.to_string(),
            action: action.map(serde_json::to_value).transpose()?,
        };
        let line = serde_json::to_string(&entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{line}")?;
        tracing::debug!(path = %self.file_path.display(), "history entry flushed");
        Ok(())
    }
}

/// `<data_local_dir>/lumine/sessions`, or `./sessions` when the platform has none.
fn sessions_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lumine"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sessions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::state::MouseButton;

    #[test]
    fn entries_append_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let history = SessionHistory::new_in(dir.path()).unwrap();

        history
            .record(
                1,
                RunMode::Action,
                r#"{"type": "click"}"#,
                Some(&ActionDescriptor::Click {
                    button: MouseButton::Left,
                }),
            )
            .unwrap();
        history
            .record(2, RunMode::Describe, "A dark cave.", None)
            .unwrap();

        let text = std::fs::read_to_string(history.path()).unwrap();
        let lines: Vec<HistoryEntry> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].action.as_ref().unwrap()["type"], "click");
        assert_eq!(lines[1].mode, RunMode::Describe);
        assert!(lines[1].action.is_none());
        assert!(history
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains(&history.session_id));
    }

    #[test]
    fn press_duration_is_logged_in_seconds() {
        let dir = tempfile::tempdir().unwrap();
        let history = SessionHistory::new_in(dir.path()).unwrap();
        history
            .record(
                1,
                RunMode::Action,
                r#"{"type": "press_key", "key": "w", "duration": 1.5}"#,
                Some(&ActionDescriptor::PressKey {
                    key: "w".into(),
                    duration: std::time::Duration::from_millis(1500),
                }),
            )
            .unwrap();

        let text = std::fs::read_to_string(history.path()).unwrap();
        let entry: HistoryEntry = serde_json::from_str(text.trim()).unwrap();
        assert_eq!(entry.action.unwrap()["duration"], 1.5);
    }
}
