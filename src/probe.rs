// Offline checks of a model backend against saved screenshots.
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::agent_engine::parser::parse;
use crate::agent_engine::state::ActionDescriptor;
use crate::errors::{AgentError, AgentResult};
use crate::perception::still::load_frame;
use crate::vlm::provider::VisionModel;

pub const DEFAULT_PROBE_INSTRUCTION: &str = "You are a game-playing AI agent. Analyze this \
screenshot and describe: 1) what you see in the scene, 2) character and UI information \
visible, 3) what action or objective seems most appropriate next.";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];
const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub width: u32,
    pub height: u32,
    pub file_size_kb: f64,
    pub response: String,
    pub action: ActionDescriptor,
}

/// Sends one image file to `model` and parses what comes back.
pub async fn probe_image(
    model: &dyn VisionModel,
    path: &Path,
    instruction: &str,
) -> AgentResult<ProbeOutcome> {
    let file_size_kb = std::fs::metadata(path)?.len() as f64 / 1024.0;
    let frame = load_frame(path)?;
    tracing::info!(
        file = %path.display(),
        width = frame.meta.width,
        height = frame.meta.height,
        "querying model"
    );
    let response = model.predict(&frame, instruction).await?;
    Ok(ProbeOutcome {
        width: frame.meta.width,
        height: frame.meta.height,
        file_size_kb,
        action: parse(&response),
        response,
    })
}

/// Image files directly inside `dir`, sorted by path. Extensions match
/// case-insensitively.
pub fn list_images(dir: &Path) -> AgentResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AgentError::Config(format!(
            "screenshot directory {} not found",
            dir.display()
        )));
    }
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_image {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

#[derive(Debug)]
pub struct BatchEntry {
    pub file: String,
    pub outcome: Result<ProbeOutcome, String>,
}

impl BatchEntry {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Probes every image in `dir`. Per-image failures are recorded, not returned.
pub async fn run_batch(
    model: &dyn VisionModel,
    dir: &Path,
    instruction: &str,
) -> AgentResult<Vec<BatchEntry>> {
    let images = list_images(dir)?;
    tracing::info!(count = images.len(), dir = %dir.display(), "batch started");

    let mut entries = Vec::with_capacity(images.len());
    for path in images {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let outcome = probe_image(model, &path, instruction)
            .await
            .map_err(|e| e.to_string());
        if let Err(e) = &outcome {
            tracing::warn!(file = %file, "probe failed: {e}");
        }
        entries.push(BatchEntry { file, outcome });
    }
    Ok(entries)
}

pub fn render_report(entries: &[BatchEntry], backend: &str, generated: DateTime<Local>) -> String {
    let successful = entries.iter().filter(|e| e.is_success()).count();
    let mut report = String::new();

    // Writing into a String cannot fail.
    let _ = writeln!(report, "{RULE}\nBATCH SCREENSHOT TEST REPORT\n{RULE}");
    let _ = writeln!(report, "Generated: {}", generated.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(report, "Backend: {backend}");
    let _ = writeln!(report, "Total tests: {}", entries.len());
    let _ = writeln!(report, "Successful: {successful}");
    let _ = writeln!(report, "Failed: {}\n", entries.len() - successful);

    for (i, entry) in entries.iter().enumerate() {
        let _ = writeln!(report, "{RULE}\nTEST #{}: {}\n{RULE}", i + 1, entry.file);
        match &entry.outcome {
            Ok(outcome) => {
                let _ = writeln!(report, "Status: SUCCESS");
                let _ = writeln!(report, "Image size: {}x{}", outcome.width, outcome.height);
                let _ = writeln!(report, "File size: {:.1} KB", outcome.file_size_kb);
                let _ = writeln!(report, "Parsed action: {}", outcome.action.kind());
                let _ = writeln!(
                    report,
                    "\nModel Response:\n{THIN_RULE}\n{}\n{THIN_RULE}",
                    outcome.response
                );
            }
            Err(error) => {
                let _ = writeln!(report, "Status: FAILED\nError: {error}");
            }
        }
        let _ = writeln!(report);
    }
    report
}

/// Writes `test_report_<YYYYmmdd_HHMMSS>.txt` into `out_dir`.
pub fn write_report(entries: &[BatchEntry], backend: &str, out_dir: &Path) -> AgentResult<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let now = Local::now();
    let path = out_dir.join(format!("test_report_{}.txt", now.format("%Y%m%d_%H%M%S")));
    std::fs::write(&path, render_report(entries, backend, now))?;
    tracing::info!(path = %path.display(), "batch report written");
    Ok(path)
}
