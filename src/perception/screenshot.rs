// Screen capture via xcap.
use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;
use xcap::Monitor;

use crate::errors::{AgentError, AgentResult};
use crate::perception::traits::FrameSource;
use crate::perception::types::Frame;

pub struct XcapFrameSource {
    /// `None` picks the primary monitor.
    monitor_index: Option<usize>,
}

impl XcapFrameSource {
    pub fn new(monitor_index: Option<usize>) -> Self {
        Self { monitor_index }
    }
}

fn grab(monitor_index: Option<usize>) -> AgentResult<Frame> {
    let mut monitors = Monitor::all()
        .map_err(|e| AgentError::Capture(format!("failed to enumerate monitors: {e}")))?;

    let monitor = match monitor_index {
        Some(i) => monitors.into_iter().nth(i).ok_or_else(|| {
            AgentError::Capture(format!("monitor index {i} out of range"))
        })?,
        None => {
            if monitors.is_empty() {
                return Err(AgentError::Capture("no monitors found".into()));
            }
            let primary = monitors.iter().position(|m| m.is_primary()).unwrap_or(0);
            monitors.swap_remove(primary)
        }
    };

    let image = monitor
        .capture_image()
        .map_err(|e| AgentError::Capture(format!("screen grab failed: {e}")))?;
    Ok(Frame::new(image, monitor_index))
}

#[async_trait]
impl FrameSource for XcapFrameSource {
    async fn capture(&self) -> AgentResult<Frame> {
        let index = self.monitor_index;
        let frame = tokio::task::spawn_blocking(move || grab(index))
            .await
            .map_err(|e| AgentError::Capture(format!("join: {e}")))??;
        tracing::debug!(
            width = frame.meta.width,
            height = frame.meta.height,
            "frame captured"
        );
        Ok(frame)
    }
}

/// Writes the frame to `path`; the format follows the file extension.
pub fn save_frame(frame: &Frame, path: &Path) -> AgentResult<()> {
    DynamicImage::ImageRgba8(frame.image.clone())
        .to_rgb8()
        .save(path)?;
    tracing::info!(path = %path.display(), "screenshot saved");
    Ok(())
}
