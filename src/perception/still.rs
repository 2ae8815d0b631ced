// Frames read from an image file instead of the screen.
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::AgentResult;
use crate::perception::traits::FrameSource;
use crate::perception::types::Frame;

pub fn load_frame(path: &Path) -> AgentResult<Frame> {
    let image = image::open(path)?.to_rgba8();
    Ok(Frame::new(image, None))
}

/// Serves the same image file on every capture. Useful for dry runs against a
/// saved screenshot.
pub struct StillFrameSource {
    path: PathBuf,
}

impl StillFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FrameSource for StillFrameSource {
    async fn capture(&self) -> AgentResult<Frame> {
        load_frame(&self.path)
    }
}
