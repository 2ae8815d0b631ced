use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    /// Monitor the frame came from; `None` for frames loaded from disk.
    pub monitor_index: Option<usize>,
    pub width: u32,
    pub height: u32,
    pub captured_at: DateTime<Utc>,
}

/// One snapshot handed to the model backend.
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    pub meta: FrameMeta,
}

impl Frame {
    pub fn new(image: RgbaImage, monitor_index: Option<usize>) -> Self {
        let meta = FrameMeta {
            monitor_index,
            width: image.width(),
            height: image.height(),
            captured_at: Utc::now(),
        };
        Self { image, meta }
    }
}
