use std::io::Cursor;

use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::errors::{AgentError, AgentResult};
use crate::perception::types::Frame;

/// JPEG-encodes the frame, scaling it down first so its width is at most `max_width`.
pub fn encode_jpeg(frame: &Frame, max_width: u32) -> AgentResult<Vec<u8>> {
    let mut img = DynamicImage::ImageRgba8(frame.image.clone());
    if max_width > 0 && img.width() > max_width {
        let scale = max_width as f64 / img.width() as f64;
        let height = ((img.height() as f64 * scale).round() as u32).max(1);
        img = img.resize_exact(max_width, height, FilterType::Triangle);
        tracing::debug!(width = max_width, height, "frame scaled down for upload");
    }

    let mut buf = Cursor::new(Vec::new());
    img.to_rgb8()
        .write_to(&mut buf, ImageFormat::Jpeg)
        .map_err(|e| AgentError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(buf.into_inner())
}

pub fn jpeg_data_uri(jpeg: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(jpeg)
    )
}
