//! Frame encoding for upload.
//!
//! WebP keeps uploads small; when the encoder rejects a frame the tick falls
//! back to PNG instead of dropping the capture.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use base64::Engine as _;
use image::{imageops::FilterType, DynamicImage, ImageFormat, RgbaImage};

use super::Frame;
use crate::log_warn;

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMime {
    Webp,
    Png,
}

impl ImageMime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMime::Webp => "image/webp",
            ImageMime::Png => "image/png",
        }
    }
}

/// One encoded capture, ready for upload.
#[derive(Debug, Clone)]
pub struct EncodedCapture {
    pub bytes: Vec<u8>,
    pub mime: ImageMime,
    pub captured_at_ms: i64,
}

impl EncodedCapture {
    /// Wire form: `data:<mime>;base64,<data>`.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime.as_str(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Encodes a frame, downscaling to `max_dimensions` when the backend
/// returned something larger than the visible work area.
pub fn encode_frame(frame: &Frame, max_dimensions: Option<(u32, u32)>) -> Result<EncodedCapture> {
    let buffer = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone())
        .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
    let mut image = DynamicImage::ImageRgba8(buffer);

    if let Some((max_width, max_height)) = max_dimensions {
        if frame.width > max_width || frame.height > max_height {
            image = image.resize(max_width, max_height, FilterType::Triangle);
        }
    }

    let (bytes, mime) = match encode_with(&image, ImageFormat::WebP) {
        Ok(bytes) => (bytes, ImageMime::Webp),
        Err(err) => {
            log_warn!("webp encode failed, falling back to png: {err}");
            let bytes = encode_with(&image, ImageFormat::Png)
                .context("png fallback encode failed")?;
            (bytes, ImageMime::Png)
        }
    };

    Ok(EncodedCapture {
        bytes,
        mime,
        captured_at_ms: frame.captured_at_ms,
    })
}

fn encode_with(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), format)?;
    Ok(buffer)
}
