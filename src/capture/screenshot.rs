use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::config::CaptureConfig;

/// What a screenshot should cover.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CaptureTarget {
    /// The whole app surface; used by periodic capture.
    #[default]
    Screen,
    /// A host-specific view reference.
    View(String),
}

/// Host hook that renders a target to encoded image bytes.
#[async_trait]
pub trait Screenshotter: Send + Sync {
    async fn capture(&self, target: &CaptureTarget) -> Result<Vec<u8>>;
}

/// Turns screenshot bytes into the base64 payload stored on a frame,
/// downscaling to JPEG when a maximum width is configured.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    max_width: Option<u32>,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(max_width: Option<u32>, quality: u8) -> Self {
        Self {
            max_width,
            quality: quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &CaptureConfig) -> Self {
        Self::new(config.frame_max_width, config.jpeg_quality)
    }

    /// Whether encoding does CPU work worth moving off the async runtime.
    pub fn is_passthrough(&self) -> bool {
        self.max_width.is_none()
    }

    pub fn encode(&self, bytes: &[u8]) -> Result<String> {
        let Some(max_width) = self.max_width else {
            return Ok(STANDARD.encode(bytes));
        };

        let img = image::load_from_memory(bytes).context("failed to decode screenshot")?;
        let img = if img.width() > max_width {
            img.resize(max_width, img.height(), FilterType::Triangle)
        } else {
            img
        };

        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode_image(&img.to_rgb8())
            .context("failed to encode frame as jpeg")?;
        Ok(STANDARD.encode(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    #[test]
    fn passthrough_base64_encodes_bytes() {
        let encoder = FrameEncoder::new(None, 70);
        assert!(encoder.is_passthrough());
        assert_eq!(encoder.encode(b"abc").unwrap(), "YWJj");
    }

    #[test]
    fn downscales_wide_frames() {
        let encoder = FrameEncoder::new(Some(16), 80);
        let encoded = encoder.encode(&png(64, 32)).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (16, 8));
    }

    #[test]
    fn narrow_frames_keep_their_size() {
        let encoder = FrameEncoder::new(Some(100), 80);
        let bytes = STANDARD.decode(encoder.encode(&png(20, 10)).unwrap()).unwrap();
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!((img.width(), img.height()), (20, 10));
    }

    #[test]
    fn undecodable_bytes_fail_when_resizing() {
        let encoder = FrameEncoder::new(Some(16), 80);
        assert!(encoder.encode(b"not an image").is_err());
    }
}
