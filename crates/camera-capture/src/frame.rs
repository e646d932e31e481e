//! Video frame type and basic image operations

use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Capture timestamp (nanoseconds since the source started)
    pub timestamp_ns: u64,
    /// Frame sequence number
    pub sequence: u64,
}

impl VideoFrame {
    /// Wrap raw RGB bytes, checking the buffer matches the dimensions
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        timestamp_ns: u64,
        sequence: u64,
    ) -> Result<Self, CameraError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(CameraError::Format(format!(
                "expected {} bytes for {}x{}, got {}",
                expected,
                width,
                height,
                data.len()
            )));
        }
        Ok(Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        })
    }

    /// Frame filled with a single color
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], timestamp_ns: u64, sequence: u64) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            data,
            width,
            height,
            timestamp_ns,
            sequence,
        }
    }

    /// Timestamp in milliseconds, as handed to inference backends
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ns / 1_000_000
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data
            .get(idx..idx + 3)
            .map(|p| [p[0], p[1], p[2]])
    }

    /// Luma plane (BT.601 weights)
    pub fn to_grayscale(&self) -> Vec<u8> {
        self.data
            .chunks_exact(3)
            .map(|p| (p[0] as f32 * 0.299 + p[1] as f32 * 0.587 + p[2] as f32 * 0.114) as u8)
            .collect()
    }

    fn to_image(&self) -> Result<RgbImage, CameraError> {
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| CameraError::Format("buffer does not match dimensions".to_string()))
    }

    fn with_image(&self, img: RgbImage) -> VideoFrame {
        VideoFrame {
            width: img.width(),
            height: img.height(),
            data: img.into_raw(),
            timestamp_ns: self.timestamp_ns,
            sequence: self.sequence,
        }
    }

    /// Horizontal flip
    pub fn mirrored(&self) -> Result<VideoFrame, CameraError> {
        let img = self.to_image()?;
        Ok(self.with_image(imageops::flip_horizontal(&img)))
    }

    /// Shrink so the longer side is at most `max_side`, keeping aspect ratio
    pub fn downscale(&self, max_side: u32) -> Result<VideoFrame, CameraError> {
        let longest = self.width.max(self.height);
        if max_side == 0 || longest <= max_side {
            return Ok(self.clone());
        }
        let scale = max_side as f64 / longest as f64;
        let new_w = ((self.width as f64 * scale).round() as u32).max(1);
        let new_h = ((self.height as f64 * scale).round() as u32).max(1);

        let img = self.to_image()?;
        Ok(self.with_image(imageops::resize(&img, new_w, new_h, FilterType::Triangle)))
    }
}
