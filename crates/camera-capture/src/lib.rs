//! Camera Capture
//!
//! Frame acquisition boundary for the focus monitor. The real device
//! driver lives behind [`FrameSource`]; this crate ships the frame type,
//! capture settings and a synthetic source for tests and dry runs.

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, ReplaySource, SyntheticSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera: {0}")]
    Open(String),

    #[error("Invalid frame: {0}")]
    Format(String),

    #[error("Capture timeout")]
    Timeout,

    #[error("Source exhausted")]
    Exhausted,
}

/// Capture settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index (0 = default webcam)
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    /// Target frames per second
    pub fps: u32,
    /// Flip horizontally so the preview behaves like a mirror
    pub mirror: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            fps: 30,
            mirror: true,
        }
    }
}

impl CameraConfig {
    /// Low-resolution capture for slow machines
    pub fn low_res() -> Self {
        Self {
            width: 320,
            height: 240,
            fps: 15,
            ..Default::default()
        }
    }

    /// Nominal time between frames
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}
