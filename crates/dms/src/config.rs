//! Detector configuration

use serde::{Deserialize, Serialize};
use signal_filter::SmoothingMethod;

/// Adaptive detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// EAR z-score below which a frame counts as drowsy
    pub z_threshold_drowsy: f64,

    /// |z| above which head tilt or shoulder angle counts as bad posture;
    /// head pitch above it counts as head down
    pub z_threshold_posture: f64,

    /// |z| on IPD beyond which the user sits too close / too far
    pub z_threshold_distance: f64,

    /// Consecutive anomalous frames before a flag is raised
    pub consecutive_frames: u32,

    /// Smoothing window
    pub filter_window: usize,

    /// Smoothing method
    pub filter_method: SmoothingMethod,

    /// Consecutive face-absent frames before FaceNotVisible is raised
    pub face_absent_frames: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            z_threshold_drowsy: -2.0,
            z_threshold_posture: 2.0,
            z_threshold_distance: 2.0,
            consecutive_frames: 15,
            filter_window: 7,
            filter_method: SmoothingMethod::Ema,
            face_absent_frames: 30,
        }
    }
}

impl DetectorConfig {
    /// Create strict config (lower thresholds)
    pub fn strict() -> Self {
        Self {
            z_threshold_drowsy: -1.5,
            z_threshold_posture: 1.5,
            z_threshold_distance: 1.5,
            consecutive_frames: 10,
            ..Default::default()
        }
    }

    /// Create lenient config (higher thresholds)
    pub fn lenient() -> Self {
        Self {
            z_threshold_drowsy: -2.5,
            z_threshold_posture: 2.5,
            z_threshold_distance: 2.5,
            consecutive_frames: 25,
            ..Default::default()
        }
    }
}
