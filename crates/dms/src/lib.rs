//! Driver Monitoring System (DMS)
//!
//! Per-user state analysis from normalized face and body landmarks:
//! - Geometry extraction (eye aspect ratio, head angles, shoulders, IPD)
//! - Adaptive anomaly detection against a calibrated baseline
//! - Gaze direction tracking
//! - Phone usage tracking
//! - Emotion readings from blendshape coefficients

pub mod analysis;
pub mod config;
pub mod detector;
pub mod emotion;
pub mod gaze;
pub mod geometry;
pub mod landmarks;
pub mod phone;
pub mod state;

pub use analysis::{DetectionCounters, DetectionFlags, DetectionResult, DistanceStatus, DmsAlert};
pub use config::DetectorConfig;
pub use detector::AdaptiveDetector;
pub use emotion::{Blendshapes, BlendshapeEmotionMapper, Emotion, EmotionReading};
pub use gaze::{GazeDirection, GazeReading, GazeTracker};
pub use geometry::FrameGeometry;
pub use landmarks::{FaceLandmarks, Landmark, PoseLandmarks};
pub use phone::{PhoneDetection, PhoneUsageTracker};
pub use state::{DecayCounter, DetectorState, StreakCounter};

use thiserror::Error;

/// DMS error types
#[derive(Error, Debug)]
pub enum DmsError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown emotion label: {0}")]
    UnknownEmotion(String),

    #[error("Filter setup failed: {0}")]
    Filter(#[from] signal_filter::FilterError),
}
