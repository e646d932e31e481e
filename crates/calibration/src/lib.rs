//! Baseline Calibration
//!
//! Collects a short window of smoothed measurements while the user sits in
//! their normal working posture and turns them into a per-channel
//! statistical baseline. Every later anomaly is judged relative to it.

mod calibrator;
mod profile;
mod statistic;

pub use calibrator::{CalibrationConfig, CalibrationState, Calibrator};
pub use profile::{UserBaselineProfile, DEFAULT_USER_ID};
pub use statistic::CalibrationStatistic;

use thiserror::Error;

/// Calibration error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Insufficient calibration data: {collected} samples, need at least {required}")]
    InsufficientSamples { collected: usize, required: usize },

    #[error("Calibration is not collecting (state: {0})")]
    NotCollecting(CalibrationState),

    #[error("Profile serialization failed: {0}")]
    Serialization(String),
}
