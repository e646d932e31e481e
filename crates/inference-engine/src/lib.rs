//! Inference Engine
//!
//! Boundary to the landmark, blendshape, emotion and object models. The
//! models themselves are external; this crate schedules how often each
//! one runs and reuses the last successful output on skipped frames.

mod backend;
mod preset;
mod scheduler;
mod synthetic;

pub use backend::{FaceObservation, InferenceBackend, ObjectDetection, PHONE_LABEL};
pub use preset::{PerformancePreset, PresetSettings, SkipIntervals};
pub use scheduler::{InferenceOutput, InferenceScheduler, StagesRun};
pub use synthetic::{SyntheticBackend, SyntheticScene};

use thiserror::Error;

/// Errors raised by inference backends
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    #[error("Inference timeout after {0}ms")]
    Timeout(u64),
}
