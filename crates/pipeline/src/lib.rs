//! Focus Monitor Pipeline
//!
//! Two long-lived worker threads joined by drop-oldest queues:
//!
//! ```text
//! FrameSource -> [capture] -> frame queue (2) -> [inference] -> result queue (2)
//!                    |                                 |
//!               latest frame                     latest result
//! ```
//!
//! The inference worker runs the frame-skip scheduler, then the per-frame
//! analyzer (smoothing, calibration or anomaly detection, state fusion and
//! focus scoring) on every frame it receives.

mod analyzer;
mod fps;
mod pipeline;
mod telemetry;
mod worker;

pub use analyzer::{AnalyzerConfig, CalibrationProgress, FrameAnalyzer, FrameReport};
pub use fps::{FpsMeter, SharedFps};
pub use pipeline::{Pipeline, PipelineConfig};
pub use worker::{CaptureWorker, ControlMessage, FrameQueue, InferenceWorker, WorkerState};

use thiserror::Error;

pub const METRIC_FRAMES_CAPTURED: &str = "focus_monitor_frames_captured_total";
pub const METRIC_FRAMES_DROPPED: &str = "focus_monitor_frames_dropped_total";
pub const METRIC_FRAMES_PROCESSED: &str = "focus_monitor_frames_processed_total";
pub const METRIC_INFERENCE_ERRORS: &str = "focus_monitor_inference_errors_total";
pub const METRIC_CAPTURE_FPS: &str = "focus_monitor_capture_fps";
pub const METRIC_INFERENCE_FPS: &str = "focus_monitor_inference_fps";
pub const METRIC_FOCUS_SCORE: &str = "focus_monitor_focus_score";

/// Pipeline error types
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{worker} worker cannot start from state {state:?}")]
    InvalidState { worker: &'static str, state: WorkerState },

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] ring_buffer::QueueError),

    #[error("Detector setup failed: {0}")]
    Detector(#[from] dms::DmsError),

    #[error("Invalid focus weights: {0}")]
    Fusion(#[from] event_fusion::FusionError),

    #[error("Control channel closed")]
    ControlChannelClosed,
}
