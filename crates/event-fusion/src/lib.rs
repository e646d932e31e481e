//! Event Fusion Engine
//!
//! Correlates per-frame signals into behavioral states:
//! - Blink rate (from eye aspect ratio)
//! - Boredom, dazed and severe-distraction votes with soft-decay counters
//! - Dominant state resolution
//! - Weighted 0-100 focus score
//!
//! Every component here is single-threaded and owned by the inference worker.

mod blink;
mod focus;
mod states;

pub use blink::BlinkTracker;
pub use focus::{FocusBreakdown, FocusCalculator, FocusInputs, FocusLevel, FocusWeights};
pub use states::{
    BoredomDetector, DazedDetector, DistractionDetector, DominantState, FusionConfig,
    FusionInputs, FusionOutcome, StateFusion,
};

use thiserror::Error;

/// Fusion error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("Invalid focus weights: {0}")]
    InvalidWeights(String),
}
