//! Phone usage tracking from object detections

use serde::{Deserialize, Serialize};

use crate::state::DecayCounter;

/// One phone bounding box reported by the object detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhoneDetection {
    /// Detector confidence in [0, 1]
    pub confidence: f64,
    /// Normalized `[x1, y1, x2, y2]`
    pub bbox: [f64; 4],
}

/// Smooths per-frame phone detections into a usage flag
///
/// A confident detection adds 2, a frame without one subtracts 1.
#[derive(Debug, Clone)]
pub struct PhoneUsageTracker {
    confidence_threshold: f64,
    counter: DecayCounter,
    last_confidence: f64,
}

impl Default for PhoneUsageTracker {
    fn default() -> Self {
        Self::new(0.35, 5)
    }
}

impl PhoneUsageTracker {
    pub fn new(confidence_threshold: f64, usage_frames: u32) -> Self {
        Self {
            confidence_threshold,
            counter: DecayCounter::new(2, 1, usage_frames),
            last_confidence: 0.0,
        }
    }

    /// Update with this frame's detections; returns whether a phone is in use
    pub fn update(&mut self, detections: &[PhoneDetection]) -> bool {
        let best = detections
            .iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
            .map(|d| d.confidence)
            .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));

        self.last_confidence = best.unwrap_or(0.0);
        self.counter.update(best.is_some())
    }

    pub fn is_in_use(&self) -> bool {
        self.counter.is_active()
    }

    /// Confidence of the best detection last frame, as a percentage
    pub fn confidence_percent(&self) -> f64 {
        self.last_confidence * 100.0
    }

    pub fn reset(&mut self) {
        self.counter.reset();
        self.last_confidence = 0.0;
    }
}
