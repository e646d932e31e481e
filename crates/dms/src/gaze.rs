//! Gaze direction tracking

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::StreakCounter;

/// Coarse horizontal gaze direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GazeDirection {
    Left,
    #[default]
    Center,
    Right,
}

impl GazeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            GazeDirection::Left => "LEFT",
            GazeDirection::Center => "CENTER",
            GazeDirection::Right => "RIGHT",
        }
    }
}

impl fmt::Display for GazeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gaze state for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeReading {
    /// Iris position, 0.5 = center
    pub ratio: f64,
    pub direction: GazeDirection,
    /// Looking away for `distraction_frames` consecutive frames
    pub is_distracted: bool,
}

impl Default for GazeReading {
    fn default() -> Self {
        Self {
            ratio: 0.5,
            direction: GazeDirection::Center,
            is_distracted: false,
        }
    }
}

/// Classifies gaze ratio and tracks sustained looking-away
#[derive(Debug, Clone)]
pub struct GazeTracker {
    left_threshold: f64,
    right_threshold: f64,
    away: StreakCounter,
    last: GazeReading,
}

impl Default for GazeTracker {
    fn default() -> Self {
        Self::new(0.35, 0.65, 30)
    }
}

impl GazeTracker {
    pub fn new(left_threshold: f64, right_threshold: f64, distraction_frames: u32) -> Self {
        Self {
            left_threshold,
            right_threshold,
            away: StreakCounter::new(distraction_frames),
            last: GazeReading::default(),
        }
    }

    pub fn classify(&self, ratio: f64) -> GazeDirection {
        if ratio < self.left_threshold {
            GazeDirection::Left
        } else if ratio > self.right_threshold {
            GazeDirection::Right
        } else {
            GazeDirection::Center
        }
    }

    /// Update with this frame's gaze ratio; `None` when no face was found
    pub fn update(&mut self, ratio: Option<f64>) -> GazeReading {
        let Some(ratio) = ratio else {
            // No face: hold center without accumulating distraction
            self.away.reset();
            self.last = GazeReading::default();
            return self.last;
        };

        let direction = self.classify(ratio);
        let is_distracted = self.away.update(direction != GazeDirection::Center);
        self.last = GazeReading {
            ratio,
            direction,
            is_distracted,
        };
        self.last
    }

    pub fn last(&self) -> GazeReading {
        self.last
    }

    pub fn reset(&mut self) {
        self.away.reset();
        self.last = GazeReading::default();
    }
}
