//! Temporal state tracking
//!
//! [`StreakCounter`] needs an unbroken run of qualifying frames.
//! [`DecayCounter`] tolerates occasional misses and drains gradually.

use serde::{Deserialize, Serialize};

/// Consecutive-frame counter that drops to zero on any miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakCounter {
    count: u32,
    threshold: u32,
}

impl StreakCounter {
    pub fn new(threshold: u32) -> Self {
        Self { count: 0, threshold }
    }

    /// Record one frame and report whether the condition is now active
    pub fn update(&mut self, qualifying: bool) -> bool {
        if qualifying {
            self.count = self.count.saturating_add(1);
        } else {
            self.count = 0;
        }
        self.is_active()
    }

    pub fn is_active(&self) -> bool {
        self.count >= self.threshold
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Asymmetric counter: rises by `increment`, drains by `decay`, floors at 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecayCounter {
    count: u32,
    increment: u32,
    decay: u32,
    threshold: u32,
}

impl DecayCounter {
    pub fn new(increment: u32, decay: u32, threshold: u32) -> Self {
        Self {
            count: 0,
            increment,
            decay,
            threshold,
        }
    }

    pub fn update(&mut self, qualifying: bool) -> bool {
        if qualifying {
            self.count = self.count.saturating_add(self.increment);
        } else {
            self.count = self.count.saturating_sub(self.decay);
        }
        self.is_active()
    }

    pub fn is_active(&self) -> bool {
        self.count >= self.threshold
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn decay(&self) -> u32 {
        self.decay
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// Per-condition counters held by the adaptive detector
#[derive(Debug, Clone)]
pub struct DetectorState {
    pub drowsy: StreakCounter,
    pub bad_posture: StreakCounter,
    pub head_down: StreakCounter,
    pub too_close: StreakCounter,
    pub too_far: StreakCounter,
    /// Consecutive frames without a detected face
    pub face_absent_frames: u32,
}

impl DetectorState {
    pub fn new(consecutive_frames: u32) -> Self {
        Self {
            drowsy: StreakCounter::new(consecutive_frames),
            bad_posture: StreakCounter::new(consecutive_frames),
            head_down: StreakCounter::new(consecutive_frames),
            too_close: StreakCounter::new(consecutive_frames),
            too_far: StreakCounter::new(consecutive_frames),
            face_absent_frames: 0,
        }
    }

    /// Reset state (on user change or recalibration)
    pub fn reset(&mut self) {
        self.drowsy.reset();
        self.bad_posture.reset();
        self.head_down.reset();
        self.too_close.reset();
        self.too_far.reset();
        self.face_absent_frames = 0;
    }
}
