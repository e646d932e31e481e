//! Blink detection and rate estimation

use std::time::{Duration, Instant};

/// Counts debounced blinks from the eye aspect ratio
///
/// The count restarts after 10 s without a blink; the rate is
/// extrapolated to blinks per minute over that rolling window.
#[derive(Debug, Clone)]
pub struct BlinkTracker {
    ear_threshold: f64,
    debounce: Duration,
    window: Duration,
    last_blink: Instant,
    count: u32,
}

impl BlinkTracker {
    pub fn new(ear_threshold: f64, now: Instant) -> Self {
        Self {
            ear_threshold,
            debounce: Duration::from_millis(200),
            window: Duration::from_secs(10),
            last_blink: now,
            count: 0,
        }
    }

    /// Feed one EAR sample; returns true when a new blink was registered
    pub fn update(&mut self, ear: f64, now: Instant) -> bool {
        let mut blinked = false;
        if ear < self.ear_threshold && now.saturating_duration_since(self.last_blink) > self.debounce {
            self.count += 1;
            self.last_blink = now;
            blinked = true;
        }

        if now.saturating_duration_since(self.last_blink) > self.window {
            self.count = 0;
            self.last_blink = now;
        }
        blinked
    }

    /// Blinks in the current window, 0 once the window has lapsed
    pub fn count_last_10s(&self, now: Instant) -> u32 {
        if now.saturating_duration_since(self.last_blink) > self.window {
            return 0;
        }
        self.count
    }

    /// Blinks per minute
    pub fn rate_per_minute(&self, now: Instant) -> f64 {
        let elapsed = (now.saturating_duration_since(self.last_blink) + self.window).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.count as f64 / elapsed * 60.0
    }

    pub fn reset(&mut self, now: Instant) {
        self.count = 0;
        self.last_blink = now;
    }
}
