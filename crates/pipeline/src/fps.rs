//! Frame-rate estimation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trailing one-second frame counter
#[derive(Debug, Clone)]
pub struct FpsMeter {
    window: Duration,
    window_start: Instant,
    frames: u32,
    fps: f64,
}

impl FpsMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            window: Duration::from_secs(1),
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Count one frame; returns the new estimate when a window closes
    pub fn tick(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window {
            return None;
        }
        self.fps = self.frames as f64 / elapsed.as_secs_f64();
        self.frames = 0;
        self.window_start = now;
        Some(self.fps)
    }

    /// Last completed estimate
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

/// Frame rate published by a worker thread
#[derive(Debug, Clone, Default)]
pub struct SharedFps(Arc<AtomicU64>);

impl SharedFps {
    pub fn set(&self, fps: f64) {
        self.0.store(fps.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}
