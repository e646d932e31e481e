//! Frame sources

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{CameraConfig, CameraError, VideoFrame};

/// Anything that yields frames to the capture worker
///
/// `read_frame` may block up to one frame interval.
pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError>;

    /// Short label for logs
    fn name(&self) -> &str {
        "camera"
    }
}

/// Paced source producing blank frames at the configured rate
pub struct SyntheticSource {
    config: CameraConfig,
    started: Instant,
    next_due: Instant,
    sequence: u64,
    max_frames: Option<u64>,
    paced: bool,
}

impl SyntheticSource {
    pub fn new(config: CameraConfig) -> Self {
        info!(
            "Synthetic camera {}x{} @ {} fps",
            config.width, config.height, config.fps
        );
        let now = Instant::now();
        Self {
            config,
            started: now,
            next_due: now,
            sequence: 0,
            max_frames: None,
            paced: true,
        }
    }

    /// Stop with [`CameraError::Exhausted`] after `n` frames
    pub fn with_limit(mut self, n: u64) -> Self {
        self.max_frames = Some(n);
        self
    }

    /// Produce frames as fast as they are read
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    pub fn frames_produced(&self) -> u64 {
        self.sequence
    }
}

impl FrameSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.max_frames.is_some_and(|max| self.sequence >= max) {
            return Err(CameraError::Exhausted);
        }

        if self.paced {
            let now = Instant::now();
            if self.next_due > now {
                thread::sleep(self.next_due - now);
            }
            self.next_due = self.next_due.max(now) + self.config.frame_interval();
        }

        let timestamp_ns = self.started.elapsed().as_nanos() as u64;
        let frame = VideoFrame::solid(
            self.config.width,
            self.config.height,
            [96, 96, 96],
            timestamp_ns,
            self.sequence,
        );
        self.sequence += 1;
        Ok(frame)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}

/// Replays a fixed list of frames, optionally looping
pub struct ReplaySource {
    frames: VecDeque<VideoFrame>,
    looping: bool,
    interval: Option<Duration>,
}

impl ReplaySource {
    pub fn new(frames: impl IntoIterator<Item = VideoFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            looping: false,
            interval: None,
        }
    }

    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Sleep this long before every frame
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ReplaySource {
    fn read_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if let Some(interval) = self.interval {
            thread::sleep(interval);
        }
        let frame = self.frames.pop_front().ok_or(CameraError::Exhausted)?;
        if self.looping {
            self.frames.push_back(frame.clone());
        } else if self.frames.is_empty() {
            debug!("Replay source reached its last frame");
        }
        Ok(frame)
    }

    fn name(&self) -> &str {
        "replay"
    }
}
