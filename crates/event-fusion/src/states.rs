//! Composite behavioral states
//!
//! Each detector votes over several weak indicators per frame. A frame that
//! wins the vote bumps a [`DecayCounter`]; a frame that loses drains it
//! faster than it rose, so the state needs sustained evidence to appear
//! and fades when the evidence stops.

use std::fmt;
use std::time::Instant;

use dms::{DecayCounter, Emotion, EmotionReading, GazeDirection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::BlinkTracker;

/// Fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// EAR below which a blink is registered
    pub blink_ear_threshold: f64,

    /// Boredom: votes needed (of 4), counter decay, frames to trigger
    pub boredom_votes: usize,
    pub boredom_decay: u32,
    pub boredom_frames: u32,

    /// Dazed: votes needed (of 4), counter decay, frames to trigger
    pub dazed_votes: usize,
    pub dazed_decay: u32,
    pub dazed_frames: u32,

    /// Severe distraction: votes needed (of 5), counter decay, frames to trigger
    pub distraction_votes: usize,
    pub distraction_decay: u32,
    pub distraction_frames: u32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            blink_ear_threshold: 0.21,
            boredom_votes: 3,
            boredom_decay: 2,
            boredom_frames: 90,
            dazed_votes: 3,
            dazed_decay: 2,
            dazed_frames: 60,
            distraction_votes: 2,
            distraction_decay: 3,
            distraction_frames: 120,
        }
    }
}

/// Everything the fusion step looks at for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionInputs {
    pub ear: f64,
    pub emotion: EmotionReading,
    pub head_pitch: f64,
    pub head_roll: f64,
    pub head_yaw: f64,
    pub gaze: GazeDirection,
    pub phone_in_use: bool,
    pub posture_score: f64,
}

impl Default for FusionInputs {
    fn default() -> Self {
        Self {
            ear: 0.30,
            emotion: EmotionReading::neutral(),
            head_pitch: 0.0,
            head_roll: 0.0,
            head_yaw: 0.0,
            gaze: GazeDirection::Center,
            phone_in_use: false,
            posture_score: 100.0,
        }
    }
}

fn votes(indicators: &[bool]) -> usize {
    indicators.iter().filter(|&&v| v).count()
}

/// Boredom: low-affect emotion, head away, gaze away, sparse blinking
#[derive(Debug, Clone)]
pub struct BoredomDetector {
    required_votes: usize,
    counter: DecayCounter,
}

impl BoredomDetector {
    pub fn new(required_votes: usize, decay: u32, frames: u32) -> Self {
        Self {
            required_votes,
            counter: DecayCounter::new(1, decay, frames),
        }
    }

    /// Indicator votes for this frame
    pub fn indicators(inputs: &FusionInputs, blink_rate: f64) -> [bool; 4] {
        let low_affect = matches!(
            inputs.emotion.emotion,
            Emotion::Sad | Emotion::Fear | Emotion::Neutral
        ) && inputs.emotion.confidence > 60.0;
        let head_away = inputs.head_pitch > 15.0 || inputs.head_yaw.abs() > 25.0;
        let gaze_away = inputs.gaze != GazeDirection::Center;
        let low_blink = blink_rate < 10.0;
        [low_affect, head_away, gaze_away, low_blink]
    }

    pub fn update(&mut self, inputs: &FusionInputs, blink_rate: f64) -> bool {
        let won = votes(&Self::indicators(inputs, blink_rate)) >= self.required_votes;
        self.counter.update(won)
    }

    pub fn counter(&self) -> u32 {
        self.counter.count()
    }

    pub fn is_active(&self) -> bool {
        self.counter.is_active()
    }

    pub fn reset(&mut self) {
        self.counter.reset();
    }
}

/// Dazed: half-closed eyes, blank stare, tilted head, neutral fixation
#[derive(Debug, Clone)]
pub struct DazedDetector {
    required_votes: usize,
    counter: DecayCounter,
}

impl DazedDetector {
    pub fn new(required_votes: usize, decay: u32, frames: u32) -> Self {
        Self {
            required_votes,
            counter: DecayCounter::new(1, decay, frames),
        }
    }

    pub fn indicators(inputs: &FusionInputs, blinks_last_10s: u32) -> [bool; 4] {
        let heavy_eyes = inputs.ear > 0.18 && inputs.ear < 0.25;
        let blank_stare = blinks_last_10s < 3;
        let head_tilted = inputs.head_pitch.abs() > 10.0 || inputs.head_roll.abs() > 8.0;
        let unfocused = inputs.gaze == GazeDirection::Center && inputs.emotion.emotion == Emotion::Neutral;
        [heavy_eyes, blank_stare, head_tilted, unfocused]
    }

    pub fn update(&mut self, inputs: &FusionInputs, blinks_last_10s: u32) -> bool {
        let won = votes(&Self::indicators(inputs, blinks_last_10s)) >= self.required_votes;
        self.counter.update(won)
    }

    pub fn counter(&self) -> u32 {
        self.counter.count()
    }

    pub fn is_active(&self) -> bool {
        self.counter.is_active()
    }

    pub fn reset(&mut self) {
        self.counter.reset();
    }
}

/// Severe distraction: gaze away, head turned, aroused emotion, phone, slumping
#[derive(Debug, Clone)]
pub struct DistractionDetector {
    required_votes: usize,
    counter: DecayCounter,
}

impl DistractionDetector {
    pub fn new(required_votes: usize, decay: u32, frames: u32) -> Self {
        Self {
            required_votes,
            counter: DecayCounter::new(1, decay, frames),
        }
    }

    pub fn indicators(inputs: &FusionInputs) -> [bool; 5] {
        let gaze_away = inputs.gaze != GazeDirection::Center;
        let head_turned = inputs.head_yaw.abs() > 30.0;
        let aroused = matches!(
            inputs.emotion.emotion,
            Emotion::Surprise | Emotion::Happy | Emotion::Angry
        );
        let slumped = inputs.posture_score < 40.0;
        [gaze_away, head_turned, aroused, inputs.phone_in_use, slumped]
    }

    pub fn update(&mut self, inputs: &FusionInputs) -> bool {
        let won = votes(&Self::indicators(inputs)) >= self.required_votes;
        self.counter.update(won)
    }

    pub fn counter(&self) -> u32 {
        self.counter.count()
    }

    pub fn is_active(&self) -> bool {
        self.counter.is_active()
    }

    pub fn reset(&mut self) {
        self.counter.reset();
    }
}

/// Single state reported to the user, highest priority wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DominantState {
    #[default]
    Normal,
    Distracted,
    Bored,
    Dazed,
}

impl DominantState {
    /// Priority: dazed > bored > distracted > normal
    pub fn resolve(is_dazed: bool, is_bored: bool, is_distracted: bool) -> Self {
        if is_dazed {
            DominantState::Dazed
        } else if is_bored {
            DominantState::Bored
        } else if is_distracted {
            DominantState::Distracted
        } else {
            DominantState::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DominantState::Normal => "normal",
            DominantState::Distracted => "distracted",
            DominantState::Bored => "bored",
            DominantState::Dazed => "dazed",
        }
    }

    pub fn warning_message(&self) -> &'static str {
        match self {
            DominantState::Dazed => "DAZED - take a short break",
            DominantState::Bored => "BORED - try switching activity",
            DominantState::Distracted => "SEVERELY DISTRACTED",
            DominantState::Normal => "",
        }
    }
}

impl fmt::Display for DominantState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fusion output for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FusionOutcome {
    pub is_bored: bool,
    pub is_dazed: bool,
    pub is_severely_distracted: bool,
    /// Blinks per minute
    pub blink_rate: f64,
    pub blink_count_10s: u32,
    pub dominant: DominantState,
    pub boredom_counter: u32,
    pub dazed_counter: u32,
    pub distraction_counter: u32,
}

impl FusionOutcome {
    pub fn warning_message(&self) -> &'static str {
        self.dominant.warning_message()
    }
}

/// Runs blink tracking and all three state detectors
#[derive(Debug, Clone)]
pub struct StateFusion {
    blinks: BlinkTracker,
    boredom: BoredomDetector,
    dazed: DazedDetector,
    distraction: DistractionDetector,
}

impl StateFusion {
    pub fn new(config: &FusionConfig, now: Instant) -> Self {
        Self {
            blinks: BlinkTracker::new(config.blink_ear_threshold, now),
            boredom: BoredomDetector::new(config.boredom_votes, config.boredom_decay, config.boredom_frames),
            dazed: DazedDetector::new(config.dazed_votes, config.dazed_decay, config.dazed_frames),
            distraction: DistractionDetector::new(
                config.distraction_votes,
                config.distraction_decay,
                config.distraction_frames,
            ),
        }
    }

    /// Process one frame
    pub fn process(&mut self, inputs: &FusionInputs, now: Instant) -> FusionOutcome {
        self.blinks.update(inputs.ear, now);
        let blink_rate = self.blinks.rate_per_minute(now);
        let blink_count_10s = self.blinks.count_last_10s(now);

        let is_bored = self.boredom.update(inputs, blink_rate);
        let is_dazed = self.dazed.update(inputs, blink_count_10s);
        let is_severely_distracted = self.distraction.update(inputs);
        let dominant = DominantState::resolve(is_dazed, is_bored, is_severely_distracted);

        debug!(
            "fusion: bored={} dazed={} distracted={} blink_rate={:.1}",
            self.boredom.counter(),
            self.dazed.counter(),
            self.distraction.counter(),
            blink_rate
        );

        FusionOutcome {
            is_bored,
            is_dazed,
            is_severely_distracted,
            blink_rate: (blink_rate * 10.0).round() / 10.0,
            blink_count_10s,
            dominant,
            boredom_counter: self.boredom.counter(),
            dazed_counter: self.dazed.counter(),
            distraction_counter: self.distraction.counter(),
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.blinks.reset(now);
        self.boredom.reset();
        self.dazed.reset();
        self.distraction.reset();
    }
}
