//! Performance presets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How often each model runs, in frames
///
/// An interval of 1 runs every frame; 0 disables the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipIntervals {
    pub face: u32,
    pub pose: u32,
    pub blendshapes: u32,
    pub objects: u32,
    pub emotion: u32,
}

impl Default for SkipIntervals {
    fn default() -> Self {
        PerformancePreset::Balanced.settings().intervals
    }
}

impl SkipIntervals {
    /// Run every model every frame
    pub fn every_frame() -> Self {
        Self {
            face: 1,
            pose: 1,
            blendshapes: 1,
            objects: 1,
            emotion: 1,
        }
    }

    /// Whether a stage with `interval` runs on frame `index`
    pub fn is_due(interval: u32, index: u64) -> bool {
        interval != 0 && index % interval as u64 == 0
    }
}

/// Named speed / accuracy trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformancePreset {
    HighPerformance,
    #[default]
    Balanced,
    HighAccuracy,
    WebMvp,
    WebFull,
}

/// Everything a preset decides
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PresetSettings {
    pub camera_width: u32,
    pub camera_height: u32,
    pub camera_fps: u32,
    /// Longest side of the frame handed to the models
    pub processing_width: u32,
    pub processing_height: u32,
    pub intervals: SkipIntervals,
}

impl PerformancePreset {
    pub const ALL: [PerformancePreset; 5] = [
        PerformancePreset::HighPerformance,
        PerformancePreset::Balanced,
        PerformancePreset::HighAccuracy,
        PerformancePreset::WebMvp,
        PerformancePreset::WebFull,
    ];

    /// Lookup by name; unknown names fall back to `Balanced`
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformancePreset::HighPerformance => "high_performance",
            PerformancePreset::Balanced => "balanced",
            PerformancePreset::HighAccuracy => "high_accuracy",
            PerformancePreset::WebMvp => "web_mvp",
            PerformancePreset::WebFull => "web_full",
        }
    }

    pub fn settings(&self) -> PresetSettings {
        match self {
            PerformancePreset::HighPerformance => PresetSettings {
                camera_width: 320,
                camera_height: 240,
                camera_fps: 30,
                processing_width: 224,
                processing_height: 168,
                intervals: SkipIntervals {
                    face: 4,
                    pose: 0,
                    blendshapes: 0,
                    objects: 0,
                    emotion: 0,
                },
            },
            PerformancePreset::Balanced => PresetSettings {
                camera_width: 640,
                camera_height: 480,
                camera_fps: 30,
                processing_width: 256,
                processing_height: 192,
                intervals: SkipIntervals {
                    face: 3,
                    pose: 4,
                    blendshapes: 3,
                    objects: 10,
                    emotion: 30,
                },
            },
            PerformancePreset::HighAccuracy => PresetSettings {
                camera_width: 640,
                camera_height: 480,
                camera_fps: 30,
                processing_width: 480,
                processing_height: 360,
                intervals: SkipIntervals::every_frame(),
            },
            PerformancePreset::WebMvp => PresetSettings {
                camera_width: 640,
                camera_height: 480,
                camera_fps: 20,
                processing_width: 224,
                processing_height: 168,
                intervals: SkipIntervals {
                    face: 4,
                    pose: 0,
                    blendshapes: 0,
                    objects: 0,
                    emotion: 0,
                },
            },
            PerformancePreset::WebFull => PresetSettings {
                camera_width: 640,
                camera_height: 480,
                camera_fps: 20,
                processing_width: 256,
                processing_height: 192,
                intervals: SkipIntervals {
                    face: 3,
                    pose: 6,
                    blendshapes: 3,
                    objects: 10,
                    emotion: 30,
                },
            },
        }
    }
}

impl fmt::Display for PerformancePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerformancePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        PerformancePreset::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| format!("unknown performance preset: {}", s))
    }
}
