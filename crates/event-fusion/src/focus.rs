//! Focus score aggregation

use std::fmt;

use dms::Emotion;
use serde::{Deserialize, Serialize};

use crate::FusionError;

/// Relative weight of each sub-score; zero disables a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusWeights {
    pub ear: f64,
    pub posture: f64,
    pub emotion: f64,
    pub gaze: f64,
    pub phone: f64,
}

impl Default for FocusWeights {
    fn default() -> Self {
        Self {
            ear: 0.30,
            posture: 0.25,
            emotion: 0.15,
            gaze: 0.20,
            phone: 0.10,
        }
    }
}

impl FocusWeights {
    /// Weights must be non-negative and sum to 1
    pub fn validate(&self) -> Result<(), FusionError> {
        let all = [self.ear, self.posture, self.emotion, self.gaze, self.phone];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(FusionError::InvalidWeights(format!("negative or non-finite weight in {:?}", self)));
        }
        let sum: f64 = all.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(FusionError::InvalidWeights(format!("weights sum to {:.4}, expected 1.0", sum)));
        }
        Ok(())
    }
}

/// Per-frame inputs to the focus score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusInputs {
    pub ear: f64,
    /// 0-100
    pub posture_score: f64,
    /// `None` when no usable emotion label was produced
    pub emotion: Option<Emotion>,
    /// Iris position, 0.5 = center
    pub gaze_ratio: f64,
    pub is_distracted: bool,
    pub phone_in_use: bool,
}

impl Default for FocusInputs {
    fn default() -> Self {
        Self {
            ear: 0.30,
            posture_score: 100.0,
            emotion: Some(Emotion::Neutral),
            gaze_ratio: 0.5,
            is_distracted: false,
            phone_in_use: false,
        }
    }
}

/// Coarse focus band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FocusLevel {
    Excellent,
    Good,
    Moderate,
    Low,
    Poor,
}

impl FocusLevel {
    pub fn from_score(score: f64) -> Self {
        match score {
            s if s >= 85.0 => FocusLevel::Excellent,
            s if s >= 70.0 => FocusLevel::Good,
            s if s >= 50.0 => FocusLevel::Moderate,
            s if s >= 30.0 => FocusLevel::Low,
            _ => FocusLevel::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusLevel::Excellent => "EXCELLENT",
            FocusLevel::Good => "GOOD",
            FocusLevel::Moderate => "MODERATE",
            FocusLevel::Low => "LOW",
            FocusLevel::Poor => "POOR",
        }
    }
}

impl fmt::Display for FocusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every sub-score behind one focus score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusBreakdown {
    pub ear_score: f64,
    pub posture_score: f64,
    pub emotion_score: f64,
    pub gaze_score: f64,
    pub phone_score: f64,
    pub weights: FocusWeights,
    pub score: f64,
    pub level: FocusLevel,
}

impl Default for FocusBreakdown {
    fn default() -> Self {
        FocusCalculator::default().breakdown(&FocusInputs::default())
    }
}

/// Weighted sum of normalized sub-scores
#[derive(Debug, Clone)]
pub struct FocusCalculator {
    weights: FocusWeights,
    unknown_emotion_score: f64,
}

impl Default for FocusCalculator {
    fn default() -> Self {
        Self {
            weights: FocusWeights::default(),
            unknown_emotion_score: 50.0,
        }
    }
}

impl FocusCalculator {
    pub fn new(weights: FocusWeights) -> Result<Self, FusionError> {
        weights.validate()?;
        Ok(Self {
            weights,
            ..Default::default()
        })
    }

    pub fn weights(&self) -> &FocusWeights {
        &self.weights
    }

    pub fn ear_score(ear: f64) -> f64 {
        if ear > 0.25 {
            100.0
        } else if ear > 0.20 {
            80.0
        } else if ear > 0.15 {
            50.0
        } else {
            20.0
        }
    }

    pub fn emotion_score(&self, emotion: Option<Emotion>) -> f64 {
        match emotion {
            Some(Emotion::Happy) => 100.0,
            Some(Emotion::Neutral) => 85.0,
            Some(Emotion::Surprise) => 75.0,
            Some(Emotion::Fear) => 60.0,
            Some(Emotion::Sad) => 45.0,
            Some(Emotion::Angry) => 30.0,
            Some(Emotion::Disgust) => 20.0,
            None => self.unknown_emotion_score,
        }
    }

    pub fn gaze_score(gaze_ratio: f64, is_distracted: bool) -> f64 {
        if is_distracted {
            return 20.0;
        }
        let offset = (gaze_ratio - 0.5).abs();
        if offset <= 0.15 {
            100.0
        } else if offset <= 0.25 {
            70.0
        } else {
            40.0
        }
    }

    pub fn phone_score(phone_in_use: bool) -> f64 {
        if phone_in_use {
            0.0
        } else {
            100.0
        }
    }

    pub fn breakdown(&self, inputs: &FocusInputs) -> FocusBreakdown {
        let sanitize = |v: f64| if v.is_finite() { v } else { 0.0 };

        let ear_score = Self::ear_score(inputs.ear);
        let posture_score = sanitize(inputs.posture_score);
        let emotion_score = self.emotion_score(inputs.emotion);
        let gaze_score = Self::gaze_score(inputs.gaze_ratio, inputs.is_distracted);
        let phone_score = Self::phone_score(inputs.phone_in_use);

        let w = &self.weights;
        let total = w.ear * ear_score
            + w.posture * posture_score
            + w.emotion * emotion_score
            + w.gaze * gaze_score
            + w.phone * phone_score;
        let score = (sanitize(total).clamp(0.0, 100.0) * 10.0).round() / 10.0;

        FocusBreakdown {
            ear_score,
            posture_score,
            emotion_score,
            gaze_score,
            phone_score,
            weights: *w,
            score,
            level: FocusLevel::from_score(score),
        }
    }

    /// Focus score in [0, 100]
    pub fn score(&self, inputs: &FocusInputs) -> f64 {
        self.breakdown(inputs).score
    }
}
