//! Emotion readings and blendshape mapping

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::DmsError;

/// Basic facial emotions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    #[default]
    Neutral,
    Surprise,
    Fear,
    Sad,
    Angry,
    Disgust,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Happy,
        Emotion::Neutral,
        Emotion::Surprise,
        Emotion::Fear,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Disgust,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Happy => "happy",
            Emotion::Neutral => "neutral",
            Emotion::Surprise => "surprise",
            Emotion::Fear => "fear",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Disgust => "disgust",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = DmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Emotion::ALL
            .into_iter()
            .find(|e| e.as_str() == lower)
            .ok_or_else(|| DmsError::UnknownEmotion(s.to_string()))
    }
}

/// Emotion label with confidence in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionReading {
    pub emotion: Emotion,
    /// 0-100
    pub confidence: f64,
}

impl Default for EmotionReading {
    fn default() -> Self {
        Self::neutral()
    }
}

impl EmotionReading {
    pub fn new(emotion: Emotion, confidence: f64) -> Self {
        Self {
            emotion,
            confidence: confidence.clamp(0.0, 100.0),
        }
    }

    /// Fallback used when nothing stands out
    pub fn neutral() -> Self {
        Self {
            emotion: Emotion::Neutral,
            confidence: 85.0,
        }
    }
}

/// Face blendshape coefficients keyed by name (e.g. `mouthSmileLeft`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Blendshapes(BTreeMap<String, f64>);

impl Blendshapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.0.insert(name.to_string(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn pair(&self, left: &str, right: &str) -> f64 {
        (self.get(left) + self.get(right)) / 2.0
    }
}

impl FromIterator<(String, f64)> for Blendshapes {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Heuristic mapping from blendshape activations to a basic emotion
#[derive(Debug, Clone)]
pub struct BlendshapeEmotionMapper {
    /// Activation below which the face counts as neutral
    pub neutral_threshold: f64,
    /// Minimum confidence (0-1) to report a non-neutral emotion
    pub emotion_threshold: f64,
}

impl Default for BlendshapeEmotionMapper {
    fn default() -> Self {
        Self {
            neutral_threshold: 0.20,
            emotion_threshold: 0.25,
        }
    }
}

impl BlendshapeEmotionMapper {
    /// Activation score per non-neutral emotion
    pub fn activations(&self, b: &Blendshapes) -> [(Emotion, f64); 6] {
        let smile = b.pair("mouthSmileLeft", "mouthSmileRight");
        let frown = b.pair("mouthFrownLeft", "mouthFrownRight");
        let eye_wide = b.pair("eyeWideLeft", "eyeWideRight");
        let brow_down = b.pair("browDownLeft", "browDownRight");
        let brow_outer_up = b.pair("browOuterUpLeft", "browOuterUpRight");
        let brow_inner_up = b.get("browInnerUp");
        let jaw_open = b.get("jawOpen");

        [
            (
                Emotion::Happy,
                smile * 0.8 + b.pair("cheekSquintLeft", "cheekSquintRight") * 0.2,
            ),
            (Emotion::Sad, frown * 0.6 + brow_inner_up * 0.4),
            (
                Emotion::Surprise,
                eye_wide * 0.4 + jaw_open * 0.3 + brow_outer_up * 0.3,
            ),
            (
                Emotion::Fear,
                eye_wide * 0.5 + brow_inner_up * 0.3 + b.pair("mouthStretchLeft", "mouthStretchRight") * 0.2,
            ),
            (
                Emotion::Angry,
                brow_down * 0.6
                    + b.pair("mouthPressLeft", "mouthPressRight") * 0.2
                    + b.pair("eyeSquintLeft", "eyeSquintRight") * 0.2,
            ),
            (
                Emotion::Disgust,
                b.pair("noseSneerLeft", "noseSneerRight") * 0.7
                    + b.pair("mouthUpperUpLeft", "mouthUpperUpRight") * 0.3,
            ),
        ]
    }

    /// Dominant emotion, neutral when nothing is clearly activated
    pub fn map(&self, blendshapes: &Blendshapes) -> EmotionReading {
        if blendshapes.is_empty() {
            return EmotionReading::neutral();
        }

        let Some((emotion, score)) = self
            .activations(blendshapes)
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return EmotionReading::neutral();
        };

        if score < self.neutral_threshold || score < self.emotion_threshold {
            return EmotionReading::neutral();
        }
        EmotionReading::new(emotion, (score * 100.0).min(100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotion_parse() {
        assert_eq!("Happy".parse::<Emotion>().unwrap(), Emotion::Happy);
        assert_eq!("disgust".parse::<Emotion>().unwrap(), Emotion::Disgust);
        assert!("contempt".parse::<Emotion>().is_err());
    }

    #[test]
    fn test_empty_blendshapes_are_neutral() {
        let mapper = BlendshapeEmotionMapper::default();
        assert_eq!(mapper.map(&Blendshapes::new()), EmotionReading::neutral());
    }

    #[test]
    fn test_smile_maps_to_happy() {
        let mapper = BlendshapeEmotionMapper::default();
        let smiling = Blendshapes::new()
            .with("mouthSmileLeft", 0.9)
            .with("mouthSmileRight", 0.8)
            .with("cheekSquintLeft", 0.5)
            .with("cheekSquintRight", 0.5);

        let reading = mapper.map(&smiling);
        assert_eq!(reading.emotion, Emotion::Happy);
        assert!((reading.confidence - 78.0).abs() < 1e-9);
    }

    #[test]
    fn test_weak_activation_falls_back_to_neutral() {
        let mapper = BlendshapeEmotionMapper::default();
        let faint = Blendshapes::new().with("browDownLeft", 0.3).with("browDownRight", 0.3);
        // angry = 0.3 * 0.6 = 0.18 < 0.20
        assert_eq!(mapper.map(&faint), EmotionReading::neutral());
    }

    #[test]
    fn test_surprise() {
        let mapper = BlendshapeEmotionMapper::default();
        let surprised = Blendshapes::new()
            .with("eyeWideLeft", 0.9)
            .with("eyeWideRight", 0.9)
            .with("jawOpen", 0.8)
            .with("browOuterUpLeft", 0.7)
            .with("browOuterUpRight", 0.7);
        assert_eq!(mapper.map(&surprised).emotion, Emotion::Surprise);
    }
}
