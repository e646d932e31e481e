//! Frame-skip scheduler with result caching

use camera_capture::VideoFrame;
use dms::{Blendshapes, EmotionReading, FaceLandmarks, PhoneDetection, PoseLandmarks};
use tracing::{debug, info, warn};

use crate::backend::InferenceBackend;
use crate::preset::{PerformancePreset, SkipIntervals};
use crate::InferenceError;

/// Which models actually ran for a frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StagesRun {
    pub face: bool,
    pub blendshapes: bool,
    pub pose: bool,
    pub objects: bool,
    pub emotion: bool,
}

/// Inference results for one frame, fresh or cached
#[derive(Debug, Clone, Default)]
pub struct InferenceOutput {
    pub frame_index: u64,
    pub timestamp_ms: u64,
    pub face: Option<FaceLandmarks>,
    pub blendshapes: Option<Blendshapes>,
    pub pose: Option<PoseLandmarks>,
    pub phones: Vec<PhoneDetection>,
    pub emotion: Option<EmotionReading>,
    pub stages: StagesRun,
    /// Backend failures swallowed on this frame
    pub errors: u32,
}

#[derive(Debug, Default)]
struct Cache {
    face: Option<FaceLandmarks>,
    blendshapes: Option<Blendshapes>,
    pose: Option<PoseLandmarks>,
    phones: Vec<PhoneDetection>,
    emotion: Option<EmotionReading>,
}

/// Gates each model by its own interval and reuses the last output between runs
///
/// Backend errors never escape: the failing stage reports no data for the
/// frame and its cache is cleared, so later skipped frames stay empty
/// until the next successful run.
pub struct InferenceScheduler<B: InferenceBackend> {
    backend: B,
    intervals: SkipIntervals,
    processing_max_side: u32,
    frame_index: u64,
    last_timestamp_ms: Option<u64>,
    cache: Cache,
    total_errors: u64,
}

impl<B: InferenceBackend> InferenceScheduler<B> {
    pub fn new(backend: B, intervals: SkipIntervals) -> Self {
        info!(
            "Inference scheduler for {}: face 1/{}, pose 1/{}, blendshapes 1/{}, objects 1/{}, emotion 1/{}",
            backend.name(),
            intervals.face,
            intervals.pose,
            intervals.blendshapes,
            intervals.objects,
            intervals.emotion
        );
        Self {
            backend,
            intervals,
            processing_max_side: 0,
            frame_index: 0,
            last_timestamp_ms: None,
            cache: Cache::default(),
            total_errors: 0,
        }
    }

    pub fn from_preset(backend: B, preset: PerformancePreset) -> Self {
        let settings = preset.settings();
        Self::new(backend, settings.intervals)
            .with_processing_size(settings.processing_width.max(settings.processing_height))
    }

    /// Downscale frames so the longer side is at most `max_side` before inference (0 = off)
    pub fn with_processing_size(mut self, max_side: u32) -> Self {
        self.processing_max_side = max_side;
        self
    }

    pub fn intervals(&self) -> &SkipIntervals {
        &self.intervals
    }

    pub fn frames_seen(&self) -> u64 {
        self.frame_index
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Forget cached outputs; the frame counter keeps running
    pub fn clear_cache(&mut self) {
        self.cache = Cache::default();
    }

    fn next_timestamp(&mut self, frame: &VideoFrame) -> u64 {
        let ts = match self.last_timestamp_ms {
            Some(last) if frame.timestamp_ms() <= last => last + 1,
            _ => frame.timestamp_ms(),
        };
        self.last_timestamp_ms = Some(ts);
        ts
    }

    fn record_error(&mut self, stage: &str, err: &InferenceError, out: &mut InferenceOutput) {
        warn!("{} inference failed on frame {}: {}", stage, out.frame_index, err);
        out.errors += 1;
        self.total_errors += 1;
    }

    /// Run whichever models are due for this frame
    pub fn process(&mut self, frame: &VideoFrame) -> InferenceOutput {
        let index = self.frame_index;
        self.frame_index += 1;
        let timestamp_ms = self.next_timestamp(frame);

        let mut out = InferenceOutput {
            frame_index: index,
            timestamp_ms,
            ..Default::default()
        };

        let scaled;
        let input = if self.processing_max_side > 0 {
            match frame.downscale(self.processing_max_side) {
                Ok(f) => {
                    scaled = f;
                    &scaled
                }
                Err(e) => {
                    let err = InferenceError::InvalidFrame(e.to_string());
                    self.record_error("preprocess", &err, &mut out);
                    self.clear_cache();
                    return out;
                }
            }
        } else {
            frame
        };

        let blendshapes_due = SkipIntervals::is_due(self.intervals.blendshapes, index);
        if SkipIntervals::is_due(self.intervals.face, index) || blendshapes_due {
            out.stages.face = true;
            out.stages.blendshapes = blendshapes_due;
            match self.backend.detect_face(input, timestamp_ms, blendshapes_due) {
                Ok(Some(obs)) => {
                    self.cache.face = Some(obs.landmarks);
                    if blendshapes_due {
                        self.cache.blendshapes = obs.blendshapes;
                    }
                }
                Ok(None) => {
                    self.cache.face = None;
                    self.cache.blendshapes = None;
                }
                Err(e) => {
                    self.record_error("face", &e, &mut out);
                    self.cache.face = None;
                    self.cache.blendshapes = None;
                }
            }
        }

        if SkipIntervals::is_due(self.intervals.pose, index) {
            out.stages.pose = true;
            match self.backend.detect_pose(input, timestamp_ms) {
                Ok(pose) => self.cache.pose = pose,
                Err(e) => {
                    self.record_error("pose", &e, &mut out);
                    self.cache.pose = None;
                }
            }
        }

        if SkipIntervals::is_due(self.intervals.objects, index) {
            out.stages.objects = true;
            match self.backend.detect_objects(input, timestamp_ms) {
                Ok(objects) => {
                    self.cache.phones = objects.iter().filter_map(|o| o.to_phone()).collect();
                }
                Err(e) => {
                    self.record_error("object", &e, &mut out);
                    self.cache.phones.clear();
                }
            }
        }

        if SkipIntervals::is_due(self.intervals.emotion, index) {
            out.stages.emotion = true;
            match self.backend.classify_emotion(input, timestamp_ms) {
                Ok(emotion) => self.cache.emotion = emotion,
                Err(e) => {
                    self.record_error("emotion", &e, &mut out);
                    self.cache.emotion = None;
                }
            }
        }

        out.face = self.cache.face.clone();
        out.blendshapes = self.cache.blendshapes.clone();
        out.pose = self.cache.pose.clone();
        out.phones = self.cache.phones.clone();
        out.emotion = self.cache.emotion;

        debug!(
            "Frame {} stages {:?} face={} pose={}",
            index,
            out.stages,
            out.face.is_some(),
            out.pose.is_some()
        );
        out
    }
}
