//! Capture and inference worker threads

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use calibration::UserBaselineProfile;
use camera_capture::{CameraError, FrameSource, VideoFrame};
use inference_engine::{InferenceBackend, InferenceScheduler};
use ring_buffer::{DropOldestQueue, LatestSlot};
use tracing::{debug, error, info, warn};

use crate::analyzer::{FrameAnalyzer, FrameReport};
use crate::fps::{FpsMeter, SharedFps};
use crate::{
    PipelineError, METRIC_CAPTURE_FPS, METRIC_FOCUS_SCORE, METRIC_FRAMES_CAPTURED,
    METRIC_FRAMES_DROPPED, METRIC_FRAMES_PROCESSED, METRIC_INFERENCE_ERRORS, METRIC_INFERENCE_FPS,
};

/// Frames travel between workers behind an `Arc` so the latest-frame slot
/// and the queue share one buffer
pub type FrameQueue = DropOldestQueue<Arc<VideoFrame>>;

/// Worker lifecycle; a stopped worker cannot be started again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Stopped,
}

/// Requests handled by the inference worker between frames
#[derive(Debug, Clone)]
pub enum ControlMessage {
    StartCalibration,
    LoadProfile(Box<UserBaselineProfile>),
    ResetDetectors,
}

/// Thread handle plus cooperative stop flag
struct WorkerHandle {
    name: &'static str,
    state: WorkerState,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            state: WorkerState::Created,
            shutdown: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }

    fn ensure_startable(&self) -> Result<(), PipelineError> {
        if self.state != WorkerState::Created {
            return Err(PipelineError::InvalidState {
                worker: self.name,
                state: self.state,
            });
        }
        Ok(())
    }

    fn spawn<F>(&mut self, body: F) -> Result<(), PipelineError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.ensure_startable()?;
        let handle = thread::Builder::new()
            .name(self.name.to_string())
            .spawn(body)?;
        self.thread = Some(handle);
        self.state = WorkerState::Running;
        info!("{} worker started", self.name);
        Ok(())
    }

    fn stop(&mut self) {
        if self.state == WorkerState::Stopped {
            return;
        }
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                error!("{} worker thread panicked", self.name);
            }
        }
        self.state = WorkerState::Stopped;
        info!("{} worker stopped", self.name);
    }

    fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }
}

/// Reads frames from a [`FrameSource`] and publishes them without ever blocking
pub struct CaptureWorker<S> {
    source: Option<S>,
    frames: Arc<FrameQueue>,
    latest: Arc<LatestSlot<Arc<VideoFrame>>>,
    fps: SharedFps,
    backoff: Duration,
    mirror: bool,
    handle: WorkerHandle,
}

impl<S> CaptureWorker<S> {
    pub fn state(&self) -> WorkerState {
        self.handle.state
    }

    /// Queue the inference worker consumes
    pub fn frames(&self) -> Arc<FrameQueue> {
        Arc::clone(&self.frames)
    }

    pub fn latest(&self) -> Arc<LatestSlot<Arc<VideoFrame>>> {
        Arc::clone(&self.latest)
    }

    pub fn fps(&self) -> f64 {
        self.fps.get()
    }

    /// True once the thread has exited on its own (or was never started)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the thread and wait for it
    pub fn stop(&mut self) {
        self.handle.stop();
    }
}

impl<S: FrameSource + 'static> CaptureWorker<S> {
    pub fn new(source: S, queue_capacity: usize) -> Result<Self, PipelineError> {
        Ok(Self {
            source: Some(source),
            frames: Arc::new(DropOldestQueue::new(queue_capacity)?),
            latest: Arc::new(LatestSlot::new()),
            fps: SharedFps::default(),
            backoff: Duration::from_millis(50),
            mirror: false,
            handle: WorkerHandle::new("capture"),
        })
    }

    /// Pause after a failed read
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Flip frames horizontally before publishing
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.handle.ensure_startable()?;
        let source = self.source.take().ok_or(PipelineError::InvalidState {
            worker: self.handle.name,
            state: self.handle.state,
        })?;

        let ctx = CaptureLoop {
            frames: Arc::clone(&self.frames),
            latest: Arc::clone(&self.latest),
            fps: self.fps.clone(),
            backoff: self.backoff,
            mirror: self.mirror,
            shutdown: Arc::clone(&self.handle.shutdown),
        };
        self.handle.spawn(move || ctx.run(source))
    }
}

impl<S> Drop for CaptureWorker<S> {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

struct CaptureLoop {
    frames: Arc<FrameQueue>,
    latest: Arc<LatestSlot<Arc<VideoFrame>>>,
    fps: SharedFps,
    backoff: Duration,
    mirror: bool,
    shutdown: Arc<AtomicBool>,
}

impl CaptureLoop {
    fn run<S: FrameSource>(self, mut source: S) {
        debug!("Capturing from {}", source.name());
        let mut meter = FpsMeter::new(Instant::now());

        while !self.shutdown.load(Ordering::SeqCst) {
            let frame = match source.read_frame() {
                Ok(frame) => frame,
                Err(CameraError::Exhausted) => {
                    info!("Frame source {} exhausted", source.name());
                    break;
                }
                Err(e) => {
                    warn!("Capture error: {}", e);
                    thread::sleep(self.backoff);
                    continue;
                }
            };

            let frame = if self.mirror {
                match frame.mirrored() {
                    Ok(flipped) => flipped,
                    Err(e) => {
                        warn!("Mirror failed, publishing unflipped frame: {}", e);
                        frame
                    }
                }
            } else {
                frame
            };
            let frame = Arc::new(frame);

            if let Err(e) = self.latest.store(Arc::clone(&frame)) {
                warn!("Latest frame slot unavailable: {}", e);
            }
            match self.frames.push(frame) {
                Ok(Some(evicted)) => {
                    metrics::counter!(METRIC_FRAMES_DROPPED).increment(1);
                    debug!("Dropped frame {}", evicted.sequence);
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Frame queue unusable, stopping capture: {}", e);
                    break;
                }
            }
            metrics::counter!(METRIC_FRAMES_CAPTURED).increment(1);

            if let Some(fps) = meter.tick(Instant::now()) {
                self.fps.set(fps);
                metrics::gauge!(METRIC_CAPTURE_FPS).set(fps);
            }
        }
    }
}

/// Runs inference and analysis on queued frames
pub struct InferenceWorker<B: InferenceBackend> {
    core: Option<(InferenceScheduler<B>, FrameAnalyzer)>,
    frames: Arc<FrameQueue>,
    results: Arc<DropOldestQueue<FrameReport>>,
    latest: Arc<LatestSlot<FrameReport>>,
    profiles: Arc<LatestSlot<UserBaselineProfile>>,
    control_tx: Sender<ControlMessage>,
    control_rx: Option<Receiver<ControlMessage>>,
    fps: SharedFps,
    poll_timeout: Duration,
    handle: WorkerHandle,
}

impl<B: InferenceBackend> InferenceWorker<B> {
    pub fn state(&self) -> WorkerState {
        self.handle.state
    }

    /// Output queue of frame reports
    pub fn results(&self) -> Arc<DropOldestQueue<FrameReport>> {
        Arc::clone(&self.results)
    }

    pub fn latest(&self) -> Arc<LatestSlot<FrameReport>> {
        Arc::clone(&self.latest)
    }

    /// Profiles produced by successful calibrations
    pub fn profiles(&self) -> Arc<LatestSlot<UserBaselineProfile>> {
        Arc::clone(&self.profiles)
    }

    pub fn fps(&self) -> f64 {
        self.fps.get()
    }

    /// Queue a control message; handled before the next frame
    pub fn send(&self, message: ControlMessage) -> Result<(), PipelineError> {
        self.control_tx
            .send(message)
            .map_err(|_| PipelineError::ControlChannelClosed)
    }

    pub fn stop(&mut self) {
        self.handle.stop();
    }
}

impl<B: InferenceBackend + 'static> InferenceWorker<B> {
    pub fn new(
        scheduler: InferenceScheduler<B>,
        analyzer: FrameAnalyzer,
        frames: Arc<FrameQueue>,
        result_capacity: usize,
    ) -> Result<Self, PipelineError> {
        let (control_tx, control_rx) = mpsc::channel();
        Ok(Self {
            core: Some((scheduler, analyzer)),
            frames,
            results: Arc::new(DropOldestQueue::new(result_capacity)?),
            latest: Arc::new(LatestSlot::new()),
            profiles: Arc::new(LatestSlot::new()),
            control_tx,
            control_rx: Some(control_rx),
            fps: SharedFps::default(),
            poll_timeout: Duration::from_millis(100),
            handle: WorkerHandle::new("inference"),
        })
    }

    /// Longest wait for a frame before checking the stop flag again
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.handle.ensure_startable()?;
        let invalid = PipelineError::InvalidState {
            worker: self.handle.name,
            state: self.handle.state,
        };
        let (Some((scheduler, analyzer)), Some(control)) =
            (self.core.take(), self.control_rx.take())
        else {
            return Err(invalid);
        };

        let ctx = InferenceLoop {
            scheduler,
            analyzer,
            control,
            frames: Arc::clone(&self.frames),
            results: Arc::clone(&self.results),
            latest: Arc::clone(&self.latest),
            profiles: Arc::clone(&self.profiles),
            fps: self.fps.clone(),
            poll_timeout: self.poll_timeout,
            shutdown: Arc::clone(&self.handle.shutdown),
        };
        self.handle.spawn(move || ctx.run())
    }
}

impl<B: InferenceBackend> Drop for InferenceWorker<B> {
    fn drop(&mut self) {
        self.handle.stop();
    }
}

struct InferenceLoop<B: InferenceBackend> {
    scheduler: InferenceScheduler<B>,
    analyzer: FrameAnalyzer,
    control: Receiver<ControlMessage>,
    frames: Arc<FrameQueue>,
    results: Arc<DropOldestQueue<FrameReport>>,
    latest: Arc<LatestSlot<FrameReport>>,
    profiles: Arc<LatestSlot<UserBaselineProfile>>,
    fps: SharedFps,
    poll_timeout: Duration,
    shutdown: Arc<AtomicBool>,
}

impl<B: InferenceBackend> InferenceLoop<B> {
    fn drain_control(&mut self) {
        loop {
            match self.control.try_recv() {
                Ok(message) => {
                    debug!("Control message: {:?}", message);
                    self.analyzer.handle_control(message, Instant::now());
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn run(mut self) {
        debug!("Inference backend: {}", self.scheduler.backend().name());
        let mut meter = FpsMeter::new(Instant::now());

        while !self.shutdown.load(Ordering::SeqCst) {
            self.drain_control();

            let frame = match self.frames.pop_timeout(self.poll_timeout) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(e) => {
                    error!("Frame queue unusable, stopping inference: {}", e);
                    break;
                }
            };

            let output = self.scheduler.process(&frame);
            if output.errors > 0 {
                metrics::counter!(METRIC_INFERENCE_ERRORS).increment(u64::from(output.errors));
            }
            let report = self.analyzer.analyze(&output, Instant::now());

            if let Some(profile) = self.analyzer.take_completed_profile() {
                info!("Calibration complete for '{}'", profile.user_id);
                if let Err(e) = self.profiles.store(profile) {
                    warn!("Profile slot unavailable: {}", e);
                }
            }

            metrics::counter!(METRIC_FRAMES_PROCESSED).increment(1);
            metrics::gauge!(METRIC_FOCUS_SCORE).set(report.focus.score);
            if let Some(fps) = meter.tick(Instant::now()) {
                self.fps.set(fps);
                metrics::gauge!(METRIC_INFERENCE_FPS).set(fps);
            }

            if let Err(e) = self.latest.store(report.clone()) {
                warn!("Latest result slot unavailable: {}", e);
            }
            if let Err(e) = self.results.push(report) {
                error!("Result queue unusable, stopping inference: {}", e);
                break;
            }
        }
    }
}
