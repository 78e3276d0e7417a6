use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::detection::domain::face_detector::{DetectionParams, FaceDetector};
use crate::estimation::domain::age_gender_predictor::{AgeGenderPredictor, FaceBatch};
use crate::estimation::domain::face_extractor::FaceExtractor;
use crate::estimation::domain::prediction_smoother::{PredictionSmoother, SmoothedLabel};
use crate::pipeline::loop_config::LoopConfig;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::rendering::overlay;
use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::shared::geometry::BoundingBox;
use crate::video::domain::frame_display::FrameDisplay;
use crate::video::domain::frame_source::{Capture, FrameSource};

/// Stage the loop is currently in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Capturing,
    Detecting,
    Extracting,
    Predicting,
    Smoothing,
    Rendering,
    Terminated,
}

/// Counters reported when the loop stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub cycles: usize,
    pub frames_with_faces: usize,
    /// Number of distinct capture stalls, not retry attempts.
    pub stalls: usize,
}

/// External collaborators driven by the loop.
pub struct LoopDevices {
    pub source: Box<dyn FrameSource>,
    pub display: Box<dyn FrameDisplay>,
    pub detector: Box<dyn FaceDetector>,
    pub predictor: Box<dyn AgeGenderPredictor>,
}

/// Runs capture → detect → extract → predict → smooth → render until
/// Escape is pressed or the cancellation flag is raised.
///
/// Per-cycle failures are logged and contained; the only way out of the
/// loop is termination. The capture source is released exactly once,
/// either when `run` finishes or when the orchestrator is dropped.
pub struct FrameOrchestrator {
    devices: LoopDevices,
    extractor: FaceExtractor,
    smoother: PredictionSmoother,
    logger: Box<dyn PipelineLogger>,
    config: LoopConfig,
    params: DetectionParams,
    cancelled: Arc<AtomicBool>,
    state: LoopState,
    last_labels: Vec<SmoothedLabel>,
    summary: LoopSummary,
    released: bool,
}

impl FrameOrchestrator {
    pub fn new(
        config: LoopConfig,
        devices: LoopDevices,
        logger: Box<dyn PipelineLogger>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            extractor: FaceExtractor::new(config.margin_percent, config.face_size)?,
            smoother: PredictionSmoother::new(config.max_store)?,
            params: config.detection_params(),
            devices,
            logger,
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
            state: LoopState::Idle,
            last_labels: Vec::new(),
            summary: LoopSummary::default(),
            released: false,
        })
    }

    /// Shares an existing cancellation flag instead of the internal one.
    pub fn with_cancel_handle(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    /// Flag that stops the loop at the next cycle boundary when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn last_labels(&self) -> &[SmoothedLabel] {
        &self.last_labels
    }

    pub fn smoother(&self) -> &PredictionSmoother {
        &self.smoother
    }

    pub fn run(&mut self) -> Result<LoopSummary, PipelineError> {
        if self.state == LoopState::Terminated {
            return Err(PipelineError::invalid("capture loop already terminated"));
        }

        self.open_source();
        while !self.is_cancelled() {
            let Some(mut frame) = self.capture() else {
                break;
            };
            self.process(&mut frame);

            self.summary.cycles += 1;
            self.logger.cycle(self.summary.cycles);

            std::thread::sleep(self.config.frame_delay());
            if let Some(key) = self.devices.display.poll_key(self.config.key_wait()) {
                if key.is_escape() {
                    log::info!("Escape pressed, stopping");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(self.summary)
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn open_source(&mut self) -> bool {
        match self.devices.source.open(self.config.device_index) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not open camera {}: {e}", self.config.device_index);
                false
            }
        }
    }

    /// Reads the next frame, backing off while the source has none.
    /// Returns `None` only when cancelled during a stall.
    fn capture(&mut self) -> Option<Frame> {
        self.state = LoopState::Capturing;
        let started = Instant::now();
        let mut delay = self.config.backoff_initial();
        let mut stalled = false;

        loop {
            if self.is_cancelled() {
                return None;
            }
            if self.devices.source.is_open() || self.open_source() {
                match self.devices.source.read() {
                    Ok(Capture::Frame(frame)) => {
                        if stalled {
                            log::info!("Capture resumed after {:?}", started.elapsed());
                        }
                        self.logger.timing("capture", elapsed_ms(started));
                        return Some(frame);
                    }
                    Ok(Capture::NotReady) => {}
                    Err(e) => log::warn!("Frame read failed: {e}"),
                }
            }

            if !stalled {
                stalled = true;
                self.summary.stalls += 1;
                log::debug!("No frame available, retrying");
            }
            std::thread::sleep(delay);
            delay = (delay * 2).min(self.config.backoff_max());
        }
    }

    fn process(&mut self, frame: &mut Frame) {
        let boxes = self.detect(frame);
        let anchors = match self.extract(frame, &boxes) {
            Some((batch, anchors)) => {
                self.summary.frames_with_faces += 1;
                self.predict_and_smooth(&batch);
                anchors
            }
            None => Vec::new(),
        };
        self.render(frame, &anchors);
    }

    fn detect(&mut self, frame: &Frame) -> Vec<BoundingBox> {
        self.state = LoopState::Detecting;
        let t = Instant::now();
        let Some(gray) = frame.to_luma() else {
            log::warn!("Frame {} is not RGB, skipping detection", frame.index());
            return Vec::new();
        };
        let boxes = match self.devices.detector.detect(&gray, &self.params) {
            Ok(boxes) => boxes,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                Vec::new()
            }
        };
        self.logger.timing("detect", elapsed_ms(t));
        self.logger.metric("faces", boxes.len() as f64);
        boxes
    }

    /// Crops every detected face and outlines its region. Returns the batch
    /// and each crop's label anchor, or `None` when nothing was extracted.
    fn extract(
        &mut self,
        frame: &mut Frame,
        boxes: &[BoundingBox],
    ) -> Option<(FaceBatch, Vec<(i32, i32)>)> {
        self.state = LoopState::Extracting;
        let t = Instant::now();
        let mut batch = FaceBatch::new();
        let mut anchors = Vec::with_capacity(boxes.len());

        for bbox in boxes {
            let (crop, region) = match self.extractor.extract(frame, Some(bbox)) {
                Ok(extracted) => extracted,
                Err(e) => {
                    log::warn!("Skipping face {bbox:?}: {e}");
                    continue;
                }
            };
            if let Err(e) = batch.push(crop) {
                log::warn!("Skipping face {bbox:?}: {e}");
                continue;
            }
            if let Err(e) = overlay::draw_crop_outline(frame, &region) {
                log::debug!("Outline not drawn: {e}");
            }
            anchors.push((bbox.x, bbox.y));
        }

        self.logger.timing("extract", elapsed_ms(t));
        if batch.is_empty() {
            None
        } else {
            Some((batch, anchors))
        }
    }

    fn predict_and_smooth(&mut self, batch: &FaceBatch) {
        self.state = LoopState::Predicting;
        let t = Instant::now();
        let result = self.devices.predictor.predict(batch);
        self.logger.timing("predict", elapsed_ms(t));
        let predictions = match result {
            Ok(predictions) => predictions,
            Err(e) => {
                log::warn!("Age/gender prediction failed: {e}");
                return;
            }
        };
        if predictions.len() != batch.len() {
            log::warn!(
                "Predictor returned {} results for {} faces, ignoring",
                predictions.len(),
                batch.len()
            );
            return;
        }

        self.state = LoopState::Smoothing;
        let t = Instant::now();
        match self.smoother.update(predictions) {
            Ok(labels) => self.last_labels = labels,
            Err(e) => log::warn!("Smoothing failed: {e}"),
        }
        self.logger.timing("smooth", elapsed_ms(t));
    }

    fn render(&mut self, frame: &mut Frame, anchors: &[(i32, i32)]) {
        self.state = LoopState::Rendering;
        let t = Instant::now();
        for (&(x, y), label) in anchors.iter().zip(self.last_labels.iter()) {
            if let Err(e) = overlay::draw_label(frame, x, y, &label.to_string()) {
                log::debug!("Label not drawn: {e}");
            }
        }
        if let Err(e) = self.devices.display.show(&self.config.window_name, frame) {
            log::warn!("Could not show frame {}: {e}", frame.index());
        }
        self.logger.timing("render", elapsed_ms(t));
    }

    fn shutdown(&mut self) {
        self.state = LoopState::Terminated;
        self.release_source();
        self.devices.display.close_all();
        self.logger.summary();
        log::info!(
            "Stopped after {} cycles ({} with faces, {} capture stalls)",
            self.summary.cycles,
            self.summary.frames_with_faces,
            self.summary.stalls
        );
    }

    fn release_source(&mut self) {
        if !self.released {
            self.devices.source.release();
            self.released = true;
        }
    }
}

impl Drop for FrameOrchestrator {
    fn drop(&mut self) {
        self.release_source();
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
