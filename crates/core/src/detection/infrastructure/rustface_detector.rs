//! Face detector backed by the `rustface` crate (SeetaFace funnel cascade).
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::GrayImage;

use crate::detection::domain::face_detector::{DetectionParams, FaceDetector};
use crate::shared::error::PipelineError;
use crate::shared::geometry::BoundingBox;

/// SeetaFace refuses windows smaller than its 20px base template.
const MIN_SUPPORTED_FACE_SIZE: u32 = 20;

const SCORE_THRESHOLD: f64 = 2.0;
const SLIDE_WINDOW_STEP: u32 = 4;

/// Wraps a loaded SeetaFace model.
///
/// The cascade has no neighbour-grouping stage, so
/// `DetectionParams::min_neighbors` is not used by this detector.
pub struct RustfaceDetector {
    detector: Box<dyn rustface::Detector>,
    applied: Option<DetectionParams>,
}

impl RustfaceDetector {
    pub fn new(model_path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(model_path).map_err(|e| {
            PipelineError::ModelLoadFailure(format!("{}: {e}", model_path.display()))
        })?;
        let model = rustface::read_model(BufReader::new(file)).map_err(|e| {
            PipelineError::ModelLoadFailure(format!("{}: {e}", model_path.display()))
        })?;
        let mut detector = rustface::create_detector_with_model(model);
        detector.set_score_thresh(SCORE_THRESHOLD);
        detector.set_slide_window_step(SLIDE_WINDOW_STEP, SLIDE_WINDOW_STEP);
        log::info!("Loaded face detector from {}", model_path.display());
        Ok(Self {
            detector,
            applied: None,
        })
    }

    fn apply(&mut self, params: &DetectionParams) {
        if self.applied.as_ref() == Some(params) {
            return;
        }
        self.detector.set_min_face_size(min_face_size(params.min_size));
        self.detector
            .set_pyramid_scale_factor(pyramid_factor(params.scale_factor));
        self.applied = Some(*params);
    }
}

impl FaceDetector for RustfaceDetector {
    fn detect(
        &mut self,
        gray: &GrayImage,
        params: &DetectionParams,
    ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>> {
        self.apply(params);
        let (width, height) = gray.dimensions();
        let image = rustface::ImageData::new(gray.as_raw(), width, height);
        let faces = self.detector.detect(&image);
        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                BoundingBox::new(
                    bbox.x(),
                    bbox.y(),
                    bbox.width() as i32,
                    bbox.height() as i32,
                )
            })
            .collect())
    }
}

fn min_face_size(min_size: u32) -> u32 {
    min_size.max(MIN_SUPPORTED_FACE_SIZE)
}

/// Converts an upward scale step (e.g. 1.2) into SeetaFace's shrink
/// factor (e.g. 0.833), which must lie in (0, 1).
fn pyramid_factor(scale_factor: f64) -> f32 {
    if scale_factor <= 1.0 {
        return 0.8;
    }
    (1.0 / scale_factor) as f32
}
