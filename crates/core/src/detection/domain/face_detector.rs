use image::GrayImage;

use crate::shared::geometry::BoundingBox;

pub const DEFAULT_SCALE_FACTOR: f64 = 1.2;
pub const DEFAULT_MIN_NEIGHBORS: u32 = 10;

/// Fixed parameters passed to the detector on every call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionParams {
    /// Ratio between successive image-pyramid scales (> 1).
    pub scale_factor: f64,
    /// Overlapping candidates required before a window is reported.
    pub min_neighbors: u32,
    /// Smallest face edge, in pixels, worth reporting.
    pub min_size: u32,
}

impl DetectionParams {
    pub fn new(min_size: u32) -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size,
        }
    }
}

/// Domain interface for face detection on a single-channel frame.
///
/// Output order is the only correspondence between cycles; there is no
/// identity attached to a box.
pub trait FaceDetector {
    fn detect(
        &mut self,
        gray: &GrayImage,
        params: &DetectionParams,
    ) -> Result<Vec<BoundingBox>, Box<dyn std::error::Error>>;
}
