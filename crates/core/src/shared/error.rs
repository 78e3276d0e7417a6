use thiserror::Error;

use super::geometry::CropRegion;

/// Failure taxonomy for the capture/estimate loop.
///
/// Only `ModelLoadFailure` is fatal; every other variant is contained
/// within the cycle that produced it.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("capture source unavailable: {0}")]
    ResourceUnavailable(String),
    #[error("crop region is empty: {0:?}")]
    EmptyRegion(CropRegion),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to load model: {0}")]
    ModelLoadFailure(String),
}

impl PipelineError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ModelLoadFailure(_))
    }
}
