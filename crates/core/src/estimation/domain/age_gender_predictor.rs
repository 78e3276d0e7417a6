use ndarray::{s, Array4};

use crate::shared::constants::AGE_BINS;
use crate::shared::error::PipelineError;

use super::face_extractor::FaceCrop;

/// Probability mass per integer age 0..=100.
pub type AgeDistribution = [f32; AGE_BINS];

/// One face's raw model output for one cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPrediction {
    /// Probability that the face is female, in `[0, 1]`.
    pub gender_prob: f32,
    pub age_distribution: AgeDistribution,
}

impl RawPrediction {
    pub fn new(gender_prob: f32, age_distribution: AgeDistribution) -> Self {
        Self {
            gender_prob,
            age_distribution,
        }
    }

    /// Builds a prediction from a model output row, rejecting rows with
    /// the wrong number of age bins.
    pub fn from_slices(gender_prob: f32, ages: &[f32]) -> Result<Self, PipelineError> {
        let age_distribution: AgeDistribution = ages.try_into().map_err(|_| {
            PipelineError::invalid(format!(
                "age distribution has {} bins, expected {AGE_BINS}",
                ages.len()
            ))
        })?;
        Ok(Self::new(gender_prob.clamp(0.0, 1.0), age_distribution))
    }

    /// All mass on a single age bin.
    pub fn one_hot(gender_prob: f32, age: usize) -> Self {
        let mut dist = [0.0; AGE_BINS];
        dist[age.min(AGE_BINS - 1)] = 1.0;
        Self::new(gender_prob, dist)
    }
}

/// Ordered crops of one cycle, sent to the predictor in a single call.
#[derive(Clone, Debug, Default)]
pub struct FaceBatch {
    crops: Vec<FaceCrop>,
}

impl FaceBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a crop. All crops of a batch must share one size.
    pub fn push(&mut self, crop: FaceCrop) -> Result<(), PipelineError> {
        if let Some(first) = self.crops.first() {
            if first.size() != crop.size() {
                return Err(PipelineError::invalid(format!(
                    "crop size {} does not match batch size {}",
                    crop.size(),
                    first.size()
                )));
            }
        }
        self.crops.push(crop);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.crops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.crops.is_empty()
    }

    pub fn crops(&self) -> &[FaceCrop] {
        &self.crops
    }

    /// `[N, size, size, 3]` tensor of the batch's RGB pixels.
    pub fn to_nhwc(&self) -> Array4<u8> {
        let size = self.crops.first().map_or(0, |c| c.size() as usize);
        let mut tensor = Array4::<u8>::zeros((self.crops.len(), size, size, 3));
        for (i, crop) in self.crops.iter().enumerate() {
            tensor.slice_mut(s![i, .., .., ..]).assign(&crop.as_ndarray());
        }
        tensor
    }
}

/// Domain interface for batched age/gender estimation.
///
/// Returns exactly one prediction per crop, in input order.
pub trait AgeGenderPredictor {
    fn predict(
        &mut self,
        batch: &FaceBatch,
    ) -> Result<Vec<RawPrediction>, Box<dyn std::error::Error>>;
}
