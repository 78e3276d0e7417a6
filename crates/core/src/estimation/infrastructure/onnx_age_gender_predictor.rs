//! Wide-residual-network age/gender estimator run through ONNX Runtime.
use std::path::Path;

use ndarray::{Array4, ArrayViewD, Axis, Ix2};

use super::execution_provider::preferred_execution_providers;
use crate::estimation::domain::age_gender_predictor::{
    AgeGenderPredictor, FaceBatch, RawPrediction,
};
use crate::shared::constants::AGE_BINS;
use crate::shared::error::PipelineError;

/// Gender head: `[N, 2]`, column 0 is the female probability.
const GENDER_OUTPUT: usize = 0;
/// Age head: `[N, 101]` softmax over one-year bins.
const AGE_OUTPUT: usize = 1;
const FEMALE_COLUMN: usize = 0;

/// Predictor backed by an ONNX Runtime session.
///
/// The network was trained on unnormalised BGR pixels in NHWC layout, so
/// crops are fed as raw 0-255 floats with the channel order swapped.
pub struct OnnxAgeGenderPredictor {
    session: ort::session::Session,
    face_size: u32,
}

impl OnnxAgeGenderPredictor {
    /// Loads the model once. Any failure here is fatal for the process.
    pub fn new(model_path: &Path, face_size: u32) -> Result<Self, PipelineError> {
        let session = ort::session::Session::builder()
            .map_err(load_failure(model_path))?
            .with_execution_providers(preferred_execution_providers())
            .map_err(load_failure(model_path))?
            .commit_from_file(model_path)
            .map_err(load_failure(model_path))?;

        if session.outputs().len() <= AGE_OUTPUT {
            return Err(PipelineError::ModelLoadFailure(format!(
                "{}: expected gender and age outputs, found {}",
                model_path.display(),
                session.outputs().len()
            )));
        }

        log::info!(
            "Loaded age/gender model from {} ({face_size}x{face_size} input)",
            model_path.display()
        );
        Ok(Self { session, face_size })
    }
}

impl AgeGenderPredictor for OnnxAgeGenderPredictor {
    fn predict(
        &mut self,
        batch: &FaceBatch,
    ) -> Result<Vec<RawPrediction>, Box<dyn std::error::Error>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(crop) = batch.crops().first() {
            if crop.size() != self.face_size {
                return Err(format!(
                    "model expects {0}x{0} crops, got {1}x{1}",
                    self.face_size,
                    crop.size()
                )
                .into());
            }
        }

        let input = ort::value::Tensor::from_array(to_bgr_f32(batch))?;
        let outputs = self.session.run(ort::inputs![input])?;
        if outputs.len() <= AGE_OUTPUT {
            return Err("age/gender model produced too few outputs".into());
        }
        let genders = outputs[GENDER_OUTPUT].try_extract_array::<f32>()?;
        let ages = outputs[AGE_OUTPUT].try_extract_array::<f32>()?;

        Ok(decode_outputs(genders, ages, batch.len())?)
    }
}

fn load_failure<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> PipelineError + '_ {
    move |e| PipelineError::ModelLoadFailure(format!("{}: {e}", path.display()))
}

/// NHWC float tensor with RGB swapped to BGR, values left in 0..=255.
fn to_bgr_f32(batch: &FaceBatch) -> Array4<f32> {
    let mut tensor = batch.to_nhwc().mapv(|v| v as f32);
    tensor.invert_axis(Axis(3));
    tensor.as_standard_layout().into_owned()
}

fn decode_outputs(
    genders: ArrayViewD<'_, f32>,
    ages: ArrayViewD<'_, f32>,
    expected: usize,
) -> Result<Vec<RawPrediction>, PipelineError> {
    let (gshape, ashape) = (genders.shape(), ages.shape());
    if gshape.len() != 2 || gshape[0] != expected || gshape[1] <= FEMALE_COLUMN {
        return Err(PipelineError::invalid(format!(
            "gender output shape {gshape:?} does not fit a batch of {expected}"
        )));
    }
    if ashape.len() != 2 || ashape[0] != expected || ashape[1] != AGE_BINS {
        return Err(PipelineError::invalid(format!(
            "age output shape {ashape:?} does not fit a batch of {expected}"
        )));
    }

    let genders = genders
        .into_dimensionality::<Ix2>()
        .map_err(|e| PipelineError::invalid(format!("gender output: {e}")))?;
    let ages = ages
        .into_dimensionality::<Ix2>()
        .map_err(|e| PipelineError::invalid(format!("age output: {e}")))?;

    genders
        .outer_iter()
        .zip(ages.outer_iter())
        .map(|(g, a)| {
            let dist: Vec<f32> = a.iter().copied().collect();
            RawPrediction::from_slices(g[FEMALE_COLUMN], &dist)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::domain::face_extractor::FaceCrop;
    use ndarray::{Array2, IxDyn};

    #[test]
    fn test_to_bgr_swaps_channels_and_keeps_scale() {
        let mut batch = FaceBatch::new();
        batch
            .push(FaceCrop::new(vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100, 110, 120], 2))
            .unwrap();
        let tensor = to_bgr_f32(&batch);
        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);
        assert_eq!(tensor[[0, 0, 0, 0]], 30.0);
        assert_eq!(tensor[[0, 0, 0, 2]], 10.0);
        assert_eq!(tensor[[0, 1, 1, 1]], 110.0);
    }

    #[test]
    fn test_decode_outputs_reads_female_column() {
        let genders = Array2::from_shape_vec((2, 2), vec![0.7, 0.3, 0.2, 0.8]).unwrap();
        let mut ages = Array2::<f32>::zeros((2, AGE_BINS));
        ages[[0, 25]] = 1.0;
        ages[[1, 70]] = 1.0;

        let preds = decode_outputs(genders.into_dyn().view(), ages.into_dyn().view(), 2).unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].gender_prob, 0.7);
        assert_eq!(preds[1].gender_prob, 0.2);
        assert_eq!(preds[0].age_distribution[25], 1.0);
        assert_eq!(preds[1].age_distribution[70], 1.0);
    }

    #[test]
    fn test_decode_outputs_rejects_batch_mismatch() {
        let genders = Array2::<f32>::zeros((1, 2)).into_dyn();
        let ages = Array2::<f32>::zeros((1, AGE_BINS)).into_dyn();
        assert!(decode_outputs(genders.view(), ages.view(), 2).is_err());
    }

    #[test]
    fn test_decode_outputs_rejects_wrong_bin_count() {
        let genders = Array2::<f32>::zeros((1, 2)).into_dyn();
        let ages = ndarray::ArrayD::<f32>::zeros(IxDyn(&[1, 100]));
        assert!(decode_outputs(genders.view(), ages.view(), 1).is_err());
    }

    #[test]
    fn test_missing_model_is_load_failure() {
        let err = OnnxAgeGenderPredictor::new(Path::new("/nonexistent/wrn.onnx"), 64)
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }
}
