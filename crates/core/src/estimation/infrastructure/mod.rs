mod execution_provider;
pub mod onnx_age_gender_predictor;
