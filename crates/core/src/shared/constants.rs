/// SeetaFace frontal cascade consumed by the rustface detector.
pub const DETECTOR_MODEL_NAME: &str = "seeta_fd_frontal_v1.0.bin";

/// Number of one-year age bins (ages 0..=100) in a predictor's output.
pub const AGE_BINS: usize = 101;

/// Wide residual network exported to ONNX, keyed by depth and width.
pub fn predictor_model_name(depth: u32, width: u32) -> String {
    format!("wrn_{depth}_{width}_age_gender.onnx")
}

/// Environment variable that overrides every other model search location.
pub const MODEL_DIR_ENV: &str = "AGESIGHT_MODEL_DIR";

/// Directory name used under the platform config and cache directories.
pub const APP_DIR_NAME: &str = "AgeSight";

/// Key code that terminates the loop (Escape).
pub const ESCAPE_KEY: i32 = 27;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predictor_model_name_encodes_hyperparameters() {
        assert_eq!(predictor_model_name(16, 8), "wrn_16_8_age_gender.onnx");
        assert_eq!(predictor_model_name(10, 4), "wrn_10_4_age_gender.onnx");
    }
}
