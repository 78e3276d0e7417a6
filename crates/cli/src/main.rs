use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use agesight_core::detection::infrastructure::rustface_detector::RustfaceDetector;
use agesight_core::estimation::infrastructure::onnx_age_gender_predictor::OnnxAgeGenderPredictor;
use agesight_core::pipeline::frame_orchestrator::{FrameOrchestrator, LoopDevices};
use agesight_core::pipeline::loop_config::LoopConfig;
use agesight_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use agesight_core::shared::constants::{predictor_model_name, DETECTOR_MODEL_NAME};
use agesight_core::shared::error::PipelineError;
use agesight_core::shared::model_resolver;
use agesight_core::video::domain::frame_display::FrameDisplay;
use agesight_core::video::infrastructure::ffmpeg_camera_source::FfmpegCameraSource;

/// Estimates age and gender of faces seen by the webcam.
///
/// Press Escape in the window to quit. Without the `highgui` feature,
/// frames are written to a snapshot file and Escape is read from stdin
/// (type ESC, then Enter).
#[derive(Parser)]
#[command(name = "agesight")]
struct Cli {
    /// Depth of the wide residual network.
    #[arg(long, default_value = "16")]
    depth: u32,

    /// Width of the wide residual network.
    #[arg(long, default_value = "8")]
    width: u32,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = LoopConfig::load();
    config.validate()?;

    let model_dir = config.model_dir.as_deref();
    let detector = RustfaceDetector::new(&resolve_model(DETECTOR_MODEL_NAME, model_dir)?)?;
    let predictor = OnnxAgeGenderPredictor::new(
        &resolve_model(&predictor_model_name(cli.depth, cli.width), model_dir)?,
        config.face_size,
    )?;

    let devices = LoopDevices {
        source: Box::new(FfmpegCameraSource::new()),
        display: build_display(&config)?,
        detector: Box::new(detector),
        predictor: Box::new(predictor),
    };
    let mut orchestrator =
        FrameOrchestrator::new(config, devices, Box::new(StdoutPipelineLogger::default()))?;

    let summary = orchestrator.run()?;
    log::info!(
        "Processed {} frames, {} with faces",
        summary.cycles,
        summary.frames_with_faces
    );
    Ok(())
}

fn resolve_model(name: &str, configured_dir: Option<&Path>) -> Result<PathBuf, PipelineError> {
    log::info!("Resolving model: {name}");
    model_resolver::resolve(name, configured_dir)
        .map_err(|e| PipelineError::ModelLoadFailure(e.to_string()))
}

#[cfg(feature = "highgui")]
fn build_display(_config: &LoopConfig) -> Result<Box<dyn FrameDisplay>, PipelineError> {
    use agesight_core::video::infrastructure::highgui_display::HighguiDisplay;
    Ok(Box::new(HighguiDisplay::new()))
}

#[cfg(not(feature = "highgui"))]
fn build_display(config: &LoopConfig) -> Result<Box<dyn FrameDisplay>, PipelineError> {
    use agesight_core::video::infrastructure::snapshot_display::SnapshotDisplay;
    let display = SnapshotDisplay::new(&config.snapshot_dir())?;
    log::info!(
        "No window system support compiled in; view {}",
        display.snapshot_path(&config.window_name).display()
    );
    Ok(Box::new(display))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_network_shape() {
        let cli = Cli::parse_from(["agesight"]);
        assert_eq!((cli.depth, cli.width), (16, 8));
    }

    #[test]
    fn test_network_shape_flags() {
        let cli = Cli::parse_from(["agesight", "--depth", "10", "--width", "4"]);
        assert_eq!(predictor_model_name(cli.depth, cli.width), "wrn_10_4_age_gender.onnx");
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["agesight", "--input", "x.mp4"]).is_err());
    }

    #[test]
    fn test_missing_model_is_load_failure() {
        let dir = std::env::temp_dir().join("agesight-no-models-here");
        let err = resolve_model("missing.onnx", Some(&dir)).unwrap_err();
        assert!(err.is_fatal());
    }
}
