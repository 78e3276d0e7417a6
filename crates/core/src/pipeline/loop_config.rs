use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detection::domain::face_detector::{
    DetectionParams, DEFAULT_MIN_NEIGHBORS, DEFAULT_SCALE_FACTOR,
};
use crate::estimation::domain::face_extractor::{DEFAULT_FACE_SIZE, DEFAULT_MARGIN_PERCENT};
use crate::estimation::domain::prediction_smoother::DEFAULT_MAX_STORE;
use crate::shared::constants::APP_DIR_NAME;
use crate::shared::error::PipelineError;

pub const DEFAULT_WINDOW_NAME: &str = "Predicted Faces";

/// Tunables for the capture/estimate loop.
///
/// Every field has a default, so a settings file only needs the keys it
/// wants to change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub device_index: u32,
    pub face_size: u32,
    pub margin_percent: u32,
    pub max_store: usize,
    pub scale_factor: f64,
    pub min_neighbors: u32,
    pub frame_delay_ms: u64,
    pub key_wait_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    pub window_name: String,
    pub model_dir: Option<PathBuf>,
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            face_size: DEFAULT_FACE_SIZE,
            margin_percent: DEFAULT_MARGIN_PERCENT,
            max_store: DEFAULT_MAX_STORE,
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            frame_delay_ms: 50,
            key_wait_ms: 5,
            backoff_initial_ms: 10,
            backoff_max_ms: 5_000,
            window_name: DEFAULT_WINDOW_NAME.to_string(),
            model_dir: None,
            snapshot_dir: None,
        }
    }
}

impl LoopConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    /// Loads the user's settings, falling back to defaults.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Reads settings from `path`. A missing file yields defaults; an
    /// unreadable or malformed one is logged and also yields defaults.
    pub fn load_from(path: &Path) -> Self {
        let json = match fs::read_to_string(path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No settings at {}, using defaults", path.display());
                return Self::default();
            }
            Err(e) => {
                log::warn!("Could not read {}: {e}; using defaults", path.display());
                return Self::default();
            }
        };
        serde_json::from_str(&json).unwrap_or_else(|e| {
            log::warn!("Ignoring malformed settings in {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.face_size == 0 {
            return Err(PipelineError::invalid("face_size must be positive"));
        }
        if self.max_store == 0 {
            return Err(PipelineError::invalid("max_store must be at least 1"));
        }
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(PipelineError::invalid(format!(
                "scale_factor must be greater than 1, got {}",
                self.scale_factor
            )));
        }
        if self.backoff_initial_ms == 0 {
            return Err(PipelineError::invalid(
                "backoff_initial_ms must be at least 1",
            ));
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(PipelineError::invalid(format!(
                "backoff_max_ms ({}) is below backoff_initial_ms ({})",
                self.backoff_max_ms, self.backoff_initial_ms
            )));
        }
        if self.window_name.trim().is_empty() {
            return Err(PipelineError::invalid("window_name must not be empty"));
        }
        Ok(())
    }

    pub fn detection_params(&self) -> DetectionParams {
        DetectionParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: self.face_size,
        }
    }

    pub fn frame_delay(&self) -> Duration {
        Duration::from_millis(self.frame_delay_ms)
    }

    pub fn key_wait(&self) -> Duration {
        Duration::from_millis(self.key_wait_ms)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    /// Where the headless display writes its frames.
    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join(APP_DIR_NAME).join("snapshots")))
            .unwrap_or_else(|| PathBuf::from("snapshots"))
    }
}
