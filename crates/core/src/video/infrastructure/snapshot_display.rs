//! Headless display that writes each shown frame to a JPEG file.
//!
//! Useful on machines without a window system: point an image viewer that
//! auto-reloads at the snapshot file. Keys are read line by line from
//! stdin; a line containing ESC quits.
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use image::{ImageFormat, RgbImage};

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_display::{FrameDisplay, KeyCode};

pub struct SnapshotDisplay {
    dir: PathBuf,
    keys: Receiver<KeyCode>,
    windows: Vec<String>,
}

impl SnapshotDisplay {
    /// Creates the snapshot directory and starts the stdin key reader.
    pub fn new(dir: &Path) -> Result<Self, PipelineError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::Builder::new()
            .name("stdin-keys".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    for key in keys_from_line(&line) {
                        if tx.send(key).is_err() {
                            return;
                        }
                    }
                }
            })
            .map_err(|e| PipelineError::ResourceUnavailable(format!("stdin reader: {e}")))?;
        Self::with_keys(dir, rx)
    }

    /// Like [`SnapshotDisplay::new`] but with keys supplied by the caller.
    pub fn with_keys(dir: &Path, keys: Receiver<KeyCode>) -> Result<Self, PipelineError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            PipelineError::ResourceUnavailable(format!("{}: {e}", dir.display()))
        })?;
        log::info!("Writing frames to {}", dir.display());
        Ok(Self {
            dir: dir.to_path_buf(),
            keys,
            windows: Vec::new(),
        })
    }

    pub fn snapshot_path(&self, window: &str) -> PathBuf {
        self.dir.join(format!("{}.jpg", file_stem(window)))
    }
}

impl FrameDisplay for SnapshotDisplay {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("cannot show a {}-channel frame", frame.channels()).into());
        }
        let image = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("frame buffer does not match its dimensions")?;

        // Write next to the target then rename so viewers never see a
        // half-written file.
        let path = self.snapshot_path(window);
        let partial = path.with_extension("jpg.part");
        image.save_with_format(&partial, ImageFormat::Jpeg)?;
        std::fs::rename(&partial, &path)?;

        if !self.windows.iter().any(|w| w == window) {
            self.windows.push(window.to_string());
        }
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Option<KeyCode> {
        match self.keys.recv_timeout(timeout) {
            Ok(key) => Some(key),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn close_all(&mut self) {
        for window in self.windows.drain(..) {
            log::debug!("Closed snapshot window {window}");
        }
    }
}

fn keys_from_line(line: &str) -> Vec<KeyCode> {
    line.chars().map(|c| KeyCode(c as i32)).collect()
}

fn file_stem(window: &str) -> String {
    let stem: String = window
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "window".to_string()
    } else {
        stem
    }
}
