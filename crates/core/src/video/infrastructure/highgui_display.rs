//! Native window display through OpenCV's highgui module.
use std::time::Duration;

use opencv::core::{Mat, CV_8UC3};
use opencv::highgui;
use opencv::prelude::*;

use crate::shared::frame::Frame;
use crate::video::domain::frame_display::{FrameDisplay, KeyCode};

/// Shows frames in highgui windows, created on first use.
#[derive(Default)]
pub struct HighguiDisplay {
    windows: Vec<String>,
    mat: Mat,
}

impl HighguiDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_window(&mut self, window: &str) -> opencv::Result<()> {
        if !self.windows.iter().any(|w| w == window) {
            highgui::named_window(window, highgui::WINDOW_AUTOSIZE)?;
            self.windows.push(window.to_string());
        }
        Ok(())
    }
}

impl FrameDisplay for HighguiDisplay {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if frame.channels() != 3 {
            return Err(format!("cannot show a {}-channel frame", frame.channels()).into());
        }
        let (rows, cols) = (frame.height() as i32, frame.width() as i32);
        if self.mat.rows() != rows || self.mat.cols() != cols {
            self.mat = Mat::zeros(rows, cols, CV_8UC3)?.to_mat()?;
        }

        // highgui expects BGR.
        let dst = self.mat.data_bytes_mut()?;
        for (d, s) in dst.chunks_exact_mut(3).zip(frame.data().chunks_exact(3)) {
            d[0] = s[2];
            d[1] = s[1];
            d[2] = s[0];
        }

        self.ensure_window(window)?;
        highgui::imshow(window, &self.mat)?;
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> Option<KeyCode> {
        let delay = timeout.as_millis().clamp(1, i32::MAX as u128) as i32;
        match highgui::wait_key(delay) {
            Ok(key) if key >= 0 => Some(KeyCode(key & 0xFF)),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Key poll failed: {e}");
                None
            }
        }
    }

    fn close_all(&mut self) {
        if let Err(e) = highgui::destroy_all_windows() {
            log::warn!("Failed to close windows: {e}");
        }
        self.windows.clear();
    }
}
