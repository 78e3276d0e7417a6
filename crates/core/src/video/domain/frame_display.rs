use std::time::Duration;

use crate::shared::constants::ESCAPE_KEY;
use crate::shared::frame::Frame;

/// Raw key code reported by a display surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyCode(pub i32);

impl KeyCode {
    pub const ESCAPE: KeyCode = KeyCode(ESCAPE_KEY);

    pub fn is_escape(self) -> bool {
        self == Self::ESCAPE
    }
}

/// Presents annotated frames and reports key presses.
pub trait FrameDisplay {
    fn show(&mut self, window: &str, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Waits up to `timeout` for a key press.
    fn poll_key(&mut self, timeout: Duration) -> Option<KeyCode>;

    /// Closes every window this display opened.
    fn close_all(&mut self);
}
