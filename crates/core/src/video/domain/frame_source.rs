use crate::shared::frame::Frame;

/// Outcome of one capture attempt.
#[derive(Debug)]
pub enum Capture {
    Frame(Frame),
    /// The device is open but had no frame ready this time.
    NotReady,
}

/// Supplies frames from a live capture device.
///
/// Implementations handle device and codec details while the loop works
/// with the abstract `Frame` type. Read failures and `NotReady` are both
/// transient from the loop's point of view.
pub trait FrameSource {
    /// Opens the capture device with the given index.
    fn open(&mut self, device_index: u32) -> Result<(), Box<dyn std::error::Error>>;

    fn is_open(&self) -> bool;

    /// Attempts to read the next frame without blocking indefinitely.
    fn read(&mut self) -> Result<Capture, Box<dyn std::error::Error>>;

    /// Releases the device. Calling it on a closed source is a no-op.
    fn release(&mut self);
}
