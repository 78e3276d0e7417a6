use ffmpeg_next::software::scaling;

use crate::shared::error::PipelineError;
use crate::shared::frame::Frame;
use crate::video::domain::frame_source::{Capture, FrameSource};

const CAPTURE_FRAMERATE: &str = "30";

/// Captures webcam frames via ffmpeg-next (libavdevice + libavcodec).
///
/// Each decoded frame is converted to RGB24 and wrapped in a [`Frame`].
pub struct FfmpegCameraSource {
    session: Option<CaptureSession>,
    frame_index: usize,
}

struct CaptureSession {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: scaling::Context,
    stream_index: usize,
    width: u32,
    height: u32,
}

impl FfmpegCameraSource {
    pub fn new() -> Self {
        Self {
            session: None,
            frame_index: 0,
        }
    }
}

impl Default for FfmpegCameraSource {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for FfmpegCameraSource {
    fn open(&mut self, device_index: u32) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let (format_name, url) = device_locator(device_index)?;
        let format = find_input_device(format_name).ok_or_else(|| {
            PipelineError::ResourceUnavailable(format!(
                "capture backend {format_name} is not available in this ffmpeg build"
            ))
        })?;

        let mut options = ffmpeg_next::Dictionary::new();
        options.set("framerate", CAPTURE_FRAMERATE);
        let ictx = ffmpeg_next::format::open_with(
            &url,
            &ffmpeg_next::format::format::Format::Input(format),
            options,
        )
        .map_err(|e| PipelineError::ResourceUnavailable(format!("{url}: {e}")))?
        .input();

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("capture device exposes no video stream")?;
        let stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let (width, height) = (decoder.width(), decoder.height());
        let scaler = scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        log::info!("Opened camera {url} ({width}x{height})");
        self.session = Some(CaptureSession {
            ictx,
            decoder,
            scaler,
            stream_index,
            width,
            height,
        });
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }

    fn read(&mut self) -> Result<Capture, Box<dyn std::error::Error>> {
        let Some(session) = self.session.as_mut() else {
            return Err(PipelineError::ResourceUnavailable("camera not opened".into()).into());
        };

        let (width, height) = (session.width, session.height);
        match session.poll() {
            Ok(Some(pixels)) => Ok(Capture::Frame(self.next_frame(pixels, width, height))),
            Ok(None) => Ok(Capture::NotReady),
            Err(e) => {
                // A broken demuxer or decoder does not recover; the next
                // open() starts a fresh session.
                log::warn!("Camera stream failed, closing it: {e}");
                self.session = None;
                Err(e.into())
            }
        }
    }

    fn release(&mut self) {
        if self.session.take().is_some() {
            log::info!("Released camera after {} frames", self.frame_index);
        }
    }
}

impl FfmpegCameraSource {
    fn next_frame(&mut self, pixels: Vec<u8>, width: u32, height: u32) -> Frame {
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        frame
    }
}

impl CaptureSession {
    /// Reads at most one packet and returns a frame if one is decoded.
    ///
    /// `Ok(None)` means the device has nothing yet. Any error leaves the
    /// session unusable.
    fn poll(&mut self) -> Result<Option<Vec<u8>>, ffmpeg_next::Error> {
        if let Some(pixels) = self.receive()? {
            return Ok(Some(pixels));
        }

        let mut packet = ffmpeg_next::Packet::empty();
        match packet.read(&mut self.ictx) {
            Ok(()) => {}
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                return Ok(None);
            }
            Err(e) => return Err(e),
        }
        if packet.stream() != self.stream_index {
            return Ok(None);
        }
        self.decoder.send_packet(&packet)?;
        self.receive()
    }

    /// Pulls one decoded frame if the decoder has one buffered.
    fn receive(&mut self) -> Result<Option<Vec<u8>>, ffmpeg_next::Error> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        match self.decoder.receive_frame(&mut decoded) {
            Ok(()) => {}
            Err(ffmpeg_next::Error::Other { errno }) if errno == ffmpeg_next::error::EAGAIN => {
                return Ok(None);
            }
            Err(ffmpeg_next::Error::Eof) => return Ok(None),
            Err(e) => return Err(e),
        }
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&decoded, &mut rgb_frame)?;
        Ok(Some(extract_rgb_pixels(&rgb_frame, self.width, self.height)))
    }
}

/// libavdevice input format and device URL for a camera index.
fn device_locator(index: u32) -> Result<(&'static str, String), PipelineError> {
    #[cfg(target_os = "linux")]
    {
        Ok(("video4linux2", format!("/dev/video{index}")))
    }
    #[cfg(target_os = "macos")]
    {
        Ok(("avfoundation", format!("{index}")))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    {
        Err(PipelineError::ResourceUnavailable(format!(
            "no camera backend for device {index} on this platform"
        )))
    }
}

fn find_input_device(name: &str) -> Option<ffmpeg_next::format::format::Input> {
    ffmpeg_next::device::input::video()
        // The iterator yields a null format when no devices are registered.
        .filter(|fmt| unsafe { !fmt.as_ptr().is_null() })
        .find(|fmt| fmt.name() == name)
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping per-row stride padding.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_len = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_len * height as usize);
    for row in 0..height as usize {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + row_len]);
    }
    pixels
}
