pub mod ffmpeg_camera_source;
#[cfg(feature = "highgui")]
pub mod highgui_display;
pub mod snapshot_display;
