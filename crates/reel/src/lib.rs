//! ffmpeg-backed frame streaming for the color splash pipeline.
//!
//! `FFmpegFrameSource` decodes a video into raw BGR frames through a piped
//! `ffmpeg` child; `FFmpegFrameSink` encodes frames back into a container.
//! Both plug into `splash::FrameProcessor::process_stream`.

pub mod driver;
pub mod sinks;
pub mod sources;

use serde::{Deserialize, Serialize};
use splash::SplashError;

pub use driver::FFmpegDriver;
pub use sinks::FFmpegFrameSink;
pub use sources::FFmpegFrameSource;

#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("Failed to initialize driver: {0}")]
    Initialization(String),
    #[error("Probe failed: {0}")]
    Probe(String),
    #[error("Process execution failed: {0}")]
    Execution(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DriverError>;

impl From<DriverError> for SplashError {
    fn from(error: DriverError) -> Self {
        SplashError::Stream(error.to_string())
    }
}

/// Stream properties needed to decode and re-encode raw frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
}

impl VideoMetadata {
    /// Size of one packed BGR frame in bytes
    pub fn frame_len(&self) -> usize {
        splash::BgrFrame::byte_len(self.width, self.height)
    }
}
