use std::path::Path;

use image::RgbImage;

use crate::{
    error::Result,
    types::{BgrFrame, Detection},
};

/// Where the image handed to a detector came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext<'a> {
    /// Position in the input sequence, starting at 0
    pub index: u64,
    /// File the image was read from, if any
    pub source: Option<&'a Path>,
}

impl<'a> FrameContext<'a> {
    pub fn image(index: u64, source: &'a Path) -> Self {
        Self {
            index,
            source: Some(source),
        }
    }

    pub fn frame(index: u64) -> Self {
        Self {
            index,
            source: None,
        }
    }
}

/// Boundary to the segmentation model: instance masks for one RGB image,
/// aligned to its pixel dimensions
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage, context: &FrameContext<'_>) -> Result<Detection>;
}

/// Sequential frame reader
pub trait FrameSource {
    /// Next frame in order. `Ok(None)` is end of stream; an error is a
    /// failed read. Either one ends the frame loop.
    fn read_frame(&mut self) -> Result<Option<BgrFrame>>;
}

/// Sequential frame writer owning an encoder
pub trait FrameSink {
    fn write_frame(&mut self, frame: &BgrFrame) -> Result<()>;

    /// Flush everything written and release the encoder
    fn finish(self) -> Result<()>
    where
        Self: Sized;
}
