pub mod builder;

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
    algorithms::ColorSplash,
    config::OutputConfig,
    error::{Result, SplashError},
    traits::{Detector, FrameContext, FrameSink, FrameSource},
    types::BgrFrame,
};

/// Outcome of a batch of still images
#[derive(Debug, Default)]
pub struct SplashReport {
    pub written: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, SplashError)>,
}

/// Why a frame loop stopped reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    Exhausted,
    ReadFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub frames_written: u64,
    pub end: StreamEnd,
}

/// Drives detection and compositing over still images or a frame stream.
///
/// Work is strictly sequential: a frame is written before the next one is
/// read.
pub struct FrameProcessor {
    detector: Box<dyn Detector>,
    compositor: ColorSplash,
    output: OutputConfig,
}

impl FrameProcessor {
    /// Create a new processor builder
    pub fn builder() -> builder::FrameProcessorBuilder {
        builder::FrameProcessorBuilder::new()
    }

    pub fn new(detector: Box<dyn Detector>, output: OutputConfig) -> Self {
        Self {
            detector,
            compositor: ColorSplash,
            output,
        }
    }

    pub fn output_config(&self) -> &OutputConfig {
        &self.output
    }

    /// Detect and composite one RGB image
    pub fn splash(&self, image: &RgbImage, context: &FrameContext<'_>) -> Result<RgbImage> {
        let detection = self.detector.detect(image, context)?;
        debug!(
            "Frame {}: {} instances, classes {:?}",
            context.index,
            detection.instance_count(),
            detection.class_ids
        );
        self.compositor.apply(image, &detection.masks)
    }

    /// Read, detect and composite one image file
    pub fn process_image(&self, index: u64, path: &Path) -> Result<RgbImage> {
        let image = image::open(path)?.to_rgb8();
        self.splash(&image, &FrameContext::image(index, path))
    }

    /// Splash each image into `output_dir` as `{prefix}{basename}.png`.
    ///
    /// A failing image is logged and recorded in the report; the remaining
    /// images are still processed.
    pub fn process_images<P: AsRef<Path>>(&self, paths: &[P], output_dir: &Path) -> Result<SplashReport> {
        fs::create_dir_all(output_dir)?;
        let mut report = SplashReport::default();

        for (index, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            info!("Running on {}", path.display());

            let target = output_dir.join(self.output.image_output_name(path));
            let result = self
                .process_image(index as u64, path)
                .and_then(|splash| splash.save(&target).map_err(SplashError::from));

            match result {
                Ok(()) => {
                    info!("Saved to {}", target.display());
                    report.written.push(target);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.failed.push((path.to_path_buf(), e));
                }
            }
        }

        Ok(report)
    }

    /// Splash one BGR frame, converting to RGB and back around the
    /// compositor
    pub fn splash_frame(&self, frame: &BgrFrame) -> Result<BgrFrame> {
        let image = frame.to_rgb()?;
        let splash = self.splash(&image, &FrameContext::frame(frame.index))?;
        Ok(BgrFrame::from_rgb(frame.index, &splash))
    }

    /// Run the frame loop until the source ends or a read fails, then
    /// release the sink. The sink is finished exactly once on every path,
    /// including when a frame fails to composite.
    pub fn process_stream<S, W>(&self, mut source: S, mut sink: W) -> Result<StreamSummary>
    where
        S: FrameSource,
        W: FrameSink,
    {
        match self.run_frames(&mut source, &mut sink) {
            Ok(summary) => {
                sink.finish()?;
                info!("Wrote {} frames ({:?})", summary.frames_written, summary.end);
                Ok(summary)
            }
            Err(e) => {
                if let Err(finish_error) = sink.finish() {
                    warn!("Failed to release output stream: {}", finish_error);
                }
                Err(e)
            }
        }
    }

    fn run_frames<S, W>(&self, source: &mut S, sink: &mut W) -> Result<StreamSummary>
    where
        S: FrameSource,
        W: FrameSink,
    {
        let mut frames_written = 0;
        loop {
            let frame = match source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    return Ok(StreamSummary {
                        frames_written,
                        end: StreamEnd::Exhausted,
                    })
                }
                Err(e) => {
                    warn!("Frame read failed after {} frames: {}", frames_written, e);
                    return Ok(StreamSummary {
                        frames_written,
                        end: StreamEnd::ReadFailed(e.to_string()),
                    });
                }
            };

            debug!("frame: {}", frame.index);
            let splash = self.splash_frame(&frame)?;
            sink.write_frame(&splash)?;
            frames_written += 1;
        }
    }
}
