use crate::{
    config::OutputConfig,
    detectors::NoDetections,
    pipeline::FrameProcessor,
    traits::Detector,
};

/// Builder for creating frame processors with a fluent API
pub struct FrameProcessorBuilder {
    detector: Option<Box<dyn Detector>>,
    output: OutputConfig,
}

impl FrameProcessorBuilder {
    /// Create a new processor builder
    pub fn new() -> Self {
        Self {
            detector: None,
            output: OutputConfig::default(),
        }
    }

    /// Set the detector (replaces any existing one)
    pub fn detector<D>(mut self, detector: D) -> Self
    where
        D: Detector + 'static,
    {
        self.detector = Some(Box::new(detector));
        self
    }

    /// Set an already boxed detector
    pub fn boxed_detector(mut self, detector: Box<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Set output naming
    pub fn output_config(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    /// Override the artifact prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output.prefix = prefix.into();
        self
    }

    /// Build the processor, reporting no detections if no detector was set
    pub fn build(self) -> FrameProcessor {
        let detector = self.detector
            .unwrap_or_else(|| Box::new(NoDetections));

        FrameProcessor::new(detector, self.output)
    }
}

impl Default for FrameProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_prefix() {
        let processor = FrameProcessorBuilder::new().prefix("out_").build();
        assert_eq!(processor.output_config().prefix, "out_");
        assert_eq!(processor.output_config().video_extension, "avi");
    }
}
