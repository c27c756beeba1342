//! Mask providers standing in for the segmentation model.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbImage;
use tracing::debug;

use crate::{
    dataset::Dataset,
    error::{Result, SplashError},
    traits::{Detector, FrameContext},
    types::{Detection, InstanceMaskSet},
};

/// Reports no instances, producing a fully desaturated splash
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetections;

impl Detector for NoDetections {
    fn detect(&self, image: &RgbImage, _context: &FrameContext<'_>) -> Result<Detection> {
        Ok(Detection::none(image.width(), image.height()))
    }
}

/// Rasterizes the annotated polygons of a loaded dataset
#[derive(Debug, Clone)]
pub struct GroundTruthDetector {
    dataset: Arc<Dataset>,
}

impl GroundTruthDetector {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self { dataset }
    }
}

impl Detector for GroundTruthDetector {
    fn detect(&self, _image: &RgbImage, context: &FrameContext<'_>) -> Result<Detection> {
        let source = context.source.ok_or_else(|| {
            SplashError::Detection(format!(
                "frame {} has no source path to look up annotations",
                context.index
            ))
        })?;
        let record = self.dataset.find_by_path(source).ok_or_else(|| {
            SplashError::Detection(format!("no annotation record for {}", source.display()))
        })?;

        let (masks, class_ids) = self.dataset.get_masks(record.id())?;
        Ok(Detection::new(masks, class_ids))
    }
}

/// Reads precomputed instance label maps from a directory.
///
/// Still images map to `<stem>.png`, stream frames to
/// `frame_<index:06>.png`. Each distinct non-zero value in the map is one
/// instance and doubles as its class id.
#[derive(Debug, Clone)]
pub struct MaskDirectoryDetector {
    directory: PathBuf,
}

impl MaskDirectoryDetector {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn mask_path(&self, context: &FrameContext<'_>) -> PathBuf {
        match context.source.and_then(Path::file_stem) {
            Some(stem) => self.directory.join(format!("{}.png", stem.to_string_lossy())),
            None => self.directory.join(format!("frame_{:06}.png", context.index)),
        }
    }
}

impl Detector for MaskDirectoryDetector {
    fn detect(&self, _image: &RgbImage, context: &FrameContext<'_>) -> Result<Detection> {
        let path = self.mask_path(context);
        let labels = image::open(&path)
            .map_err(|e| SplashError::Detection(format!("cannot read mask {}: {}", path.display(), e)))?
            .to_luma8();

        let (masks, class_ids): (InstanceMaskSet, Vec<u32>) = InstanceMaskSet::from_label_map(&labels);
        debug!("Read {} instances from {}", masks.len(), path.display());
        Ok(Detection::new(masks, class_ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetSource, ImageRecord};
    use crate::types::Polygon;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    #[test]
    fn test_no_detections_matches_image_size() {
        let image = RgbImage::new(7, 3);
        let detection = NoDetections
            .detect(&image, &FrameContext::frame(0))
            .expect("Should detect");
        assert_eq!(detection.instance_count(), 0);
        assert_eq!((detection.masks.width(), detection.masks.height()), (7, 3));
    }

    #[test]
    fn test_ground_truth_lookup_by_path() {
        let mut dataset = Dataset::new("reported");
        dataset.add_image(ImageRecord::new(
            "/data/val/a.jpg",
            DatasetSource::Reported,
            "/data/val/a.jpg",
            10,
            10,
            vec![(Polygon::rectangle(0.0, 0.0, 5.0, 5.0), 2)],
        ));
        let detector = GroundTruthDetector::new(Arc::new(dataset));
        let image = RgbImage::new(10, 10);

        let detection = detector
            .detect(&image, &FrameContext::image(0, Path::new("/data/val/a.jpg")))
            .expect("Should find record");
        assert_eq!(detection.class_ids, vec![2]);
        assert_eq!(detection.masks.true_count(0), 25);

        let missing = detector.detect(&image, &FrameContext::image(1, Path::new("/data/val/b.jpg")));
        assert!(matches!(missing, Err(SplashError::Detection(_))));
        let no_path = detector.detect(&image, &FrameContext::frame(2));
        assert!(matches!(no_path, Err(SplashError::Detection(_))));
    }

    #[test]
    fn test_mask_directory_paths() {
        let detector = MaskDirectoryDetector::new("/masks");
        assert_eq!(
            detector.mask_path(&FrameContext::image(3, Path::new("/in/street.jpg"))),
            PathBuf::from("/masks/street.png")
        );
        assert_eq!(
            detector.mask_path(&FrameContext::frame(42)),
            PathBuf::from("/masks/frame_000042.png")
        );
    }

    #[test]
    fn test_mask_directory_reads_label_map() {
        let dir = TempDir::new().expect("Should create temp dir");
        let mut labels = GrayImage::new(4, 4);
        labels.put_pixel(0, 0, Luma([1]));
        labels.put_pixel(3, 3, Luma([2]));
        labels.put_pixel(3, 2, Luma([2]));
        labels
            .save(dir.path().join("frame_000005.png"))
            .expect("Should write mask");

        let detector = MaskDirectoryDetector::new(dir.path());
        let detection = detector
            .detect(&RgbImage::new(4, 4), &FrameContext::frame(5))
            .expect("Should read mask");
        assert_eq!(detection.class_ids, vec![1, 2]);
        assert_eq!(detection.masks.true_count(1), 2);

        let absent = detector.detect(&RgbImage::new(4, 4), &FrameContext::frame(6));
        assert!(matches!(absent, Err(SplashError::Detection(_))));
    }
}
