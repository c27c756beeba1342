pub mod args;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use splash::{
    AnnotationLoader, Dataset, Detector, GroundTruthDetector, LoadOutcome, MaskDirectoryDetector,
    NoDetections, SplashConfig, SplashError,
};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Splash(#[from] SplashError),
    #[error(transparent)]
    Driver(#[from] reel::DriverError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("ground truth masks need a source image path; stream frames have none")]
    GroundTruthOnStream,
}

pub type Result<T> = std::result::Result<T, CliError>;

/// Where per-image instance masks come from
#[derive(Debug, Clone, PartialEq)]
pub enum MaskSource {
    /// No detections: every output is fully desaturated
    None,
    /// Precomputed label maps
    Directory(PathBuf),
    /// Ground truth rasterized from an annotated subset
    Dataset { dir: PathBuf, subset: String },
}

impl MaskSource {
    pub fn from_args(masks: Option<PathBuf>, dataset: Option<PathBuf>, subset: &str) -> Self {
        match (masks, dataset) {
            (Some(dir), _) => Self::Directory(dir),
            (None, Some(dir)) => Self::Dataset {
                dir,
                subset: subset.to_string(),
            },
            (None, None) => Self::None,
        }
    }

    pub fn build_detector(&self, config: &SplashConfig) -> Result<Box<dyn Detector>> {
        Ok(match self {
            Self::None => Box::new(NoDetections),
            Self::Directory(dir) => Box::new(MaskDirectoryDetector::new(dir)),
            Self::Dataset { dir, subset } => {
                let outcome = load_dataset(config, dir, subset)?;
                Box::new(GroundTruthDetector::new(Arc::new(outcome.dataset)))
            }
        })
    }

    /// Detector for stream frames, which carry an index but no source path
    pub fn build_stream_detector(&self, config: &SplashConfig) -> Result<Box<dyn Detector>> {
        match self {
            Self::Dataset { .. } => Err(CliError::GroundTruthOnStream),
            _ => self.build_detector(config),
        }
    }
}

/// Configuration from a `.toml`/`.json` file, or the defaults
pub fn load_config(path: Option<&Path>) -> Result<SplashConfig> {
    match path {
        Some(path) => Ok(SplashConfig::from_file(path)?),
        None => Ok(SplashConfig::default()),
    }
}

pub fn load_dataset(config: &SplashConfig, dir: &Path, subset: &str) -> Result<LoadOutcome> {
    Ok(AnnotationLoader::new(config.dataset.clone()).load(dir, subset)?)
}

/// Write each record's ground-truth instances as `<stem>.png` label maps,
/// readable back through `MaskDirectoryDetector`
pub fn export_ground_truth(dataset: &Dataset, output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut written = Vec::with_capacity(dataset.len());

    for record in dataset.records() {
        let (masks, _) = dataset.get_masks(record.id())?;
        let stem = record.path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| record.id().to_string());
        let target = output_dir.join(format!("{}.png", stem));

        masks.to_label_map()?.save(&target)?;
        info!("Wrote {} instances to {}", masks.len(), target.display());
        written.push(target);
    }

    Ok(written)
}

/// Human-readable dataset summary
pub fn describe(outcome: &LoadOutcome) -> String {
    let dataset = &outcome.dataset;
    let mut lines = vec![format!("{} images", dataset.len())];

    for class in dataset.classes() {
        lines.push(format!("  class {}: {}", class.id, class.name));
    }
    for record in dataset.records() {
        let area: f64 = record.polygons().iter().map(|p| p.area()).sum();
        lines.push(format!(
            "  {} ({}x{}): {} polygons, classes {:?}, area {:.1}",
            record.path().display(),
            record.width(),
            record.height(),
            record.polygons().len(),
            record.class_ids(),
            area
        ));
    }
    if !outcome.discards.is_empty() {
        lines.push(format!("{} discarded inputs", outcome.discards.len()));
        for discard in &outcome.discards {
            let location = match discard.shape_index {
                Some(index) => format!("{} shape {}", discard.annotation.display(), index),
                None => discard.annotation.display().to_string(),
            };
            lines.push(format!("  {}: {}", location, discard.reason));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use splash::FrameContext;
    use tempfile::TempDir;

    fn write_dataset(root: &Path) {
        let dir = root.join("val");
        fs::create_dir_all(&dir).expect("Should create subset dir");
        let annotation = r#"{"shapes": [
            {"label": "blocked bike lane", "shape_type": "polygon", "points": [[0, 0], [4, 0], [4, 4], [0, 4]]},
            {"label": "blcoked the crosswalk", "shape_type": "polygon", "points": [[2, 2], [8, 2], [8, 8], [2, 8]]},
            {"label": "blocked bike lane", "shape_type": "circle", "points": [[5, 5], [6, 6]]}
        ]}"#;
        fs::write(dir.join("corner.json"), annotation).expect("Should write annotation");
        RgbImage::new(10, 10).save(dir.join("corner.jpg")).expect("Should write image");
    }

    #[test]
    fn test_mask_source_from_args() {
        assert_eq!(MaskSource::from_args(None, None, "val"), MaskSource::None);
        assert_eq!(
            MaskSource::from_args(Some("m".into()), Some("d".into()), "val"),
            MaskSource::Directory("m".into())
        );
        assert_eq!(
            MaskSource::from_args(None, Some("d".into()), "train"),
            MaskSource::Dataset { dir: "d".into(), subset: "train".to_string() }
        );
    }

    #[test]
    fn test_stream_detector_rejects_dataset_source() {
        let source = MaskSource::Dataset { dir: "d".into(), subset: "val".to_string() };
        let result = source.build_stream_detector(&SplashConfig::default());
        assert!(matches!(result, Err(CliError::GroundTruthOnStream)));

        let detector = MaskSource::None
            .build_stream_detector(&SplashConfig::default())
            .expect("Should build detector");
        let detection = detector
            .detect(&RgbImage::new(4, 3), &FrameContext::frame(0))
            .expect("Should detect");
        assert_eq!(detection.instance_count(), 0);
    }

    #[test]
    fn test_exported_ground_truth_reads_back() {
        let root = TempDir::new().expect("Should create temp dir");
        let out = TempDir::new().expect("Should create temp dir");
        write_dataset(root.path());

        let config = SplashConfig::default();
        let outcome = load_dataset(&config, root.path(), "val").expect("Should load dataset");
        let written = export_ground_truth(&outcome.dataset, out.path()).expect("Should export");
        assert_eq!(written, vec![out.path().join("corner.png")]);

        let detector = MaskSource::Directory(out.path().to_path_buf())
            .build_detector(&config)
            .expect("Should build detector");
        let source = root.path().join("val").join("corner.jpg");
        let detection = detector
            .detect(&RgbImage::new(10, 10), &FrameContext::image(0, &source))
            .expect("Should read exported masks");

        assert_eq!(detection.masks.len(), 2);
        // The second polygon is drawn last and owns the overlap
        assert_eq!(detection.masks.true_count(0), 12);
        assert_eq!(detection.masks.true_count(1), 36);
    }

    #[test]
    fn test_dataset_detector_uses_annotations() {
        let root = TempDir::new().expect("Should create temp dir");
        write_dataset(root.path());

        let source = MaskSource::Dataset { dir: root.path().to_path_buf(), subset: "val".to_string() };
        let detector = source
            .build_detector(&SplashConfig::default())
            .expect("Should build detector");
        let image_path = root.path().join("val").join("corner.jpg");
        let detection = detector
            .detect(&RgbImage::new(10, 10), &FrameContext::image(0, &image_path))
            .expect("Should detect");
        assert_eq!(detection.class_ids, vec![1, 2]);
    }

    #[test]
    fn test_describe_lists_discards() {
        let root = TempDir::new().expect("Should create temp dir");
        write_dataset(root.path());

        let outcome = load_dataset(&SplashConfig::default(), root.path(), "val")
            .expect("Should load dataset");
        let text = describe(&outcome);
        assert!(text.starts_with("1 images"));
        assert!(text.contains("class 2: blocked the crosswalk"));
        assert!(text.contains("shape 2: shape type 'circle' is not a polygon"));
    }

    #[test]
    fn test_default_config_without_file() {
        let config = load_config(None).expect("Should use defaults");
        assert_eq!(config, SplashConfig::default());
    }
}
