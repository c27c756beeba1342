use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    config::DatasetConfig,
    dataset::{Dataset, DatasetSource, Discard, DiscardReason, ImageRecord, Subset},
    error::{Result, SplashError},
    types::Polygon,
};

/// One annotation file: an ordered list of labelled shapes
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationFile {
    pub shapes: Vec<AnnotationShape>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationShape {
    pub label: String,
    pub shape_type: String,
    pub points: Polygon,
}

/// A loaded registry plus every input that was silently left out of it
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub dataset: Dataset,
    pub discards: Vec<Discard>,
}

/// Builds a `Dataset` from a directory of per-image annotation files
#[derive(Debug, Clone, Default)]
pub struct AnnotationLoader {
    config: DatasetConfig,
}

impl AnnotationLoader {
    pub fn new(config: DatasetConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Load `dataset_dir/subset`. Fails with `InvalidSubset` unless the
    /// subset is `train` or `val`.
    pub fn load(&self, dataset_dir: impl AsRef<Path>, subset: &str) -> Result<LoadOutcome> {
        let subset = Subset::parse(subset)?;
        self.load_subset(dataset_dir, subset)
    }

    /// Load one subset. Any annotation whose image cannot be read aborts
    /// the whole load with `MissingImageFile`.
    ///
    /// A missing `dataset_dir/subset` directory is an `Io` error, not an
    /// empty dataset.
    pub fn load_subset(&self, dataset_dir: impl AsRef<Path>, subset: Subset) -> Result<LoadOutcome> {
        let directory = dataset_dir.as_ref().join(subset.to_string());
        info!("Loading {} annotations from {}", subset, directory.display());

        let mut dataset = Dataset::new(self.config.source.clone());
        for class in &self.config.classes {
            dataset.add_class(self.config.source.clone(), class.id, class.name.clone());
        }

        let mut discards = Vec::new();
        for annotation_path in annotation_files(&directory)? {
            let annotation = read_annotation(&annotation_path)?;
            let shapes = self.retain_shapes(&annotation, &annotation_path, &mut discards);

            if shapes.is_empty() {
                debug!("Dropping {}: no polygons left", annotation_path.display());
                discards.push(Discard {
                    annotation: annotation_path,
                    shape_index: None,
                    reason: DiscardReason::EmptyAnnotation,
                });
                continue;
            }

            let image_path = annotation_path.with_extension(&self.config.image_extension);
            let (width, height) = image::image_dimensions(&image_path).map_err(|source| {
                SplashError::MissingImageFile {
                    path: image_path.clone(),
                    source,
                }
            })?;

            debug!(
                "Adding {} ({}x{}) with {} polygons",
                image_path.display(),
                width,
                height,
                shapes.len()
            );
            let record = ImageRecord::new(
                image_path.to_string_lossy(),
                DatasetSource::Reported,
                image_path.clone(),
                width,
                height,
                shapes,
            );
            dataset.add_image(record);
        }

        info!(
            "Loaded {} images from {} ({} inputs discarded)",
            dataset.len(),
            directory.display(),
            discards.len()
        );
        Ok(LoadOutcome { dataset, discards })
    }

    /// Keep polygon shapes whose label is in the vocabulary, paired with
    /// their class id, in file order. Everything else is recorded in
    /// `discards`.
    pub fn retain_shapes(
        &self,
        annotation: &AnnotationFile,
        annotation_path: &Path,
        discards: &mut Vec<Discard>,
    ) -> Vec<(Polygon, u32)> {
        let mut shapes = Vec::new();

        for (shape_index, shape) in annotation.shapes.iter().enumerate() {
            let reason = match self.config.class_id(&shape.label) {
                None => DiscardReason::UnknownLabel(shape.label.clone()),
                Some(_) if shape.shape_type != "polygon" => {
                    DiscardReason::UnsupportedShapeType(shape.shape_type.clone())
                }
                Some(class_id) => {
                    shapes.push((shape.points.clone(), class_id));
                    continue;
                }
            };

            debug!(
                "Dropping shape {} of {}: {}",
                shape_index,
                annotation_path.display(),
                reason
            );
            discards.push(Discard {
                annotation: annotation_path.to_path_buf(),
                shape_index: Some(shape_index),
                reason,
            });
        }

        shapes
    }
}

fn annotation_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if path.is_file() && path.extension().and_then(|ext| ext.to_str()) == Some("json") {
            files.push(path);
        }
    }
    Ok(files)
}

fn read_annotation(path: &Path) -> Result<AnnotationFile> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| SplashError::AnnotationParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_sample(dir: &Path, stem: &str, shapes: serde_json::Value, with_image: bool) {
        let annotation = json!({ "version": "5.0.1", "imagePath": format!("{}.jpg", stem), "shapes": shapes });
        fs::write(dir.join(format!("{}.json", stem)), annotation.to_string())
            .expect("Should write annotation");
        if with_image {
            RgbImage::new(20, 20)
                .save(dir.join(format!("{}.jpg", stem)))
                .expect("Should write image");
        }
    }

    fn subset_dir(root: &TempDir, subset: &str) -> PathBuf {
        let dir = root.path().join(subset);
        fs::create_dir_all(&dir).expect("Should create subset dir");
        dir
    }

    fn square(label: &str, shape_type: &str) -> serde_json::Value {
        json!({
            "label": label,
            "shape_type": shape_type,
            "points": [[5, 5], [15, 5], [15, 15], [5, 15]],
            "group_id": null,
            "flags": {}
        })
    }

    #[test]
    fn test_single_square_annotation() {
        let root = TempDir::new().expect("Should create temp dir");
        let dir = subset_dir(&root, "train");
        write_sample(&dir, "street", json!([square("blocked bike lane", "polygon")]), true);

        let outcome = AnnotationLoader::default()
            .load(root.path(), "train")
            .expect("Should load dataset");

        assert_eq!(outcome.dataset.len(), 1);
        let record = &outcome.dataset.records()[0];
        assert_eq!((record.width(), record.height()), (20, 20));
        assert_eq!(record.class_ids(), &[1]);
        assert_eq!(record.path(), dir.join("street.jpg"));

        let (masks, class_ids) = outcome.dataset
            .get_masks(record.id())
            .expect("Should rasterize");
        assert_eq!(masks.len(), 1);
        assert_eq!(masks.true_count(0), 100);
        assert_eq!(class_ids, vec![1]);
        assert!(outcome.discards.is_empty());
    }

    #[test]
    fn test_rectangle_only_image_is_absent() {
        let root = TempDir::new().expect("Should create temp dir");
        let dir = subset_dir(&root, "val");
        write_sample(&dir, "boxes", json!([square("blocked bike lane", "rectangle")]), true);

        let outcome = AnnotationLoader::default()
            .load(root.path(), "val")
            .expect("Should load dataset");

        assert!(outcome.dataset.is_empty());
        assert_eq!(outcome.discards.len(), 2);
        assert_eq!(
            outcome.discards[0].reason,
            DiscardReason::UnsupportedShapeType("rectangle".to_string())
        );
        assert_eq!(outcome.discards[1].reason, DiscardReason::EmptyAnnotation);
        assert_eq!(outcome.discards[1].shape_index, None);
    }

    #[test]
    fn test_correctly_spelled_crosswalk_label_is_dropped() {
        let root = TempDir::new().expect("Should create temp dir");
        let dir = subset_dir(&root, "train");
        write_sample(&dir, "crossing", json!([square("blocked the crosswalk", "polygon")]), true);
        write_sample(&dir, "typo", json!([square("blcoked the crosswalk", "polygon")]), true);

        let outcome = AnnotationLoader::default()
            .load(root.path(), "train")
            .expect("Should load dataset");

        assert_eq!(outcome.dataset.len(), 1);
        let record = &outcome.dataset.records()[0];
        assert_eq!(record.path(), dir.join("typo.jpg"));
        assert_eq!(record.class_ids(), &[2]);
        assert!(outcome.discards.iter().any(|d| d.reason
            == DiscardReason::UnknownLabel("blocked the crosswalk".to_string())));
    }

    #[test]
    fn test_class_ids_follow_retained_polygon_order() {
        let root = TempDir::new().expect("Should create temp dir");
        let dir = subset_dir(&root, "train");
        write_sample(
            &dir,
            "mixed",
            json!([
                square("blcoked the crosswalk", "polygon"),
                square("pedestrian", "polygon"),
                square("blocked bike lane", "line"),
                square("blocked bike lane", "polygon"),
            ]),
            true,
        );

        let outcome = AnnotationLoader::default()
            .load(root.path(), "train")
            .expect("Should load dataset");

        let record = &outcome.dataset.records()[0];
        assert_eq!(record.polygons().len(), 2);
        assert_eq!(record.class_ids(), &[2, 1]);
        let dropped: Vec<_> = outcome.discards.iter().filter_map(|d| d.shape_index).collect();
        assert_eq!(dropped, vec![1, 2]);
    }

    #[test]
    fn test_missing_image_aborts_load() {
        let root = TempDir::new().expect("Should create temp dir");
        let dir = subset_dir(&root, "train");
        write_sample(&dir, "present", json!([square("blocked bike lane", "polygon")]), true);
        write_sample(&dir, "absent", json!([square("blocked bike lane", "polygon")]), false);

        let result = AnnotationLoader::default().load(root.path(), "train");
        assert!(matches!(
            result,
            Err(SplashError::MissingImageFile { path, .. }) if path == dir.join("absent.jpg")
        ));
    }

    #[test]
    fn test_missing_image_for_dropped_annotation_is_ignored() {
        let root = TempDir::new().expect("Should create temp dir");
        let dir = subset_dir(&root, "train");
        write_sample(&dir, "unlabelled", json!([square("tree", "polygon")]), false);

        let outcome = AnnotationLoader::default()
            .load(root.path(), "train")
            .expect("Should load dataset");
        assert!(outcome.dataset.is_empty());
    }

    #[test]
    fn test_invalid_subset() {
        let root = TempDir::new().expect("Should create temp dir");
        let result = AnnotationLoader::default().load(root.path(), "test");
        assert!(matches!(result, Err(SplashError::InvalidSubset(_))));
    }

    #[test]
    fn test_missing_subset_directory_fails() {
        let root = TempDir::new().expect("Should create temp dir");
        let result = AnnotationLoader::default().load(root.path(), "val");
        assert!(matches!(
            result,
            Err(SplashError::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound
        ));
    }

    #[test]
    fn test_malformed_annotation_fails() {
        let root = TempDir::new().expect("Should create temp dir");
        let dir = subset_dir(&root, "val");
        fs::write(dir.join("broken.json"), "{ \"shapes\": [ {").expect("Should write file");

        let result = AnnotationLoader::default().load(root.path(), "val");
        assert!(matches!(result, Err(SplashError::AnnotationParse { .. })));
    }

    #[test]
    fn test_registered_classes_use_configured_names() {
        let root = TempDir::new().expect("Should create temp dir");
        subset_dir(&root, "val");

        let outcome = AnnotationLoader::default()
            .load(root.path(), "val")
            .expect("Should load empty dataset");
        assert_eq!(outcome.dataset.class_name(2), Some("blocked the crosswalk"));
        assert_eq!(outcome.dataset.classes().len(), 3);
    }
}
