//! In-memory registry of annotated images and their classes.

pub mod loader;

pub use loader::{AnnotationFile, AnnotationLoader, AnnotationShape, LoadOutcome};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::{
    algorithms::PolygonRasterizer,
    error::{Result, SplashError},
    types::{InstanceMaskSet, Polygon},
};

/// Dataset split to load
#[derive(
    Debug, Clone, Copy,
    Serialize, Deserialize,
    Display, EnumString,
    PartialEq, Eq, Hash
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Subset {
    Train,
    Val,
}

impl Subset {
    /// Parse a subset name, failing with `InvalidSubset` for anything but
    /// `train` or `val`
    pub fn parse(name: &str) -> Result<Self> {
        name.parse()
            .map_err(|_| SplashError::InvalidSubset(name.to_string()))
    }
}

/// Where a record came from. Only `Reported` records carry polygons this
/// crate knows how to rasterize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetSource {
    Reported,
    Other(String),
}

/// A registered class. Id 0 is the implicit background class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassInfo {
    pub source: String,
    pub id: u32,
    pub name: String,
}

/// One annotated image. Polygons and class ids are index-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    id: String,
    source: DatasetSource,
    path: PathBuf,
    width: u32,
    height: u32,
    polygons: Vec<Polygon>,
    class_ids: Vec<u32>,
}

impl ImageRecord {
    pub fn new(
        id: impl Into<String>,
        source: DatasetSource,
        path: impl Into<PathBuf>,
        width: u32,
        height: u32,
        shapes: Vec<(Polygon, u32)>,
    ) -> Self {
        let (polygons, class_ids) = shapes.into_iter().unzip();
        Self {
            id: id.into(),
            source,
            path: path.into(),
            width,
            height,
            polygons,
            class_ids,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> &DatasetSource {
        &self.source
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn class_ids(&self) -> &[u32] {
        &self.class_ids
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// Why an annotation input was left out of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscardReason {
    UnknownLabel(String),
    UnsupportedShapeType(String),
    EmptyAnnotation,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLabel(label) => write!(f, "label '{}' is not in the vocabulary", label),
            Self::UnsupportedShapeType(kind) => write!(f, "shape type '{}' is not a polygon", kind),
            Self::EmptyAnnotation => write!(f, "no polygons left after filtering"),
        }
    }
}

/// A dropped shape (`shape_index` set) or a dropped image (`None`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discard {
    pub annotation: PathBuf,
    pub shape_index: Option<usize>,
    pub reason: DiscardReason,
}

/// Registry of image records, read-only once loading has finished.
///
/// Record order follows directory enumeration and is not stable across
/// platforms.
#[derive(Debug, Clone)]
pub struct Dataset {
    source_name: String,
    classes: Vec<ClassInfo>,
    records: Vec<ImageRecord>,
    index: HashMap<String, usize>,
}

impl Dataset {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            classes: vec![ClassInfo {
                source: String::new(),
                id: 0,
                name: "BG".to_string(),
            }],
            records: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Name of the `Reported` source
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Register a class; re-registering the same source and id is a no-op
    pub fn add_class(&mut self, source: impl Into<String>, id: u32, name: impl Into<String>) {
        let source = source.into();
        if self.classes.iter().any(|c| c.source == source && c.id == id) {
            return;
        }
        self.classes.push(ClassInfo {
            source,
            id,
            name: name.into(),
        });
    }

    /// Register an image. Records without polygons are not registered and
    /// `false` is returned. A record with an id already present replaces it.
    pub fn add_image(&mut self, record: ImageRecord) -> bool {
        if record.is_empty() {
            debug!("Skipping image {} with no polygons", record.id());
            return false;
        }

        match self.index.get(record.id()) {
            Some(&position) => self.records[position] = record,
            None => {
                self.index.insert(record.id().to_string(), self.records.len());
                self.records.push(record);
            }
        }
        true
    }

    pub fn classes(&self) -> &[ClassInfo] {
        &self.classes
    }

    pub fn class_name(&self, id: u32) -> Option<&str> {
        self.classes
            .iter()
            .find(|c| c.id == id && (id == 0 || c.source == self.source_name))
            .map(|c| c.name.as_str())
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, image_id: &str) -> Option<&ImageRecord> {
        self.index.get(image_id).map(|&position| &self.records[position])
    }

    /// Find the record whose image lives at `path`
    pub fn find_by_path(&self, path: &Path) -> Option<&ImageRecord> {
        self.records.iter().find(|record| record.path() == path)
    }

    fn record(&self, image_id: &str) -> Result<&ImageRecord> {
        self.get(image_id)
            .ok_or_else(|| SplashError::UnknownImage(image_id.to_string()))
    }

    /// Instance masks and class ids for an image.
    ///
    /// `Reported` records are rasterized from their polygons. Records from
    /// any other source yield an empty mask set of the record's size.
    pub fn get_masks(&self, image_id: &str) -> Result<(InstanceMaskSet, Vec<u32>)> {
        let record = self.record(image_id)?;
        match record.source() {
            DatasetSource::Reported => {
                let masks = PolygonRasterizer.rasterize(
                    record.polygons(),
                    record.height(),
                    record.width(),
                )?;
                Ok((masks, record.class_ids().to_vec()))
            }
            DatasetSource::Other(source) => {
                debug!("No masks for image {} from source {}", image_id, source);
                Ok((InstanceMaskSet::empty(record.width(), record.height()), Vec::new()))
            }
        }
    }

    /// Path of the image file for `Reported` records, `None` otherwise
    pub fn get_reference(&self, image_id: &str) -> Result<Option<&Path>> {
        let record = self.record(image_id)?;
        Ok(match record.source() {
            DatasetSource::Reported => Some(record.path()),
            DatasetSource::Other(_) => None,
        })
    }
}
