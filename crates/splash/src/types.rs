use geo_types::{Coord, LineString};
use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplashError};

/// Pixel value used for set mask pixels
pub const MASK_ON: u8 = 255;

/// An implicitly closed polygon outline in image coordinates.
///
/// Vertices may be fractional. Serializes as a bare list of `[x, y]` pairs,
/// which is how annotation files store them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Polygon {
    pub points: Vec<[f64; 2]>,
}

impl Polygon {
    pub fn new(points: Vec<[f64; 2]>) -> Self {
        Self { points }
    }

    /// Axis-aligned rectangle spanning `[x0, x1] x [y0, y1]`
    pub fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::new(vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fails with `InvalidPolygon` below three vertices
    pub fn validate(&self) -> Result<()> {
        if self.points.len() < 3 {
            return Err(SplashError::InvalidPolygon {
                vertices: self.points.len(),
            });
        }
        Ok(())
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> geo_types::Polygon<f64> {
        let coords: Vec<Coord<f64>> = self.points
            .iter()
            .map(|&[x, y]| Coord { x, y })
            .collect();

        geo_types::Polygon::new(LineString::new(coords), vec![])
    }

    /// Enclosed area, independent of winding order
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Get the bounding box of the polygon, `None` when it has no vertices
    pub fn bounding_box(&self) -> Option<([f64; 2], [f64; 2])> {
        if self.points.is_empty() {
            return None;
        }

        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for &[x, y] in &self.points {
            min[0] = min[0].min(x);
            min[1] = min[1].min(y);
            max[0] = max[0].max(x);
            max[1] = max[1].max(y);
        }

        Some((min, max))
    }
}

/// A stack of per-instance boolean masks for one image.
///
/// Each layer is a `GrayImage` where any non-zero pixel is set. Layers are
/// index-aligned with the class ids that travel alongside the set and may
/// overlap freely.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceMaskSet {
    width: u32,
    height: u32,
    layers: Vec<GrayImage>,
}

impl InstanceMaskSet {
    /// A set with no instances for a `width x height` canvas
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            layers: Vec::new(),
        }
    }

    /// Wrap existing layers. Layer sizes are not checked here; the
    /// compositor rejects layers that do not match the image.
    pub fn from_layers(width: u32, height: u32, layers: Vec<GrayImage>) -> Self {
        Self {
            width,
            height,
            layers,
        }
    }

    /// Split an instance label map into one layer per distinct non-zero
    /// value, ordered by value. Returns the values as class ids.
    ///
    /// Not the inverse of `to_label_map`: maps written there carry instance
    /// numbers, which come back here as class ids.
    pub fn from_label_map(labels: &GrayImage) -> (Self, Vec<u32>) {
        let mut present = [false; 256];
        for pixel in labels.pixels() {
            present[pixel[0] as usize] = true;
        }

        let (width, height) = labels.dimensions();
        let mut set = Self::empty(width, height);
        let mut class_ids = Vec::new();

        for value in 1..=u8::MAX {
            if !present[value as usize] {
                continue;
            }
            let layer = GrayImage::from_fn(width, height, |x, y| {
                if labels.get_pixel(x, y)[0] == value {
                    Luma([MASK_ON])
                } else {
                    Luma([0])
                }
            });
            set.push(layer);
            class_ids.push(u32::from(value));
        }

        (set, class_ids)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn push(&mut self, layer: GrayImage) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[GrayImage] {
        &self.layers
    }

    pub fn layer(&self, index: usize) -> Option<&GrayImage> {
        self.layers.get(index)
    }

    pub fn is_set(&self, layer: usize, x: u32, y: u32) -> bool {
        self.layers
            .get(layer)
            .and_then(|mask| mask.get_pixel_checked(x, y))
            .map(|pixel| pixel[0] != 0)
            .unwrap_or(false)
    }

    /// Number of set pixels in one layer
    pub fn true_count(&self, layer: usize) -> usize {
        self.layers
            .get(layer)
            .map(|mask| mask.pixels().filter(|p| p[0] != 0).count())
            .unwrap_or(0)
    }

    /// Logical OR across all layers
    pub fn union(&self) -> GrayImage {
        let mut merged = GrayImage::new(self.width, self.height);
        for layer in &self.layers {
            for (x, y, pixel) in layer.enumerate_pixels() {
                if pixel[0] != 0 && x < self.width && y < self.height {
                    merged.put_pixel(x, y, Luma([MASK_ON]));
                }
            }
        }
        merged
    }

    /// Instance index + 1 per pixel, 0 for background. Later layers win
    /// where instances overlap; this is an export format only.
    ///
    /// Pixel values are instance numbers, not class ids, so reading the map
    /// back with `from_label_map` reports instance numbers as class ids.
    /// Fails with `TooManyInstances` above 255 layers.
    pub fn to_label_map(&self) -> Result<GrayImage> {
        if self.layers.len() > usize::from(u8::MAX) {
            return Err(SplashError::TooManyInstances {
                count: self.layers.len(),
            });
        }

        let mut labels = GrayImage::new(self.width, self.height);
        for (value, layer) in (1..=u8::MAX).zip(&self.layers) {
            for (x, y, pixel) in layer.enumerate_pixels() {
                if pixel[0] != 0 && x < self.width && y < self.height {
                    labels.put_pixel(x, y, Luma([value]));
                }
            }
        }
        Ok(labels)
    }
}

/// Output of the detection collaborator for one image
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub masks: InstanceMaskSet,
    pub class_ids: Vec<u32>,
}

impl Detection {
    pub fn new(masks: InstanceMaskSet, class_ids: Vec<u32>) -> Self {
        Self { masks, class_ids }
    }

    /// No instances on a `width x height` canvas
    pub fn none(width: u32, height: u32) -> Self {
        Self::new(InstanceMaskSet::empty(width, height), Vec::new())
    }

    pub fn instance_count(&self) -> usize {
        self.masks.len()
    }
}

/// A packed 8-bit BGR frame, the channel order video decoders and encoders
/// exchange. Converted to and from RGB at the stream boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct BgrFrame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl BgrFrame {
    pub fn new(index: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            index,
            width,
            height,
            data,
        }
    }

    /// Byte length of one `width x height` BGR frame
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    pub fn from_rgb(index: u64, image: &RgbImage) -> Self {
        let mut data = image.as_raw().clone();
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
        Self::new(index, image.width(), image.height(), data)
    }

    pub fn to_rgb(&self) -> Result<RgbImage> {
        let mut data = self.data.clone();
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
        RgbImage::from_raw(self.width, self.height, data).ok_or_else(|| {
            SplashError::Stream(format!(
                "frame {} holds {} bytes, expected {} for {}x{}",
                self.index,
                self.data.len(),
                Self::byte_len(self.width, self.height),
                self.width,
                self.height
            ))
        })
    }
}
