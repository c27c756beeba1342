use image::{GrayImage, Luma};

use crate::{
    error::Result,
    types::{InstanceMaskSet, Polygon, MASK_ON},
};

/// Scanline polygon filler.
///
/// A pixel is inside when its center lies inside the polygon. Crossings are
/// half-open in y and pixels are filled over `[left, right)` in x, so
/// adjacent polygons sharing an edge do not both claim it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolygonRasterizer;

impl PolygonRasterizer {
    /// Fill each polygon into its own layer, in input order. Layers may
    /// overlap; no occlusion is resolved here.
    pub fn rasterize(&self, polygons: &[Polygon], height: u32, width: u32) -> Result<InstanceMaskSet> {
        let mut masks = InstanceMaskSet::empty(width, height);
        for polygon in polygons {
            masks.push(self.fill(polygon, height, width)?);
        }
        Ok(masks)
    }

    /// Fill one polygon into a `width x height` mask. Parts outside the
    /// canvas are clipped.
    pub fn fill(&self, polygon: &Polygon, height: u32, width: u32) -> Result<GrayImage> {
        polygon.validate()?;

        let points = &polygon.points;
        let mut mask = GrayImage::new(width, height);
        let mut crossings: Vec<f64> = Vec::with_capacity(points.len());

        for y in 0..height {
            let scan_y = f64::from(y) + 0.5;
            crossings.clear();

            for (i, &[x0, y0]) in points.iter().enumerate() {
                let [x1, y1] = points[(i + 1) % points.len()];
                if (y0 <= scan_y) != (y1 <= scan_y) {
                    crossings.push(x0 + (scan_y - y0) * (x1 - x0) / (y1 - y0));
                }
            }
            crossings.sort_by(|a, b| a.total_cmp(b));

            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil().max(0.0);
                let end = (span[1] - 0.5).ceil().min(f64::from(width));
                if start >= end {
                    continue;
                }
                for x in start as u32..end as u32 {
                    mask.put_pixel(x, y, Luma([MASK_ON]));
                }
            }
        }

        Ok(mask)
    }
}
