use image::{GrayImage, Luma, Rgb, RgbImage};
use tracing::debug;

use crate::{
    error::{Result, SplashError},
    types::InstanceMaskSet,
};

/// ITU-R BT.709 luminance weights in units of 1/10000.
///
/// Integer arithmetic is exact for pure gray input (`v, v, v` maps to `v`).
/// A float path that scales a 0-1 luminance by 255 and truncates can land
/// one below for some of those inputs, e.g. 97 becomes 96.99999 and then 96.
const LUMA_WEIGHTS: [u32; 3] = [2125, 7154, 721];

/// Figures computed alongside a splash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplashStats {
    /// Otsu threshold of the grayscale image
    pub threshold: u8,
    /// Pixels whose gray value exceeds `threshold`
    pub bright_pixels: usize,
    /// Pixels covered by at least one instance
    pub foreground_pixels: usize,
}

/// Keeps original color under the instance masks and desaturates the rest
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorSplash;

impl ColorSplash {
    /// Composite `image` against `masks`, returning a new image
    pub fn apply(&self, image: &RgbImage, masks: &InstanceMaskSet) -> Result<RgbImage> {
        self.apply_with_stats(image, masks).map(|(splash, _)| splash)
    }

    pub fn apply_with_stats(
        &self,
        image: &RgbImage,
        masks: &InstanceMaskSet,
    ) -> Result<(RgbImage, SplashStats)> {
        let (width, height) = image.dimensions();
        for (layer, mask) in masks.layers().iter().enumerate() {
            if mask.dimensions() != (width, height) {
                return Err(SplashError::DimensionMismatch {
                    layer,
                    expected: (height, width),
                    found: (mask.height(), mask.width()),
                });
            }
        }

        let luma = luminance(image);
        let threshold = imageproc::contrast::otsu_level(&luma);
        // The bright selector is evaluated but the background emitted below
        // is the gray value itself, not a binarized image.
        let bright_pixels = luma.pixels().filter(|p| p[0] > threshold).count();
        let gray = gray_to_rgb(&luma);

        if masks.is_empty() {
            let stats = SplashStats {
                threshold,
                bright_pixels,
                foreground_pixels: 0,
            };
            debug!("Splash without instances: {:?}", stats);
            return Ok((gray, stats));
        }

        if (masks.width(), masks.height()) != (width, height) {
            return Err(SplashError::DimensionMismatch {
                layer: 0,
                expected: (height, width),
                found: (masks.height(), masks.width()),
            });
        }

        let foreground = masks.union();
        let splash = RgbImage::from_fn(width, height, |x, y| {
            if foreground.get_pixel(x, y)[0] != 0 {
                *image.get_pixel(x, y)
            } else {
                *gray.get_pixel(x, y)
            }
        });

        let stats = SplashStats {
            threshold,
            bright_pixels,
            foreground_pixels: foreground.pixels().filter(|p| p[0] != 0).count(),
        };
        debug!("Splash over {} instances: {:?}", masks.len(), stats);
        Ok((splash, stats))
    }
}

/// Truncated 0-255 luminance of every pixel
pub fn luminance(image: &RgbImage) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let Rgb([r, g, b]) = *image.get_pixel(x, y);
        let weighted = LUMA_WEIGHTS[0] * u32::from(r)
            + LUMA_WEIGHTS[1] * u32::from(g)
            + LUMA_WEIGHTS[2] * u32::from(b);
        Luma([(weighted / 10_000) as u8])
    })
}

/// Luminance replicated across three channels
pub fn grayscale(image: &RgbImage) -> RgbImage {
    gray_to_rgb(&luminance(image))
}

fn gray_to_rgb(luma: &GrayImage) -> RgbImage {
    RgbImage::from_fn(luma.width(), luma.height(), |x, y| {
        let value = luma.get_pixel(x, y)[0];
        Rgb([value, value, value])
    })
}
