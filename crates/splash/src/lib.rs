//! # Color Splash
//!
//! Turns polygon annotations into instance masks and composites a "color
//! splash": pixels covered by a detected object keep their color while the
//! rest of the image is desaturated.
//!
//! ## Core Features
//!
//! - **Annotation loading**: per-image annotation files filtered through a
//!   fixed label vocabulary into a read-only `Dataset`
//! - **Polygon rasterization**: scanline fill of each polygon into its own
//!   mask layer
//! - **Compositing**: luminance background with an Otsu threshold, original
//!   color wherever any instance mask is set
//! - **Frame processing**: still images or an ordered frame stream through
//!   a pluggable `Detector`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use splash::{AnnotationLoader, DatasetConfig, ColorSplash};
//!
//! let outcome = AnnotationLoader::new(DatasetConfig::default())
//!     .load("datasets/reported", "val")?;
//! let record = &outcome.dataset.records()[0];
//!
//! let (masks, _class_ids) = outcome.dataset.get_masks(record.id())?;
//! let image = image::open(record.path())?.to_rgb8();
//! ColorSplash.apply(&image, &masks)?.save("splash.png")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Frame Processing
//!
//! ```rust,no_run
//! use splash::{FrameProcessor, MaskDirectoryDetector};
//! use std::path::Path;
//!
//! let processor = FrameProcessor::builder()
//!     .detector(MaskDirectoryDetector::new("masks"))
//!     .build();
//! let report = processor.process_images(&["street.jpg"], Path::new("out"))?;
//! println!("{} written, {} failed", report.written.len(), report.failed.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Core modules
pub mod error;
pub mod types;
pub mod config;
pub mod traits;
pub mod algorithms;
pub mod dataset;
pub mod detectors;
pub mod pipeline;

// Re-exports for convenience
pub use error::{SplashError, Result};
pub use types::{BgrFrame, Detection, InstanceMaskSet, Polygon};
pub use config::{ClassEntry, DatasetConfig, OutputConfig, SplashConfig};
pub use traits::*;
pub use algorithms::*;
pub use dataset::{
    AnnotationLoader, ClassInfo, Dataset, DatasetSource, Discard, DiscardReason, ImageRecord,
    LoadOutcome, Subset,
};
pub use detectors::{GroundTruthDetector, MaskDirectoryDetector, NoDetections};
pub use pipeline::{FrameProcessor, SplashReport, StreamEnd, StreamSummary, builder::FrameProcessorBuilder};
