use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplashError {
    #[error("Invalid subset '{0}': expected 'train' or 'val'")]
    InvalidSubset(String),

    #[error("Missing or unreadable image file {path}: {source}")]
    MissingImageFile {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid polygon: {vertices} vertices, at least 3 required")]
    InvalidPolygon { vertices: usize },

    #[error("Dimension mismatch on mask layer {layer}: image is {expected:?}, mask is {found:?}")]
    DimensionMismatch {
        layer: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Failed to parse annotation file {path}: {source}")]
    AnnotationParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Too many instances for an 8-bit label map: {count}, at most 255")]
    TooManyInstances { count: usize },

    #[error("Unknown image id: {0}")]
    UnknownImage(String),

    #[error("Detection failed: {0}")]
    Detection(String),

    #[error("Frame stream error: {0}")]
    Stream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, SplashError>;
