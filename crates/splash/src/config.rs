use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SplashError};

/// Top-level configuration, passed explicitly to the components that need it
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SplashConfig {
    pub dataset: DatasetConfig,
    pub output: OutputConfig,
}

/// How annotation directories are interpreted
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    /// Source name stamped on every loaded record
    pub source: String,
    /// Extension of the image paired with each annotation file
    pub image_extension: String,
    /// Lookup vocabulary: shape label -> class id. Shapes whose label is
    /// not a key here are dropped.
    pub labels: BTreeMap<String, u32>,
    /// Class names registered with the dataset
    pub classes: Vec<ClassEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ClassEntry {
    pub id: u32,
    pub name: String,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        // The lookup key for class 2 differs from its registered name
        // ("blcoked" vs "blocked"); shapes spelled correctly are dropped.
        let labels = BTreeMap::from([
            ("blocked bike lane".to_string(), 1),
            ("blcoked the crosswalk".to_string(), 2),
        ]);

        Self {
            source: "reported".to_string(),
            image_extension: "jpg".to_string(),
            labels,
            classes: vec![
                ClassEntry {
                    id: 1,
                    name: "blocked bike lane".to_string(),
                },
                ClassEntry {
                    id: 2,
                    name: "blocked the crosswalk".to_string(),
                },
            ],
        }
    }
}

impl DatasetConfig {
    pub fn class_id(&self, label: &str) -> Option<u32> {
        self.labels.get(label).copied()
    }
}

/// Output naming and external tool locations
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix for every written artifact
    pub prefix: String,
    /// Container extension for stream output
    pub video_extension: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: "splash_".to_string(),
            video_extension: "avi".to_string(),
            ffmpeg_path: None,
            ffprobe_path: None,
        }
    }
}

impl OutputConfig {
    /// `{prefix}{basename}.png` for a still image source
    pub fn image_output_name(&self, source: &Path) -> String {
        let base = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        format!("{}{}.png", self.prefix, base)
    }

    /// `{prefix}{timestamp}.{video_extension}` for a stream started at `at`
    pub fn stream_output_name<Tz>(&self, at: &DateTime<Tz>) -> String
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        format!(
            "{}{}.{}",
            self.prefix,
            at.format("%Y%m%dT%H%M%S"),
            self.video_extension
        )
    }
}

impl SplashConfig {
    /// Get the JSON schema for the configuration file
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(SplashConfig)
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path_ref),
            Some("json") => Self::from_json_file(path_ref),
            _ => Err(SplashError::Config(format!(
                "unsupported configuration format for {}, use .toml or .json",
                path_ref.display()
            ))),
        }
    }

    /// Convert to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Save configuration, picking the format from the file extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        let content = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => self.to_toml()?,
            Some("json") => self.to_json()?,
            _ => {
                return Err(SplashError::Config(format!(
                    "unsupported configuration format for {}, use .toml or .json",
                    path_ref.display()
                )))
            }
        };
        fs::write(path_ref, content)?;
        Ok(())
    }
}
