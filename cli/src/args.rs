use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::MaskSource;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (.toml or .json)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Args)]
pub struct MaskArgs {
    /// Directory of `<stem>.png` label maps
    #[arg(long, conflicts_with = "dataset")]
    pub masks: Option<PathBuf>,
    /// Annotated dataset root; ground truth polygons become the masks
    #[arg(long)]
    pub dataset: Option<PathBuf>,
    /// Subset of the dataset root to load
    #[arg(long, default_value = "val")]
    pub subset: String,
}

impl MaskArgs {
    pub fn source(&self) -> MaskSource {
        MaskSource::from_args(self.masks.clone(), self.dataset.clone(), &self.subset)
    }
}

/// Mask sources usable for stream frames. Frames have no source path, so
/// ground truth lookup is not offered.
#[derive(clap::Args)]
pub struct StreamMaskArgs {
    /// Directory of `frame_NNNNNN.png` label maps
    #[arg(long)]
    pub masks: Option<PathBuf>,
}

impl StreamMaskArgs {
    pub fn source(&self) -> MaskSource {
        match &self.masks {
            Some(dir) => MaskSource::Directory(dir.clone()),
            None => MaskSource::None,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load an annotated subset and print what was kept and discarded
    Inspect {
        /// Dataset root containing `train/` and `val/`
        #[arg(short, long)]
        dataset: PathBuf,
        #[arg(short, long, default_value = "train")]
        subset: String,
        /// Print the loaded records as JSON instead
        #[arg(long)]
        json: bool,
    },
    /// Rasterize ground truth polygons into label-map PNGs
    Masks {
        #[arg(short, long)]
        dataset: PathBuf,
        #[arg(short, long, default_value = "train")]
        subset: String,
        #[arg(short, long = "output")]
        output_dir: PathBuf,
    },
    /// Color-splash still images
    Images {
        /// Images to process, comma separated or repeated
        #[arg(short, long, value_delimiter = ',', required = true)]
        images: Vec<PathBuf>,
        #[arg(short, long = "output", default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        masks: MaskArgs,
    },
    /// Color-splash every frame of a video
    Video {
        #[arg(short, long)]
        video: PathBuf,
        #[arg(short, long = "output", default_value = ".")]
        output_dir: PathBuf,
        #[command(flatten)]
        masks: StreamMaskArgs,
    },
    /// Print the JSON schema of the configuration file
    Schema,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_video_rejects_dataset_masks() {
        let result = Cli::try_parse_from([
            "splash", "video", "--video", "in.mp4", "--dataset", "datasets/reported",
        ]);
        let err = result.err().expect("Should reject --dataset for video");
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn test_video_accepts_mask_directory() {
        let cli = Cli::try_parse_from(["splash", "video", "--video", "in.mp4", "--masks", "m"])
            .expect("Should parse");
        match cli.command {
            Commands::Video { masks, .. } => {
                assert_eq!(masks.source(), MaskSource::Directory("m".into()))
            }
            _ => panic!("Should parse the video command"),
        }
    }

    #[test]
    fn test_images_accept_dataset_masks() {
        let cli = Cli::try_parse_from([
            "splash", "images", "--images", "a.jpg,b.jpg", "--dataset", "d", "--subset", "train",
        ])
        .expect("Should parse");
        match cli.command {
            Commands::Images { images, masks, .. } => {
                assert_eq!(images.len(), 2);
                assert_eq!(
                    masks.source(),
                    MaskSource::Dataset { dir: "d".into(), subset: "train".to_string() }
                );
            }
            _ => panic!("Should parse the images command"),
        }
    }
}
