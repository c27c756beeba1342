use std::path::{Path, PathBuf};

use clap::Parser;
use color_eyre::eyre::{bail, Result};
use reel::FFmpegDriver;
use splash::{FrameProcessor, SplashConfig, StreamEnd};
use splash_cli::args::{Cli, Commands};
use splash_cli::{describe, export_ground_truth, load_config, load_dataset, MaskSource};
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Inspect { dataset, subset, json } => inspect(&config, dataset, subset, *json)?,
        Commands::Masks { dataset, subset, output_dir } => {
            let outcome = load_dataset(&config, dataset, subset)?;
            let written = export_ground_truth(&outcome.dataset, output_dir)?;
            info!("Wrote {} label maps to {}", written.len(), output_dir.display());
        }
        Commands::Images { images, output_dir, masks } => {
            splash_images(&config, images, output_dir, masks.source())?
        }
        Commands::Video { video, output_dir, masks } => {
            splash_video(&config, video, output_dir, masks.source())?
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&SplashConfig::schema())?);
        }
    }

    Ok(())
}

fn inspect(config: &SplashConfig, dataset: &Path, subset: &str, json: bool) -> Result<()> {
    let outcome = load_dataset(config, dataset, subset)?;
    if json {
        let records: Vec<_> = outcome
            .dataset
            .records()
            .iter()
            .map(|record| {
                serde_json::json!({
                    "id": record.id(),
                    "width": record.width(),
                    "height": record.height(),
                    "polygons": record.polygons(),
                    "class_ids": record.class_ids(),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "records": records,
                "discards": outcome.discards,
            }))?
        );
    } else {
        println!("{}", describe(&outcome));
    }
    Ok(())
}

fn build_processor(config: &SplashConfig, masks: &MaskSource) -> Result<FrameProcessor> {
    let detector = masks.build_detector(config)?;
    Ok(FrameProcessor::builder()
        .boxed_detector(detector)
        .output_config(config.output.clone())
        .build())
}

fn splash_images(
    config: &SplashConfig,
    images: &[PathBuf],
    output_dir: &Path,
    masks: MaskSource,
) -> Result<()> {
    let processor = build_processor(config, &masks)?;
    let report = processor.process_images(images, output_dir)?;

    for path in &report.written {
        info!("Saved to {}", path.display());
    }
    for (path, err) in &report.failed {
        error!("Failed on {}: {}", path.display(), err);
    }
    if report.written.is_empty() {
        bail!("none of the {} images could be processed", images.len());
    }
    Ok(())
}

fn splash_video(
    config: &SplashConfig,
    input: &Path,
    output_dir: &Path,
    masks: MaskSource,
) -> Result<()> {
    let processor = FrameProcessor::builder()
        .boxed_detector(masks.build_stream_detector(config)?)
        .output_config(config.output.clone())
        .build();
    let driver = FFmpegDriver::with_paths(
        config.output.ffmpeg_path.as_deref(),
        config.output.ffprobe_path.as_deref(),
    )?;

    let source = driver.open_source(input)?;
    let metadata = source.metadata().clone();
    info!(
        "Decoding {} ({}x{} @ {:.2} fps)",
        input.display(),
        metadata.width,
        metadata.height,
        metadata.framerate
    );

    let target = output_dir.join(config.output.stream_output_name(&chrono::Local::now()));
    let sink = driver.open_sink(&target, &metadata)?;

    let summary = processor.process_stream(source, sink)?;
    if let StreamEnd::ReadFailed(reason) = &summary.end {
        warn!("Stopped reading early: {}", reason);
    }
    info!("Saved {} frames to {}", summary.frames_written, target.display());
    Ok(())
}
