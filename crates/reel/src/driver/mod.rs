use std::path::Path;
use std::process::{Command, Stdio};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    sinks::FFmpegFrameSink, sources::FFmpegFrameSource, DriverError, Result, VideoMetadata,
};

/// Frame rate used when the container does not report a usable one
pub const FALLBACK_FRAMERATE: f64 = 25.0;

/// Locates `ffmpeg`/`ffprobe` and spawns decoder and encoder processes
#[derive(Debug, Clone)]
pub struct FFmpegDriver {
    ffmpeg_path: String,
    ffprobe_path: String,
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

impl FFmpegDriver {
    /// Find both executables on `PATH` or in common install locations
    pub fn new() -> Result<Self> {
        Ok(Self {
            ffmpeg_path: Self::find_executable("ffmpeg")?,
            ffprobe_path: Self::find_executable("ffprobe")?,
        })
    }

    /// Use explicit executables, falling back to discovery for any left out
    pub fn with_paths(ffmpeg_path: Option<&str>, ffprobe_path: Option<&str>) -> Result<Self> {
        let resolve = |configured: Option<&str>, name: &str| -> Result<String> {
            match configured {
                Some(path) if Path::new(path).exists() => Ok(path.to_string()),
                Some(path) => Err(DriverError::Initialization(format!(
                    "{} executable not found at: {}",
                    name, path
                ))),
                None => Self::find_executable(name),
            }
        };

        Ok(Self {
            ffmpeg_path: resolve(ffmpeg_path, "ffmpeg")?,
            ffprobe_path: resolve(ffprobe_path, "ffprobe")?,
        })
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    pub fn ffprobe_path(&self) -> &str {
        &self.ffprobe_path
    }

    fn find_executable(name: &str) -> Result<String> {
        // Try to find the executable in PATH
        if let Ok(output) = Command::new("which").arg(name).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Ok(path);
                }
            }
        }

        let common_dirs = ["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];
        for dir in common_dirs {
            let candidate = Path::new(dir).join(name);
            if candidate.exists() {
                return Ok(candidate.to_string_lossy().into_owned());
            }
        }

        Err(DriverError::Initialization(format!(
            "{} executable not found. Please install FFmpeg or specify the path.",
            name
        )))
    }

    /// Read width, height and frame rate of the first video stream
    pub fn probe(&self, input: &Path) -> Result<VideoMetadata> {
        if !input.exists() {
            return Err(DriverError::Probe(format!("Input file not found: {}", input.display())));
        }

        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.args(probe_args(input));
        cmd.env_remove("DYLD_LIBRARY_PATH");
        debug!("Executing ffprobe command: {:?}", cmd);

        let output = cmd.output()
            .map_err(|e| DriverError::Execution(format!("Failed to execute ffprobe: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DriverError::Probe(format!("ffprobe failed: {}", stderr.trim())));
        }

        parse_probe_output(&output.stdout)
    }

    /// Start decoding `input` into raw BGR frames
    pub fn open_source(&self, input: &Path) -> Result<FFmpegFrameSource> {
        let metadata = self.probe(input)?;
        info!(
            "Opened {} ({}x{} @ {:.2} fps)",
            input.display(),
            metadata.width,
            metadata.height,
            metadata.framerate
        );

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(decode_args(input))
            .env_remove("DYLD_LIBRARY_PATH")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        debug!("Spawning decoder: {:?}", cmd);

        let child = cmd.spawn()
            .map_err(|e| DriverError::Execution(format!("Failed to spawn ffmpeg decoder: {}", e)))?;
        FFmpegFrameSource::new(child, metadata)
    }

    /// Start an encoder writing `output` with the geometry and rate of
    /// `metadata`
    pub fn open_sink(&self, output: &Path, metadata: &VideoMetadata) -> Result<FFmpegFrameSink> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(encode_args(output, metadata))
            .env_remove("DYLD_LIBRARY_PATH")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        debug!("Spawning encoder: {:?}", cmd);

        let child = cmd.spawn()
            .map_err(|e| DriverError::Execution(format!("Failed to spawn ffmpeg encoder: {}", e)))?;
        FFmpegFrameSink::new(child, output.to_path_buf(), metadata.clone())
    }
}

pub(crate) fn probe_args(input: &Path) -> Vec<String> {
    vec![
        "-v".into(), "error".into(),
        "-select_streams".into(), "v:0".into(),
        "-show_entries".into(), "stream=width,height,r_frame_rate,avg_frame_rate".into(),
        "-of".into(), "json".into(),
        input.to_string_lossy().into_owned(),
    ]
}

pub(crate) fn decode_args(input: &Path) -> Vec<String> {
    vec![
        "-v".into(), "error".into(),
        "-i".into(), input.to_string_lossy().into_owned(),
        "-f".into(), "rawvideo".into(),
        "-pix_fmt".into(), "bgr24".into(),
        "-".into(),
    ]
}

pub(crate) fn encode_args(output: &Path, metadata: &VideoMetadata) -> Vec<String> {
    vec![
        "-y".into(),
        "-v".into(), "error".into(),
        "-f".into(), "rawvideo".into(),
        "-pix_fmt".into(), "bgr24".into(),
        "-s".into(), format!("{}x{}", metadata.width, metadata.height),
        "-r".into(), metadata.framerate.to_string(),
        "-i".into(), "-".into(),
        "-c:v".into(), "mjpeg".into(),
        "-q:v".into(), "3".into(),
        output.to_string_lossy().into_owned(),
    ]
}

/// Parse `num/den` or a plain number; `None` for zero or malformed rates
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)
        .map_err(|e| DriverError::Probe(format!("Unreadable ffprobe output: {}", e)))?;
    let stream = probe.streams
        .into_iter()
        .next()
        .ok_or_else(|| DriverError::Probe("No video stream found".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => (width, height),
        _ => return Err(DriverError::Probe("Video stream has no frame size".to_string())),
    };
    let framerate = stream.r_frame_rate.as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(FALLBACK_FRAMERATE);

    Ok(VideoMetadata { width, height, framerate })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").expect("Should parse") - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("24"), Some(24.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{"programs": [], "streams": [{"width": 1280, "height": 720, "r_frame_rate": "30/1", "avg_frame_rate": "30/1"}]}"#;
        let metadata = parse_probe_output(json).expect("Should parse probe output");
        assert_eq!(metadata, VideoMetadata { width: 1280, height: 720, framerate: 30.0 });
        assert_eq!(metadata.frame_len(), 1280 * 720 * 3);
    }

    #[test]
    fn test_probe_output_falls_back_on_rate() {
        let json = br#"{"streams": [{"width": 64, "height": 48, "r_frame_rate": "0/0", "avg_frame_rate": "0/0"}]}"#;
        let metadata = parse_probe_output(json).expect("Should parse probe output");
        assert_eq!(metadata.framerate, FALLBACK_FRAMERATE);
    }

    #[test]
    fn test_probe_output_without_stream() {
        assert!(matches!(parse_probe_output(br#"{"streams": []}"#), Err(DriverError::Probe(_))));
        assert!(matches!(parse_probe_output(b"not json"), Err(DriverError::Probe(_))));
        assert!(matches!(
            parse_probe_output(br#"{"streams": [{"r_frame_rate": "25/1"}]}"#),
            Err(DriverError::Probe(_))
        ));
    }

    #[test]
    fn test_decode_args_request_bgr_frames() {
        let args = decode_args(Path::new("in.mp4"));
        assert_eq!(args[3], "in.mp4");
        assert!(args.windows(2).any(|w| w[0] == "-pix_fmt" && w[1] == "bgr24"));
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_encode_args_match_metadata() {
        let metadata = VideoMetadata { width: 320, height: 240, framerate: 12.5 };
        let args = encode_args(Path::new("splash_20240101T000000.avi"), &metadata);
        assert!(args.windows(2).any(|w| w[0] == "-s" && w[1] == "320x240"));
        assert!(args.windows(2).any(|w| w[0] == "-r" && w[1] == "12.5"));
        assert!(args.windows(2).any(|w| w[0] == "-c:v" && w[1] == "mjpeg"));
        assert_eq!(args.last().map(String::as_str), Some("splash_20240101T000000.avi"));
    }

    #[test]
    fn test_explicit_missing_executable_is_rejected() {
        let result = FFmpegDriver::with_paths(Some("/nonexistent/ffmpeg"), Some("/nonexistent/ffprobe"));
        assert!(matches!(result, Err(DriverError::Initialization(_))));
    }
}
