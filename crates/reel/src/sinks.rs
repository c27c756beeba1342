use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin};

use splash::{BgrFrame, FrameSink, SplashError};
use tracing::{info, warn};

use crate::{DriverError, Result, VideoMetadata};

/// Encodes raw BGR frames by piping them into an `ffmpeg` child.
///
/// `finish` closes the pipe and waits for the encoder to flush. A sink
/// dropped without `finish` kills its encoder instead.
#[derive(Debug)]
pub struct FFmpegFrameSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    path: PathBuf,
    metadata: VideoMetadata,
    frames_written: u64,
}

impl FFmpegFrameSink {
    pub(crate) fn new(mut child: Child, path: PathBuf, metadata: VideoMetadata) -> Result<Self> {
        let stdin = match child.stdin.take() {
            Some(stdin) => stdin,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DriverError::Execution("Encoder stdin is not piped".to_string()));
            }
        };

        Ok(Self {
            child: Some(child),
            stdin: Some(stdin),
            path,
            metadata,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl FrameSink for FFmpegFrameSink {
    fn write_frame(&mut self, frame: &BgrFrame) -> splash::Result<()> {
        if (frame.width, frame.height) != (self.metadata.width, self.metadata.height) {
            return Err(SplashError::Stream(format!(
                "Frame {} is {}x{}, encoder expects {}x{}",
                frame.index, frame.width, frame.height, self.metadata.width, self.metadata.height
            )));
        }

        let stdin = self.stdin
            .as_mut()
            .ok_or_else(|| SplashError::Stream("Encoder input already closed".to_string()))?;
        stdin.write_all(&frame.data)
            .map_err(|e| SplashError::Stream(format!("Failed to write frame {}: {}", frame.index, e)))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(mut self) -> splash::Result<()> {
        // Closing stdin signals end of input to the encoder
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(DriverError::from)?;
        if !status.success() {
            return Err(DriverError::Execution(format!("Encoder exited with {}", status)).into());
        }

        info!("Saved {} frames to {}", self.frames_written, self.path.display());
        Ok(())
    }
}

impl Drop for FFmpegFrameSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!("Encoder for {} dropped without finish, killing it", self.path.display());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
