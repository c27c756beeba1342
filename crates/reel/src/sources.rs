use std::io::{ErrorKind, Read};
use std::process::{Child, ChildStdout};

use splash::{BgrFrame, FrameSource, SplashError};
use tracing::debug;

use crate::{DriverError, Result, VideoMetadata};

/// Raw BGR frames read from an `ffmpeg` decoder's stdout
#[derive(Debug)]
pub struct FFmpegFrameSource {
    child: Child,
    stdout: ChildStdout,
    metadata: VideoMetadata,
    next_index: u64,
    done: bool,
}

impl FFmpegFrameSource {
    pub(crate) fn new(mut child: Child, metadata: VideoMetadata) -> Result<Self> {
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DriverError::Execution("Decoder stdout is not piped".to_string()));
            }
        };

        Ok(Self {
            child,
            stdout,
            metadata,
            next_index: 0,
            done: false,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Reap the decoder after its output ended
    fn close(&mut self) -> Result<()> {
        self.done = true;
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(DriverError::Execution(format!("Decoder exited with {}", status)))
        }
    }
}

/// Fill `buf` from `reader`, returning how many bytes arrived before EOF
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl FrameSource for FFmpegFrameSource {
    fn read_frame(&mut self) -> splash::Result<Option<BgrFrame>> {
        if self.done {
            return Ok(None);
        }

        let mut data = vec![0u8; self.metadata.frame_len()];
        let filled = match read_full(&mut self.stdout, &mut data) {
            Ok(filled) => filled,
            Err(e) => {
                self.done = true;
                return Err(SplashError::Stream(format!("Failed to read frame: {}", e)));
            }
        };

        if filled == 0 {
            debug!("Decoder reached end of stream after {} frames", self.next_index);
            self.close()?;
            return Ok(None);
        }
        if filled < data.len() {
            let _ = self.close();
            return Err(SplashError::Stream(format!(
                "Truncated frame {}: {} of {} bytes",
                self.next_index,
                filled,
                data.len()
            )));
        }

        let frame = BgrFrame::new(self.next_index, self.metadata.width, self.metadata.height, data);
        self.next_index += 1;
        Ok(Some(frame))
    }
}

impl Drop for FFmpegFrameSource {
    fn drop(&mut self) {
        if !self.done {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Hands out at most `chunk` bytes per read
    struct Trickle {
        inner: Cursor<Vec<u8>>,
        chunk: usize,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let limit = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..limit])
        }
    }

    #[test]
    fn test_read_full_across_short_reads() {
        let mut reader = Trickle { inner: Cursor::new((0..10).collect()), chunk: 3 };
        let mut buf = [0u8; 6];
        assert_eq!(read_full(&mut reader, &mut buf).expect("Should read"), 6);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5]);

        let mut rest = [0u8; 6];
        assert_eq!(read_full(&mut reader, &mut rest).expect("Should read"), 4);
        assert_eq!(read_full(&mut reader, &mut rest).expect("Should read"), 0);
    }
}
