//! Still-frame extraction for video thumbnails
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// A representative JPEG frame of `video`; empty when none could be taken
    async fn extract_frame(&self, video: Bytes) -> Result<Bytes>;
}

/// Extracts frames by shelling out to ffmpeg
pub struct FfmpegFrameExtractor {
    ffmpeg_path: String,
    timeout: Duration,
}

/// Seek positions tried in order; clips shorter than a second fall back to 0
const SEEK_POSITIONS: [&str; 2] = ["00:00:01", "00:00:00"];

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            timeout,
        }
    }

    async fn run(&self, input: &Path, output: &Path, seek: &str) -> Result<()> {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-y", "-loglevel", "error", "-ss", seek, "-i"])
            .arg(input)
            .args(["-frames:v", "1", "-f", "image2", "-c:v", "mjpeg"])
            .arg(output)
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| anyhow!("ffmpeg timed out after {:?}", self.timeout))?
            .context("ffmpeg spawn error")?;

        if !result.status.success() {
            return Err(anyhow!(
                "ffmpeg frame extraction failed: {}",
                String::from_utf8_lossy(&result.stderr).trim()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(&self, video: Bytes) -> Result<Bytes> {
        let input = tempfile::Builder::new()
            .prefix("message-hub-video-")
            .tempfile()
            .context("create video temp file")?;
        let output = tempfile::Builder::new()
            .prefix("message-hub-frame-")
            .suffix(".jpg")
            .tempfile()
            .context("create frame temp file")?;

        tokio::fs::write(input.path(), &video)
            .await
            .context("write video temp file")?;

        for seek in SEEK_POSITIONS {
            self.run(input.path(), output.path(), seek).await?;

            let frame = tokio::fs::read(output.path())
                .await
                .context("read extracted frame")?;
            if !frame.is_empty() {
                debug!(seek, size = frame.len(), "video frame extracted");
                return Ok(Bytes::from(frame));
            }
        }

        Ok(Bytes::new())
    }
}
