//! Session video capture.
//!
//! Screencast frames arrive as base64 JPEG images. They are piped into an
//! `ffmpeg` child process which encodes the MP4.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use base64::Engine;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Frames buffered between the browser and ffmpeg.
const FRAME_BUFFER: usize = 64;

/// Decode one base64 screencast frame into raw JPEG bytes.
pub fn decode_frame(data: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::STANDARD.decode(data).ok()
}

/// ffmpeg arguments: MJPEG on stdin, H.264 MP4 at `output`.
pub fn ffmpeg_args(output: &Path) -> Vec<String> {
    vec![
        "-y".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "image2pipe".into(),
        "-c:v".into(),
        "mjpeg".into(),
        "-i".into(),
        "-".into(),
        "-vf".into(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".into(),
        "-c:v".into(),
        "libx264".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        output.display().to_string(),
    ]
}

/// An ffmpeg process consuming JPEG frames.
pub struct FrameEncoder {
    frames: mpsc::Sender<Vec<u8>>,
    task: JoinHandle<Result<()>>,
    output: PathBuf,
}

impl FrameEncoder {
    /// Spawn ffmpeg writing to `output`, creating its directory.
    pub fn spawn(output: &Path) -> Result<Self> {
        let ffmpeg = which::which("ffmpeg").context("ffmpeg not found on PATH")?;

        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let mut child = tokio::process::Command::new(ffmpeg)
            .args(ffmpeg_args(output))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .context("failed to start ffmpeg")?;

        let mut stdin = child.stdin.take().context("ffmpeg stdin unavailable")?;
        let (frames, mut rx) = mpsc::channel::<Vec<u8>>(FRAME_BUFFER);

        let task = tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = stdin.write_all(&frame).await {
                    tracing::debug!(error = %e, "ffmpeg stopped accepting frames");
                    break;
                }
            }
            drop(stdin);

            let status = child.wait().await.context("failed to wait for ffmpeg")?;
            if !status.success() {
                bail!("ffmpeg exited with {status}");
            }
            Ok(())
        });

        Ok(Self {
            frames,
            task,
            output: output.to_path_buf(),
        })
    }

    /// A handle for pushing frames.
    pub fn sender(&self) -> mpsc::Sender<Vec<u8>> {
        self.frames.clone()
    }

    /// Close the input and wait for ffmpeg to finalize the file.
    ///
    /// Every sender handed out by `sender()` must be dropped first.
    pub async fn finish(self) -> Result<PathBuf> {
        drop(self.frames);
        self.task.await.context("encoder task panicked")??;
        Ok(self.output)
    }
}
