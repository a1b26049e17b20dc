//! Run-scoped temp files with guaranteed release

use std::path::{Path, PathBuf};
use tempfile::{TempDir, TempPath};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::Result;
use crate::ingress::VideoContainer;

/// Temp directory owned by one pipeline run.
///
/// Holds at most one video and one audio file. Every file lives under a
/// directory with a unique name, so concurrent runs sharing a temp root never
/// collide. Dropping the workspace deletes everything, which covers early
/// returns and unwinding; [`RunWorkspace::close`] does the same but reports
/// failures.
pub struct RunWorkspace {
    // Field order matters: files are removed before their directory.
    video: Option<TempPath>,
    audio: Option<TempPath>,
    dir: TempDir,
}

impl RunWorkspace {
    /// Create a fresh workspace under `root`, or the system temp dir
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("video-transcriber-run-");

        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        debug!("Created run workspace {}", dir.path().display());

        Ok(Self {
            video: None,
            audio: None,
            dir,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn video_path(&self) -> Option<&Path> {
        self.video.as_deref()
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio.as_deref()
    }

    /// Persist uploaded bytes to a new temp file and return its path
    pub(crate) async fn store_video(
        &mut self,
        bytes: Vec<u8>,
        container: VideoContainer,
    ) -> Result<PathBuf> {
        let temp_path = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&format!(".{}", container.extension()))
            .tempfile_in(self.dir.path())?
            .into_temp_path();

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        drop(file);
        drop(bytes);

        let path = temp_path.to_path_buf();
        if let Some(previous) = self.video.replace(temp_path) {
            close_quietly(previous);
        }
        Ok(path)
    }

    /// Reserve the path the extractor writes the WAV to
    pub fn reserve_audio(&mut self) -> Result<PathBuf> {
        let temp_path = tempfile::Builder::new()
            .prefix("audio-")
            .suffix(".wav")
            .tempfile_in(self.dir.path())?
            .into_temp_path();

        let path = temp_path.to_path_buf();
        if let Some(previous) = self.audio.replace(temp_path) {
            close_quietly(previous);
        }
        Ok(path)
    }

    /// Delete the video file. Callers must have closed every handle to it.
    pub fn release_video(&mut self) {
        if let Some(video) = self.video.take() {
            close_quietly(video);
        }
    }

    /// Delete the audio file, e.g. after a failed extraction
    pub fn discard_audio(&mut self) {
        if let Some(audio) = self.audio.take() {
            close_quietly(audio);
        }
    }

    /// Delete every file and the directory, reporting the first failure
    pub fn close(mut self) -> std::io::Result<()> {
        let path = self.dir.path().to_path_buf();
        self.release_video();
        self.discard_audio();

        let Self { dir, .. } = self;
        dir.close()?;
        debug!("🧹 Removed run workspace {}", path.display());
        Ok(())
    }
}

fn close_quietly(path: TempPath) {
    let shown = path.display().to_string();
    if let Err(e) = path.close() {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove temp file {}: {}", shown, e);
        }
    }
}
