//! Upload acceptance: container allow-list and persisting the upload

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::workspace::RunWorkspace;

/// Video containers accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoContainer {
    Mp4,
    Avi,
    Mov,
    Mkv,
}

impl VideoContainer {
    pub const ALL: [VideoContainer; 4] = [
        VideoContainer::Mp4,
        VideoContainer::Avi,
        VideoContainer::Mov,
        VideoContainer::Mkv,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            VideoContainer::Mp4 => "mp4",
            VideoContainer::Avi => "avi",
            VideoContainer::Mov => "mov",
            VideoContainer::Mkv => "mkv",
        }
    }

    /// Container for a file name such as `holiday.MOV`
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        extension.parse()
    }
}

impl FromStr for VideoContainer {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().trim_start_matches('.').to_ascii_lowercase();
        VideoContainer::ALL
            .into_iter()
            .find(|container| container.extension() == normalized)
            .ok_or_else(|| PipelineError::UnsupportedFormat(s.to_string()))
    }
}

impl fmt::Display for VideoContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Raw upload plus its declared container
#[derive(Clone)]
pub struct UploadedVideo {
    bytes: Vec<u8>,
    container: VideoContainer,
}

impl UploadedVideo {
    /// Accept an upload, enforcing the allow-list and rejecting empty bodies
    pub fn new(bytes: Vec<u8>, extension: &str) -> Result<Self> {
        let container = extension.parse()?;
        if bytes.is_empty() {
            return Err(PipelineError::EmptyUpload);
        }
        Ok(Self { bytes, container })
    }

    pub fn container(&self) -> VideoContainer {
        self.container
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex MD5 of the upload, used to correlate runs in logs
    pub fn fingerprint(&self) -> String {
        format!("{:x}", md5::compute(&self.bytes))
    }
}

impl fmt::Debug for UploadedVideo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadedVideo")
            .field("container", &self.container)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Write the upload into the run workspace, consuming its bytes
pub async fn ingest(workspace: &mut RunWorkspace, upload: UploadedVideo) -> Result<PathBuf> {
    info!(
        "📥 Received {} upload ({:.1} MB, md5 {})",
        upload.container,
        upload.len() as f64 / 1_000_000.0,
        upload.fingerprint()
    );

    let UploadedVideo { bytes, container } = upload;
    workspace.store_video(bytes, container).await
}
