//! Final transcript and its downloadable form

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::Result;

/// Name the download is offered under
pub const TRANSCRIPT_FILE_NAME: &str = "transcription.txt";

/// MIME type of the download
pub const TRANSCRIPT_MIME_TYPE: &str = "text/plain";

/// Corrected text of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalTranscript {
    /// Text after the correction pass
    pub text: String,
    /// Text as the speech backend returned it
    pub raw_text: String,
    /// Language tag the audio was recognized with
    pub language: String,
    /// Words changed by correction
    pub corrections: usize,
}

impl FinalTranscript {
    pub fn artifact(&self) -> TranscriptArtifact {
        TranscriptArtifact {
            file_name: TRANSCRIPT_FILE_NAME,
            mime_type: TRANSCRIPT_MIME_TYPE,
            content: self.text.clone().into_bytes(),
        }
    }
}

/// Downloadable `transcription.txt`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptArtifact {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub content: Vec<u8>,
}

impl TranscriptArtifact {
    /// `Content-Type` header value
    pub fn content_type(&self) -> String {
        format!("{}; charset=utf-8", self.mime_type)
    }

    /// `Content-Disposition` header value
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }

    pub async fn write_to(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, &self.content).await?;
        info!("💾 Transcript saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> FinalTranscript {
        FinalTranscript {
            text: "I am going home".to_string(),
            raw_text: "I am gong home".to_string(),
            language: "en-GB".to_string(),
            corrections: 1,
        }
    }

    #[test]
    fn test_artifact_headers() {
        let artifact = transcript().artifact();
        assert_eq!(artifact.file_name, "transcription.txt");
        assert_eq!(artifact.content, b"I am going home");
        assert_eq!(artifact.content_type(), "text/plain; charset=utf-8");
        assert_eq!(
            artifact.content_disposition(),
            "attachment; filename=\"transcription.txt\""
        );
    }

    #[tokio::test]
    async fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TRANSCRIPT_FILE_NAME);
        transcript().artifact().write_to(&path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "I am going home");
    }
}
