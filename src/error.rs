//! Error taxonomy for a single pipeline run

use serde::{Deserialize, Serialize};

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every way a run can end without a transcript.
///
/// All variants are terminal for the run that produced them. The presentation
/// layer shows [`PipelineError::user_message`] in place of the transcript.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),

    #[error("Uploaded file is empty")]
    EmptyUpload,

    #[error("Audio extraction failed: {0}")]
    ExtractionFailure(String),

    #[error("Extracted audio is empty")]
    EmptyAudio,

    #[error("Speech could not be recognized")]
    Unrecognized,

    #[error("Speech recognition service error: {0}")]
    ServiceError(String),

    #[error("Error reading audio file: {0}")]
    UnexpectedIo(String),

    #[error("Run workspace error: {0}")]
    Workspace(#[from] std::io::Error),
}

/// Stable classification of [`PipelineError`] used by the HTTP layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedFormat,
    EmptyUpload,
    ExtractionFailure,
    EmptyAudio,
    Unrecognized,
    ServiceError,
    UnexpectedIo,
    Workspace,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            PipelineError::EmptyUpload => ErrorKind::EmptyUpload,
            PipelineError::ExtractionFailure(_) => ErrorKind::ExtractionFailure,
            PipelineError::EmptyAudio => ErrorKind::EmptyAudio,
            PipelineError::Unrecognized => ErrorKind::Unrecognized,
            PipelineError::ServiceError(_) => ErrorKind::ServiceError,
            PipelineError::UnexpectedIo(_) => ErrorKind::UnexpectedIo,
            PipelineError::Workspace(_) => ErrorKind::Workspace,
        }
    }

    /// Message shown to the end user instead of a transcript
    pub fn user_message(&self) -> String {
        match self {
            PipelineError::UnsupportedFormat(ext) => format!(
                "Unsupported video format '{}'. Please upload an mp4, avi, mov or mkv file.",
                ext
            ),
            PipelineError::EmptyUpload => "The uploaded file is empty.".to_string(),
            PipelineError::ExtractionFailure(message) => {
                format!("Could not extract audio from the video: {}", message)
            }
            PipelineError::EmptyAudio => {
                "Extracted audio is empty. Please use a video with clear audio.".to_string()
            }
            PipelineError::Unrecognized => {
                "Speech recognition could not understand the audio".to_string()
            }
            PipelineError::ServiceError(message) => format!(
                "Could not request results from the speech recognition service; {}",
                message
            ),
            PipelineError::UnexpectedIo(message) => {
                format!("Error reading audio file: {}", message)
            }
            PipelineError::Workspace(e) => format!("Could not store the upload: {}", e),
        }
    }

    /// True when the user can fix the problem by supplying a different video
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnsupportedFormat(_)
                | PipelineError::EmptyUpload
                | PipelineError::ExtractionFailure(_)
                | PipelineError::EmptyAudio
                | PipelineError::Unrecognized
        )
    }
}
