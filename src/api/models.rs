//! API data models

use serde::{Deserialize, Serialize};

use crate::delivery::FinalTranscript;
use crate::error::{ErrorKind, PipelineError};
use crate::pipeline::PipelineStage;

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

/// Failure reported in place of a transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Absent for request problems that never reached the pipeline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub message: String,
}

/// Successful transcription for on-screen display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResponse {
    pub transcript: String,
    pub raw_text: String,
    pub language: String,
    pub corrections: usize,
    pub file_name: String,
    pub mime_type: String,
}

/// Stage update streamed to the upload page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: PipelineStage,
    pub progress: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: PipelineStage, message: &str) -> Self {
        Self {
            stage,
            progress: stage.progress(),
            message: message.to_string(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: ErrorBody) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

impl From<&PipelineError> for ErrorBody {
    fn from(error: &PipelineError) -> Self {
        Self {
            kind: Some(error.kind()),
            message: error.user_message(),
        }
    }
}

impl From<FinalTranscript> for TranscriptionResponse {
    fn from(transcript: FinalTranscript) -> Self {
        let artifact = transcript.artifact();
        Self {
            file_name: artifact.file_name.to_string(),
            mime_type: artifact.mime_type.to_string(),
            transcript: transcript.text,
            raw_text: transcript.raw_text,
            language: transcript.language,
            corrections: transcript.corrections,
        }
    }
}
