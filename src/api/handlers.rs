//! API request handlers

use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::response::sse::Event;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::models::{ApiResponse, ErrorBody, ProgressUpdate, TranscriptionResponse};
use crate::delivery::FinalTranscript;
use crate::error::{ErrorKind, PipelineError};
use crate::pipeline::{PipelineStage, ProgressSink, TranscriptionPipeline};

/// Handle health check requests
pub async fn health_check() -> Value {
    serde_json::json!({
        "status": "healthy",
        "service": "video-transcriber",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })
}

/// Error response carrying the HTTP status it maps to
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                kind: None,
                message: message.into(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

/// HTTP status for each pipeline failure
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::UnsupportedFormat => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ErrorKind::EmptyUpload => StatusCode::BAD_REQUEST,
        ErrorKind::ExtractionFailure | ErrorKind::EmptyAudio | ErrorKind::Unrecognized => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ErrorKind::ServiceError => StatusCode::BAD_GATEWAY,
        ErrorKind::UnexpectedIo | ErrorKind::Workspace => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        Self {
            status: status_for(error.kind()),
            body: ErrorBody::from(&error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::<()>::error(self.body))).into_response()
    }
}

/// Multipart form posted by the upload page
#[derive(Debug)]
pub struct TranscribeRequest {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub language: Option<String>,
}

impl TranscribeRequest {
    /// Extension of the uploaded file name, empty when there is none
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Collect the `file` and optional `language` fields
pub async fn read_upload(mut multipart: Multipart) -> Result<TranscribeRequest, ApiError> {
    let mut upload = None;
    let mut language = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                debug!("Received multipart file {:?} ({} bytes)", file_name, bytes.len());
                upload = Some((file_name, bytes.to_vec()));
            }
            Some("language") => {
                let value = field.text().await.map_err(multipart_error)?;
                language = Some(value);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| ApiError::bad_request("No video file was uploaded"))?;

    Ok(TranscribeRequest {
        file_name,
        bytes,
        language,
    })
}

fn multipart_error(error: axum::extract::multipart::MultipartError) -> ApiError {
    warn!("Rejected multipart upload: {}", error);
    ApiError {
        status: error.status(),
        body: ErrorBody {
            kind: None,
            message: error.body_text(),
        },
    }
}

/// Run the pipeline for one uploaded video
pub async fn transcribe(
    pipeline: &TranscriptionPipeline,
    request: TranscribeRequest,
) -> Result<FinalTranscript, ApiError> {
    let extension = request.extension();
    pipeline
        .transcribe(request.bytes, &extension, request.language.as_deref())
        .await
        .map_err(ApiError::from)
}

/// What a streamed run sends to the browser
#[derive(Debug)]
pub enum RunEvent {
    Progress(ProgressUpdate),
    Finished(Result<TranscriptionResponse, ErrorBody>),
}

impl RunEvent {
    pub fn to_sse(&self) -> Event {
        match self {
            RunEvent::Progress(update) => json_event("progress", update),
            RunEvent::Finished(Ok(response)) => json_event("result", response),
            RunEvent::Finished(Err(error)) => json_event("error", error),
        }
    }
}

fn json_event<T: Serialize>(name: &str, payload: &T) -> Event {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to encode {} event: {}", name, e);
            Event::default().event(name).data("{}")
        }
    }
}

/// Forwards stage transitions into a channel
pub struct ChannelProgress {
    sender: mpsc::UnboundedSender<RunEvent>,
}

impl ProgressSink for ChannelProgress {
    fn report(&self, stage: PipelineStage, message: &str) {
        // Nobody is listening once the client disconnects; the run still completes
        let _ = self
            .sender
            .send(RunEvent::Progress(ProgressUpdate::new(stage, message)));
    }
}

/// Run the pipeline on a background task, streaming its progress.
///
/// The channel closes after the final `Finished` event.
pub fn spawn_run(
    pipeline: Arc<TranscriptionPipeline>,
    request: TranscribeRequest,
) -> mpsc::UnboundedReceiver<RunEvent> {
    let (sender, receiver) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let extension = request.extension();
        let sink = ChannelProgress {
            sender: sender.clone(),
        };
        let outcome = pipeline
            .run(request.bytes, &extension, request.language.as_deref(), &sink)
            .await;

        let finished = outcome
            .map(TranscriptionResponse::from)
            .map_err(|e| ErrorBody::from(&e));
        let _ = sender.send(RunEvent::Finished(finished));
    });

    receiver
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorKind::UnsupportedFormat), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(status_for(ErrorKind::EmptyUpload), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::EmptyAudio), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::Unrecognized), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::ServiceError), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::UnexpectedIo), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_request_extension() {
        let request = TranscribeRequest {
            file_name: "Lecture.Final.MKV".to_string(),
            bytes: vec![1],
            language: None,
        };
        assert_eq!(request.extension(), "MKV");

        let request = TranscribeRequest {
            file_name: "no_extension".to_string(),
            bytes: vec![1],
            language: None,
        };
        assert_eq!(request.extension(), "");
    }

    #[tokio::test]
    async fn test_channel_progress_forwards_updates() {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let sink = ChannelProgress { sender };

        sink.report(PipelineStage::Extracted, "Audio extracted");

        match receiver.recv().await {
            Some(RunEvent::Progress(update)) => {
                assert_eq!(update.stage, PipelineStage::Extracted);
                assert_eq!(update.progress, 40);
                assert_eq!(update.message, "Audio extracted");
            }
            other => panic!("expected a progress event, got {:?}", other),
        }

        drop(receiver);
        // a closed channel is not an error for the run
        sink.report(PipelineStage::Delivered, "Transcription complete");
    }

    #[tokio::test]
    async fn test_health_payload() {
        let health = health_check().await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["service"], "video-transcriber");
    }
}
