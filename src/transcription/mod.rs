pub mod google;
pub mod whisper;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::ExtractedAudio;
use crate::config::{TranscriptionConfig, TranscriptionProvider};
use crate::error::PipelineError;

pub use google::GoogleSpeechBackend;
pub use whisper::WhisperApiBackend;

/// Outcome of one recognition request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum TranscriptionResult {
    /// Backend understood the audio
    Success(String),
    /// Backend answered but mapped no audio to text
    Unrecognized,
    /// Network or backend-side failure
    ServiceError(String),
}

impl TranscriptionResult {
    /// Recognized text, or the matching pipeline error
    pub fn into_text(self) -> std::result::Result<String, PipelineError> {
        match self {
            TranscriptionResult::Success(text) => Ok(text),
            TranscriptionResult::Unrecognized => Err(PipelineError::Unrecognized),
            TranscriptionResult::ServiceError(message) => Err(PipelineError::ServiceError(message)),
        }
    }
}

/// Speech-to-text backend.
///
/// Implementations make a single request with no retry; every failure is
/// folded into [`TranscriptionResult::ServiceError`].
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn recognize(&self, audio: &ExtractedAudio, language: &str) -> TranscriptionResult;

    fn name(&self) -> &'static str;
}

/// Create the backend selected in the configuration
pub fn create_backend(config: &TranscriptionConfig) -> Result<Arc<dyn SpeechBackend>> {
    match config.provider {
        TranscriptionProvider::Google => Ok(Arc::new(GoogleSpeechBackend::new(config)?)),
        TranscriptionProvider::Whisper => Ok(Arc::new(WhisperApiBackend::new(config)?)),
    }
}

pub(crate) fn build_http_client(config: &TranscriptionConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if config.request_timeout_seconds > 0 {
        builder = builder.timeout(Duration::from_secs(config.request_timeout_seconds));
    }
    Ok(builder.build()?)
}

/// Describe a transport failure for the user
pub(crate) fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}

/// Describe a non-success HTTP response for the user
pub(crate) async fn describe_status_error(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        format!("recognition request failed with status {}", status)
    } else {
        let snippet: String = body.chars().take(200).collect();
        format!("recognition request failed with status {}: {}", status, snippet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_text_maps_variants() {
        assert_eq!(
            TranscriptionResult::Success("hello".to_string()).into_text().unwrap(),
            "hello"
        );
        assert!(matches!(
            TranscriptionResult::Unrecognized.into_text(),
            Err(PipelineError::Unrecognized)
        ));
        assert!(matches!(
            TranscriptionResult::ServiceError("boom".to_string()).into_text(),
            Err(PipelineError::ServiceError(msg)) if msg == "boom"
        ));
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(TranscriptionResult::Success("hi".to_string())).unwrap();
        assert_eq!(json, serde_json::json!({"status": "success", "detail": "hi"}));

        let json = serde_json::to_value(TranscriptionResult::Unrecognized).unwrap();
        assert_eq!(json, serde_json::json!({"status": "unrecognized"}));
    }

    #[test]
    fn test_create_backend_by_provider() {
        let mut config = TranscriptionConfig::default();
        assert_eq!(create_backend(&config).unwrap().name(), "google");

        config.provider = TranscriptionProvider::Whisper;
        assert_eq!(create_backend(&config).unwrap().name(), "whisper");
    }
}
