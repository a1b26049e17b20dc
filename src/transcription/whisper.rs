//! OpenAI-compatible `/v1/audio/transcriptions` backend

use anyhow::Result;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{info, warn};

use super::{
    build_http_client, describe_request_error, describe_status_error, SpeechBackend,
    TranscriptionResult,
};
use crate::audio::ExtractedAudio;
use crate::config::TranscriptionConfig;

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Uploads the WAV to a Whisper-style transcription endpoint
pub struct WhisperApiBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl WhisperApiBackend {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            endpoint: config.endpoint().to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }
}

/// Whisper takes ISO 639-1 codes, so `en-GB` becomes `en`
fn primary_subtag(language: &str) -> String {
    language
        .split('-')
        .next()
        .unwrap_or(language)
        .to_ascii_lowercase()
}

#[async_trait]
impl SpeechBackend for WhisperApiBackend {
    async fn recognize(&self, audio: &ExtractedAudio, language: &str) -> TranscriptionResult {
        let wav = match audio.to_wav_bytes() {
            Ok(wav) => wav,
            Err(e) => return TranscriptionResult::ServiceError(e.to_string()),
        };

        let file_part = match Part::bytes(wav).file_name("audio.wav").mime_str("audio/wav") {
            Ok(part) => part,
            Err(e) => return TranscriptionResult::ServiceError(e.to_string()),
        };

        let form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", primary_subtag(language))
            .text("response_format", "json");

        info!(
            "🎤 Sending {:.1}s of audio to {} ({})",
            audio.info().duration().as_secs_f64(),
            self.endpoint,
            self.model
        );

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Whisper request failed: {}", e);
                return TranscriptionResult::ServiceError(describe_request_error(&e));
            }
        };

        if !response.status().is_success() {
            return TranscriptionResult::ServiceError(describe_status_error(response).await);
        }

        match response.json::<TranscriptionResponse>().await {
            Ok(body) => {
                let text = body.text.trim();
                if text.is_empty() {
                    TranscriptionResult::Unrecognized
                } else {
                    TranscriptionResult::Success(text.to_string())
                }
            }
            Err(e) => TranscriptionResult::ServiceError(format!(
                "malformed response from speech service: {}",
                e
            )),
        }
    }

    fn name(&self) -> &'static str {
        "whisper"
    }
}
