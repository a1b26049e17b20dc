//! Google Web Speech API v2 backend

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{
    build_http_client, describe_request_error, describe_status_error, SpeechBackend,
    TranscriptionResult,
};
use crate::audio::ExtractedAudio;
use crate::config::TranscriptionConfig;

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    result: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternative: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: Option<String>,
    confidence: Option<f64>,
}

/// Posts raw `audio/l16` samples to the speech-api v2 recognize endpoint
pub struct GoogleSpeechBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl GoogleSpeechBackend {
    pub fn new(config: &TranscriptionConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            endpoint: config.endpoint().to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn request_url(&self, language: &str) -> std::result::Result<url::Url, url::ParseError> {
        let mut params = vec![
            ("client", "chromium"),
            ("lang", language),
            ("output", "json"),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.as_str()));
        }
        url::Url::parse_with_params(&self.endpoint, &params)
    }
}

#[async_trait]
impl SpeechBackend for GoogleSpeechBackend {
    async fn recognize(&self, audio: &ExtractedAudio, language: &str) -> TranscriptionResult {
        let url = match self.request_url(language) {
            Ok(url) => url,
            Err(e) => {
                return TranscriptionResult::ServiceError(format!(
                    "invalid endpoint {}: {}",
                    self.endpoint, e
                ))
            }
        };

        info!(
            "🎤 Sending {:.1}s of audio to Google speech ({})",
            audio.info().duration().as_secs_f64(),
            language
        );

        let response = match self
            .client
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("audio/l16; rate={}", audio.sample_rate()),
            )
            .body(audio.to_l16_bytes())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Google speech request failed: {}", e);
                return TranscriptionResult::ServiceError(describe_request_error(&e));
            }
        };

        if !response.status().is_success() {
            return TranscriptionResult::ServiceError(describe_status_error(response).await);
        }

        match response.text().await {
            Ok(body) => parse_response(&body),
            Err(e) => TranscriptionResult::ServiceError(describe_request_error(&e)),
        }
    }

    fn name(&self) -> &'static str {
        "google"
    }
}

/// Parse the newline-delimited JSON body.
///
/// The service streams an empty `{"result":[]}` line before the real answer;
/// the first line with a non-empty `result` wins.
fn parse_response(body: &str) -> TranscriptionResult {
    for line in body.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let parsed: RecognizeResponse = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("Unparseable speech response line {:?}: {}", line, e);
                return TranscriptionResult::ServiceError(format!(
                    "malformed response from speech service: {}",
                    e
                ));
            }
        };

        if let Some(result) = parsed.result.into_iter().next() {
            return best_transcript(result.alternative)
                .map(TranscriptionResult::Success)
                .unwrap_or(TranscriptionResult::Unrecognized);
        }
    }

    TranscriptionResult::Unrecognized
}

fn best_transcript(alternatives: Vec<Alternative>) -> Option<String> {
    let has_confidence = alternatives.iter().any(|alt| alt.confidence.is_some());

    let best = if has_confidence {
        alternatives.into_iter().max_by(|a, b| {
            a.confidence
                .unwrap_or(0.0)
                .total_cmp(&b.confidence.unwrap_or(0.0))
        })
    } else {
        alternatives.into_iter().next()
    };

    best.and_then(|alt| alt.transcript)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
