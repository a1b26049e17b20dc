//! Upload → extract → transcribe → correct → deliver

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::audio::{read_extracted_audio, AudioExtraction, AudioExtractor};
use crate::config::{is_language_tag, Config};
use crate::correction::{count_changed_words, create_corrector, TextCorrector};
use crate::delivery::FinalTranscript;
use crate::error::Result;
use crate::ingress::{ingest, UploadedVideo};
use crate::transcription::{create_backend, SpeechBackend};
use crate::workspace::RunWorkspace;

/// Stage transitions reported while a run progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Uploaded,
    Extracting,
    Extracted,
    Transcribing,
    Correcting,
    Delivered,
}

impl PipelineStage {
    /// Completion percentage shown once this stage is reached
    pub fn progress(&self) -> u8 {
        match self {
            PipelineStage::Uploaded => 10,
            PipelineStage::Extracting => 20,
            PipelineStage::Extracted => 40,
            PipelineStage::Transcribing => 70,
            PipelineStage::Correcting => 90,
            PipelineStage::Delivered => 100,
        }
    }
}

/// Receives status text for every stage transition of a run
pub trait ProgressSink: Send + Sync {
    fn report(&self, stage: PipelineStage, message: &str);
}

/// Logs progress through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, stage: PipelineStage, message: &str) {
        info!("📊 [{:>3}%] {}", stage.progress(), message);
    }
}

/// One configured pipeline, shared by every run
pub struct TranscriptionPipeline {
    config: Arc<Config>,
    extractor: Arc<dyn AudioExtraction>,
    backend: Arc<dyn SpeechBackend>,
    corrector: Arc<dyn TextCorrector>,
}

impl TranscriptionPipeline {
    /// Build the ffmpeg extractor, speech backend and corrector from config
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let extractor = Arc::new(AudioExtractor::from_config(&config.audio));
        let backend = create_backend(&config.transcription)?;
        let corrector = create_corrector(&config.correction)?;

        info!(
            "🔧 Pipeline ready (backend: {}, correction: {})",
            backend.name(),
            corrector.name()
        );

        Ok(Self::new(config, extractor, backend, corrector))
    }

    pub fn new(
        config: Config,
        extractor: Arc<dyn AudioExtraction>,
        backend: Arc<dyn SpeechBackend>,
        corrector: Arc<dyn TextCorrector>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            extractor,
            backend,
            corrector,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run with progress logged through `tracing`
    pub async fn transcribe(
        &self,
        bytes: Vec<u8>,
        extension: &str,
        language: Option<&str>,
    ) -> Result<FinalTranscript> {
        self.run(bytes, extension, language, &TracingProgress).await
    }

    /// Run the whole pipeline for one upload.
    ///
    /// The run's temp files are removed before this returns, whatever the
    /// outcome.
    pub async fn run(
        &self,
        bytes: Vec<u8>,
        extension: &str,
        language: Option<&str>,
        progress: &dyn ProgressSink,
    ) -> Result<FinalTranscript> {
        let start = Instant::now();
        let upload = UploadedVideo::new(bytes, extension)?;
        let language = self.resolve_language(language);

        let mut workspace = RunWorkspace::create(self.config.ingress.temp_dir.as_deref())?;
        let outcome = self.run_in(&mut workspace, upload, &language, progress).await;

        if let Err(e) = workspace.close() {
            warn!("Failed to clean up run workspace: {}", e);
        }

        match &outcome {
            Ok(transcript) => info!(
                "🎉 Transcribed {} chars in {:.2}s ({} corrections)",
                transcript.text.len(),
                start.elapsed().as_secs_f64(),
                transcript.corrections
            ),
            Err(e) if e.is_user_error() => {
                warn!("⚠️ Run rejected after {:.2}s: {}", start.elapsed().as_secs_f64(), e)
            }
            Err(e) => error!("❌ Run failed after {:.2}s: {}", start.elapsed().as_secs_f64(), e),
        }

        outcome
    }

    async fn run_in(
        &self,
        workspace: &mut RunWorkspace,
        upload: UploadedVideo,
        language: &str,
        progress: &dyn ProgressSink,
    ) -> Result<FinalTranscript> {
        let video_path = ingest(workspace, upload).await?;
        progress.report(PipelineStage::Uploaded, "Video uploaded");

        let audio_path = workspace.reserve_audio()?;
        progress.report(PipelineStage::Extracting, "Extracting audio...");

        let extracted = self.extract(workspace, &video_path, &audio_path).await;
        let audio = match extracted {
            Ok(()) => read_extracted_audio(&audio_path).await,
            Err(e) => Err(e),
        };
        let audio = match audio {
            Ok(audio) => audio,
            Err(e) => {
                workspace.discard_audio();
                return Err(e);
            }
        };
        progress.report(PipelineStage::Extracted, "Audio extracted");

        progress.report(
            PipelineStage::Transcribing,
            &format!("Transcribing audio ({})...", language),
        );
        let result = self.backend.recognize(&audio, language).await;
        drop(audio);
        workspace.discard_audio();
        debug!("{} backend returned {:?}", self.backend.name(), result);
        let raw_text = result.into_text()?;

        progress.report(PipelineStage::Correcting, "Correcting transcript...");
        let text = self.corrector.correct(&raw_text).await;
        let corrections = count_changed_words(&raw_text, &text);

        progress.report(PipelineStage::Delivered, "Transcription complete");

        Ok(FinalTranscript {
            text,
            raw_text,
            language: language.to_string(),
            corrections,
        })
    }

    /// The extractor has returned, and with it the decoder process, before
    /// the video file is deleted.
    async fn extract(
        &self,
        workspace: &mut RunWorkspace,
        video_path: &Path,
        audio_path: &Path,
    ) -> Result<()> {
        let result = self.extractor.extract(video_path, audio_path).await;
        workspace.release_video();
        result
    }

    fn resolve_language(&self, requested: Option<&str>) -> String {
        let default = &self.config.transcription.language;
        match requested.map(str::trim).filter(|tag| !tag.is_empty()) {
            Some(tag) if is_language_tag(tag) => tag.to_string(),
            Some(tag) => {
                warn!("Ignoring invalid language tag {:?}, using {}", tag, default);
                default.clone()
            }
            None => default.clone(),
        }
    }
}
