//! Video Transcriber
//!
//! Turns an uploaded video into a corrected text transcript: the audio track
//! is extracted with ffmpeg, sent to a speech-to-text service and run through
//! a spelling correction pass.

pub mod audio;
pub mod config;
pub mod correction;
pub mod delivery;
pub mod error;
pub mod ingress;
pub mod llm;
pub mod pipeline;
pub mod transcription;
pub mod workspace;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::audio::{AudioExtraction, AudioExtractor, AudioInfo, ExtractedAudio};
pub use crate::config::Config;
pub use crate::correction::{LexiconCorrector, LlmCorrector, NoopCorrector, TextCorrector};
pub use crate::delivery::{FinalTranscript, TranscriptArtifact};
pub use crate::error::{ErrorKind, PipelineError};
pub use crate::ingress::{UploadedVideo, VideoContainer};
pub use crate::llm::{LLMConfig, LLMProvider};
pub use crate::pipeline::{PipelineStage, ProgressSink, TracingProgress, TranscriptionPipeline};
pub use crate::transcription::{SpeechBackend, TranscriptionResult};
pub use crate::workspace::RunWorkspace;
