use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AudioConfig;
use crate::error::{PipelineError, Result};

/// Sample rate expected by the speech backends
pub const TARGET_SAMPLE_RATE: u32 = 16_000;
/// Mono
pub const TARGET_CHANNELS: u16 = 1;
/// Signed 16-bit PCM
pub const TARGET_BITS_PER_SAMPLE: u16 = 16;

/// How many trailing ffmpeg stderr lines end up in an error message
const STDERR_TAIL_LINES: usize = 6;

/// Audio information for an extracted WAV file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub sample_count: usize,
    pub file_size: u64,
}

impl AudioInfo {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        let frames = self.sample_count as f64 / self.channels as f64;
        Duration::from_secs_f64(frames / self.sample_rate as f64)
    }
}

/// Decoded waveform read back from the extractor's output
#[derive(Debug, Clone)]
pub struct ExtractedAudio {
    info: AudioInfo,
    samples: Vec<i16>,
}

impl ExtractedAudio {
    pub fn info(&self) -> &AudioInfo {
        &self.info
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    /// Canonical 16 kHz mono s16le WAV bytes
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.info.channels,
            sample_rate: self.info.sample_rate,
            bits_per_sample: self.info.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }

    /// Raw big-endian samples, the `audio/l16` wire format
    pub fn to_l16_bytes(&self) -> Vec<u8> {
        self.samples
            .iter()
            .flat_map(|sample| sample.to_be_bytes())
            .collect()
    }
}

/// Decoder/demuxer seam: write the video's audio track to `audio_path` as
/// 16 kHz mono s16le WAV
#[async_trait]
pub trait AudioExtraction: Send + Sync {
    async fn extract(&self, video_path: &Path, audio_path: &Path) -> Result<()>;
}

/// ffmpeg-backed audio extractor
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    ffmpeg_path: String,
    audio_filter: Option<String>,
}

impl AudioExtractor {
    pub fn new() -> Self {
        Self::from_config(&AudioConfig::default())
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            audio_filter: config.audio_filter.clone(),
        }
    }

    /// ffmpeg arguments producing 16 kHz mono s16le WAV from the first audio stream
    pub fn ffmpeg_args(&self, video_path: &Path, audio_path: &Path) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            "-hide_banner".into(),
            "-nostdin".into(),
            "-y".into(),
            "-i".into(),
            video_path.as_os_str().to_owned(),
            "-map".into(),
            "0:a:0".into(),
            "-vn".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            TARGET_SAMPLE_RATE.to_string().into(),
            "-ac".into(),
            TARGET_CHANNELS.to_string().into(),
        ];

        if let Some(filter) = &self.audio_filter {
            args.push("-af".into());
            args.push(filter.into());
        }

        args.push("-f".into());
        args.push("wav".into());
        args.push(audio_path.as_os_str().to_owned());
        args
    }
}

impl Default for AudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioExtraction for AudioExtractor {
    async fn extract(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        info!("🎵 Extracting audio from: {}", video_path.display());

        // `output()` waits for ffmpeg to exit, so the video file is closed
        // by the time this returns.
        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .args(self.ffmpeg_args(video_path, audio_path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => PipelineError::ExtractionFailure(format!(
                    "ffmpeg not found at '{}'",
                    self.ffmpeg_path
                )),
                _ => PipelineError::ExtractionFailure(format!("failed to run ffmpeg: {}", e)),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("ffmpeg stderr: {}", stderr);
            return Err(PipelineError::ExtractionFailure(describe_ffmpeg_failure(&stderr)));
        }

        Ok(())
    }
}

/// Turn ffmpeg stderr into a user-facing extraction error
fn describe_ffmpeg_failure(stderr: &str) -> String {
    let no_audio = stderr.contains("matches no streams")
        || stderr.contains("does not contain any stream");
    if no_audio {
        return "the video has no audio track".to_string();
    }

    let tail: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let start = tail.len().saturating_sub(STDERR_TAIL_LINES);
    let tail = tail[start..].join("; ");

    if tail.is_empty() {
        "ffmpeg exited with an error".to_string()
    } else {
        tail
    }
}

/// Read back an extracted WAV and check it is non-empty 16 kHz mono s16le
pub async fn read_extracted_audio(path: &Path) -> Result<ExtractedAudio> {
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_wav(&owned))
        .await
        .map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?
}

fn read_wav(path: &Path) -> Result<ExtractedAudio> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?
        .len();

    let mut reader =
        hound::WavReader::open(path).map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?;
    let spec = reader.spec();

    if spec.sample_rate != TARGET_SAMPLE_RATE
        || spec.channels != TARGET_CHANNELS
        || spec.bits_per_sample != TARGET_BITS_PER_SAMPLE
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(PipelineError::ExtractionFailure(format!(
            "unexpected audio format: {} Hz, {} channel(s), {}-bit",
            spec.sample_rate, spec.channels, spec.bits_per_sample
        )));
    }

    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<i16>, _>>()
        .map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?;

    if samples.is_empty() {
        return Err(PipelineError::EmptyAudio);
    }

    let info = AudioInfo {
        path: path.to_path_buf(),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        sample_count: samples.len(),
        file_size,
    };

    info!(
        "✅ Audio extracted: {} ({:.1}s, {}Hz)",
        info.path.display(),
        info.duration().as_secs_f64(),
        info.sample_rate
    );

    Ok(ExtractedAudio { info, samples })
}

/// Write samples as a 16 kHz mono s16le WAV file
pub fn write_wav(path: &Path, samples: &[i16]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: TARGET_CHANNELS,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: TARGET_BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?;
    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| PipelineError::UnexpectedIo(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| PipelineError::UnexpectedIo(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_args_pin_output_format() {
        let extractor = AudioExtractor::new();
        let args: Vec<String> = extractor
            .ffmpeg_args(Path::new("in.mp4"), Path::new("out.wav"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        let joined = args.join(" ");
        assert!(joined.contains("-acodec pcm_s16le"));
        assert!(joined.contains("-ar 16000"));
        assert!(joined.contains("-ac 1"));
        assert!(joined.contains("-map 0:a:0"));
        assert_eq!(args.last().map(String::as_str), Some("out.wav"));
        assert!(!joined.contains("-af"));
    }

    #[test]
    fn test_ffmpeg_args_with_filter() {
        let extractor = AudioExtractor::from_config(&AudioConfig {
            ffmpeg_path: "ffmpeg".to_string(),
            audio_filter: Some("volume=0.95".to_string()),
        });
        let args: Vec<String> = extractor
            .ffmpeg_args(Path::new("in.mkv"), Path::new("out.wav"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w[0] == "-af" && w[1] == "volume=0.95"));
    }

    #[test]
    fn test_describe_missing_audio_track() {
        let stderr = "Input #0, mov,mp4\nStream map '0:a:0' matches no streams.\nTo ignore this, add a trailing '?' to the map.";
        assert_eq!(describe_ffmpeg_failure(stderr), "the video has no audio track");
    }

    #[test]
    fn test_describe_keeps_stderr_tail() {
        let stderr = (1..=10).map(|i| format!("line {}", i)).collect::<Vec<_>>().join("\n");
        let message = describe_ffmpeg_failure(&stderr);
        assert!(message.starts_with("line 5"));
        assert!(message.ends_with("line 10"));
        assert_eq!(describe_ffmpeg_failure(""), "ffmpeg exited with an error");
    }

    #[tokio::test]
    async fn test_read_back_valid_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        write_wav(&path, &[0, 1000, -1000, 32767]).unwrap();

        let audio = read_extracted_audio(&path).await.unwrap();
        assert_eq!(audio.samples(), &[0, 1000, -1000, 32767]);
        assert_eq!(audio.info().sample_rate, 16_000);
        assert_eq!(audio.info().channels, 1);
        assert_eq!(audio.info().bits_per_sample, 16);
        assert_eq!(audio.to_l16_bytes(), vec![0, 0, 0x03, 0xE8, 0xFC, 0x18, 0x7F, 0xFF]);
    }

    #[tokio::test]
    async fn test_empty_wav_is_empty_audio() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        write_wav(&path, &[]).unwrap();

        assert!(matches!(
            read_extracted_audio(&path).await,
            Err(PipelineError::EmptyAudio)
        ));
    }

    #[tokio::test]
    async fn test_garbage_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        std::fs::write(&path, b"definitely not a wav file").unwrap();

        assert!(matches!(
            read_extracted_audio(&path).await,
            Err(PipelineError::UnexpectedIo(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_rate_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(1i16).unwrap();
        writer.write_sample(1i16).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            read_extracted_audio(&path).await,
            Err(PipelineError::ExtractionFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_wav_bytes_round_trip_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.wav");
        write_wav(&path, &[5; 160]).unwrap();
        let audio = read_extracted_audio(&path).await.unwrap();

        let bytes = audio.to_wav_bytes().unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 320);
        assert_eq!(audio.info().duration(), Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_missing_ffmpeg_is_extraction_failure() {
        let extractor = AudioExtractor::from_config(&AudioConfig {
            ffmpeg_path: "/nonexistent/ffmpeg-binary".to_string(),
            audio_filter: None,
        });
        let err = extractor
            .extract(Path::new("in.mp4"), Path::new("out.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailure(msg) if msg.contains("not found")));
    }
}
