use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::llm::{LLMConfig, LLMProvider};

/// Configuration for the video transcriber
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upload handling
    pub ingress: IngressConfig,

    /// Audio extraction settings
    pub audio: AudioConfig,

    /// Speech-to-text backend settings
    pub transcription: TranscriptionConfig,

    /// Post-transcription correction settings
    pub correction: CorrectionConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: u64,

    /// Root for per-run temp directories (system temp dir when unset)
    pub temp_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// ffmpeg binary used for demuxing
    pub ffmpeg_path: String,

    /// Optional ffmpeg audio filter chain applied during extraction
    pub audio_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// Speech-to-text backend
    pub provider: TranscriptionProvider,

    /// Override for the backend endpoint
    pub endpoint: Option<String>,

    /// API key for the backend
    pub api_key: Option<String>,

    /// Model name (whisper provider only)
    pub model: String,

    /// Default language tag, e.g. en-GB
    pub language: String,

    /// Request timeout in seconds, 0 waits indefinitely
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptionProvider {
    Google,
    Whisper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Which corrector runs after transcription
    pub mode: CorrectionMode,

    /// Extra word frequency list, one `word count` pair per line
    pub dictionary_file: Option<PathBuf>,

    /// Phrase corrections applied before spelling correction (wrong -> right)
    pub phrase_corrections: BTreeMap<String, String>,

    /// LLM settings for the llm corrector
    pub llm: LLMConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionMode {
    Lexicon,
    Llm,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Allow cross-origin browser access
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is unset
    pub level: String,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 500 * 1024 * 1024,
            temp_dir: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            audio_filter: None,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: TranscriptionProvider::Google,
            endpoint: None,
            api_key: None,
            model: "whisper-1".to_string(),
            language: "en-GB".to_string(),
            request_timeout_seconds: 120,
        }
    }
}

impl TranscriptionConfig {
    /// Backend endpoint, falling back to the provider's public URL
    pub fn endpoint(&self) -> &str {
        match (&self.endpoint, self.provider) {
            (Some(endpoint), _) => endpoint,
            (None, TranscriptionProvider::Google) => "http://www.google.com/speech-api/v2/recognize",
            (None, TranscriptionProvider::Whisper) => "https://api.openai.com/v1/audio/transcriptions",
        }
    }
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            mode: CorrectionMode::Lexicon,
            dictionary_file: None,
            phrase_corrections: BTreeMap::new(),
            llm: LLMConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
            enable_cors: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "video_transcriber=info,warn".to_string(),
        }
    }
}

/// Prefix for environment overrides
const ENV_PREFIX: &str = "VIDEO_TRANSCRIBER_";

impl Config {
    /// Load configuration from the first config file found
    pub fn load() -> Result<Self> {
        let config_paths = [
            "video-transcriber.toml",
            "config/video-transcriber.toml",
            "/etc/video-transcriber/config.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::load_from(path) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config file {}: {:#}", path, e),
                }
            }
        }

        Err(anyhow!("No configuration file found"))
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `VIDEO_TRANSCRIBER_*` environment overrides
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(language) = lookup("LANGUAGE") {
            self.transcription.language = language;
        }

        if let Some(provider) = lookup("PROVIDER") {
            match provider.to_lowercase().as_str() {
                "google" => self.transcription.provider = TranscriptionProvider::Google,
                "whisper" => self.transcription.provider = TranscriptionProvider::Whisper,
                other => tracing::warn!("Ignoring unknown transcription provider: {}", other),
            }
        }

        if let Some(api_key) = lookup("API_KEY") {
            self.transcription.api_key = Some(api_key);
        }

        if let Some(endpoint) = lookup("ENDPOINT") {
            self.transcription.endpoint = Some(endpoint);
        }

        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("Ignoring invalid port: {}", port),
            }
        }

        if let Some(temp_dir) = lookup("TEMP_DIR") {
            self.ingress.temp_dir = Some(PathBuf::from(temp_dir));
        }

        if let Some(ffmpeg) = lookup("FFMPEG") {
            self.audio.ffmpeg_path = ffmpeg;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }

        self
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.as_ref().display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ingress.max_upload_bytes == 0 {
            return Err(anyhow!("max_upload_bytes must be greater than 0"));
        }

        if let Some(temp_dir) = &self.ingress.temp_dir {
            if !temp_dir.is_dir() {
                return Err(anyhow!("temp_dir does not exist: {}", temp_dir.display()));
            }
        }

        if self.audio.ffmpeg_path.trim().is_empty() {
            return Err(anyhow!("ffmpeg_path must not be empty"));
        }

        if !is_language_tag(&self.transcription.language) {
            return Err(anyhow!(
                "Invalid language tag: {:?}",
                self.transcription.language
            ));
        }

        if self.server.port == 0 {
            return Err(anyhow!("server port must be greater than 0"));
        }

        if self.correction.mode == CorrectionMode::Llm
            && self.correction.llm.provider == LLMProvider::OpenAI
            && self.correction.llm.api_key.is_none()
        {
            return Err(anyhow!("API key required for the OpenAI correction provider"));
        }

        for warning in self.warnings() {
            tracing::warn!("⚠️ {}", warning);
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Settings that load fine but will make every request fail
    pub fn warnings(&self) -> Vec<String> {
        let transcription = &self.transcription;
        let mut warnings = Vec::new();

        // A custom endpoint may be a proxy that adds its own credentials
        if transcription.endpoint.is_none() && transcription.api_key.is_none() {
            warnings.push(match transcription.provider {
                TranscriptionProvider::Google => {
                    "No api_key set for the google provider; the Web Speech endpoint rejects keyless requests"
                        .to_string()
                }
                TranscriptionProvider::Whisper => {
                    "No api_key set for the whisper provider; the OpenAI endpoint requires one"
                        .to_string()
                }
            });
        }

        warnings
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "Video Transcriber Configuration:\n\
            - Transcription Provider: {:?}\n\
            - Endpoint: {}\n\
            - Language: {}\n\
            - Request Timeout: {}s\n\
            - Correction: {:?}\n\
            - ffmpeg: {}\n\
            - Max Upload: {} MiB\n\
            - Listen: {}:{}",
            self.transcription.provider,
            self.transcription.endpoint(),
            self.transcription.language,
            self.transcription.request_timeout_seconds,
            self.correction.mode,
            self.audio.ffmpeg_path,
            self.ingress.max_upload_bytes / (1024 * 1024),
            self.server.host,
            self.server.port,
        )
    }
}

/// Loose BCP 47 shape check: alphanumeric subtags separated by '-'
pub fn is_language_tag(tag: &str) -> bool {
    let mut subtags = tag.split('-');
    let primary_ok = subtags
        .next()
        .map(|primary| (2..=3).contains(&primary.len()) && primary.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);

    primary_ok
        && subtags.all(|subtag| {
            (1..=8).contains(&subtag.len()) && subtag.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.config.transcription.language = language.into();
        self
    }

    pub fn with_transcription_provider(mut self, provider: TranscriptionProvider) -> Self {
        self.config.transcription.provider = provider;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.transcription.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.transcription.api_key = Some(api_key.into());
        self
    }

    pub fn with_temp_dir(mut self, dir: PathBuf) -> Self {
        self.config.ingress.temp_dir = Some(dir);
        self
    }

    pub fn with_correction_mode(mut self, mode: CorrectionMode) -> Self {
        self.config.correction.mode = mode;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
