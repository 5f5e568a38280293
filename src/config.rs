use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use tracing::warn;

use crate::storage::default_notes_dir;

/// Placeholder value shipped in `.env.example`; treated as unset
const PLACEHOLDER_API_KEY: &str = "your_api_key_here";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub transcription: TranscriptionConfig,
    pub summarization: SummarizationConfig,
    /// The whole table is optional; an absent notes_dir falls back to
    /// the documents directory.
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// Capture and mix sample rate
    pub sample_rate: u32,
    /// Frame size each backend emits
    pub frame_duration_ms: u64,
    /// Frames one mixer side may lag before silence fill kicks in
    pub max_lag_frames: usize,
    /// Seconds of audio between WAV flushes
    pub flush_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SummarizationConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    pub notes_dir: Option<PathBuf>,
}

impl TranscriptionConfig {
    /// Configured key, falling back to the conventional env var
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.clone())
            .or_else(|| resolve_key(std::env::var("ASSEMBLYAI_API_KEY").ok()))
    }
}

impl SummarizationConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_key(self.api_key.clone())
            .or_else(|| resolve_key(std::env::var("GOOGLE_GENERATIVE_AI_API_KEY").ok()))
    }
}

impl StorageConfig {
    pub fn notes_dir(&self) -> PathBuf {
        self.notes_dir.clone().unwrap_or_else(default_notes_dir)
    }
}

impl Config {
    /// Defaults, then an optional config file, then `MEETNOTES_`
    /// environment variables (`__` for nesting).
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("service.name", "meetnotes")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 3030)?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.frame_duration_ms", 100)?
            .set_default("audio.max_lag_frames", 8)?
            .set_default("audio.flush_interval_secs", 1)?
            .set_default("transcription.base_url", "https://api.assemblyai.com")?
            .set_default(
                "summarization.base_url",
                "https://generativelanguage.googleapis.com",
            )?
            .set_default("summarization.model", "gemini-3-flash-preview")?;

        builder = match path {
            Some(path) => builder.add_source(config::File::with_name(path)),
            None => builder.add_source(config::File::with_name("meetnotes").required(false)),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix("MEETNOTES")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Missing provider credentials are not fatal at startup; sessions
    /// degrade (no summary) or refuse processing (no transcription), so
    /// this only warns.
    pub fn validate(&self) {
        if self.transcription.resolved_api_key().is_none() {
            warn!("No transcription API key configured; recordings cannot be processed");
        }
        if self.summarization.resolved_api_key().is_none() {
            warn!("No summarization API key configured; sessions will complete without summaries");
        }
    }
}

fn resolve_key(raw: Option<String>) -> Option<String> {
    let key = raw?.trim().to_string();
    if key.is_empty() || key == PLACEHOLDER_API_KEY {
        None
    } else {
        Some(key)
    }
}
