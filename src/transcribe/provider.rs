use async_trait::async_trait;

use super::types::{JobConfig, JobSnapshot};

/// Remote transcription service port: upload bytes, submit a job over the
/// uploaded URL, poll the job by id.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Transfer raw audio and obtain a provider-side URL for it
    async fn upload(&self, audio: Vec<u8>) -> Result<String, TranscribeApiError>;

    /// Create a transcription job for previously uploaded audio
    async fn submit(&self, audio_url: &str, config: &JobConfig)
        -> Result<String, TranscribeApiError>;

    /// Fetch the current state of a job
    async fn get_status(&self, job_id: &str) -> Result<JobSnapshot, TranscribeApiError>;

    /// Whether credentials are present; gates the pipeline before any
    /// upload work starts
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscribeApiError {
    #[error("transcription provider is not configured (missing API key)")]
    NotConfigured,
    #[error("request failed: {0}")]
    Http(String),
    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}
