// reqwest-backed transcription provider.
//
// Speaks the upload/transcript/poll surface of hosted speech-to-text
// services: POST raw bytes to /v2/upload, create a job at /v2/transcript,
// poll GET /v2/transcript/{id} until it settles.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::provider::{TranscribeApiError, TranscriptionProvider};
use super::types::{JobConfig, JobSnapshot, JobStatus, Utterance, Word};
use crate::config::TranscriptionConfig;

pub struct HttpTranscriptionProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTranscriptionProvider {
    pub fn new(config: &TranscriptionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.resolved_api_key(),
        }
    }

    fn key(&self) -> Result<&str, TranscribeApiError> {
        self.api_key
            .as_deref()
            .ok_or(TranscribeApiError::NotConfigured)
    }
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: JobStatus,
    text: Option<String>,
    confidence: Option<f64>,
    audio_duration: Option<f64>,
    error: Option<String>,
    utterances: Option<Vec<UtterancePayload>>,
    words: Option<Vec<WordPayload>>,
}

#[derive(Deserialize)]
struct UtterancePayload {
    speaker: String,
    text: String,
    confidence: f64,
    start: u64,
    end: u64,
}

#[derive(Deserialize)]
struct WordPayload {
    text: String,
    start: u64,
    end: u64,
    confidence: f64,
    speaker: Option<String>,
}

#[async_trait]
impl TranscriptionProvider for HttpTranscriptionProvider {
    async fn upload(&self, audio: Vec<u8>) -> Result<String, TranscribeApiError> {
        let key = self.key()?;
        debug!(bytes = audio.len(), "Uploading audio to provider");

        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", key)
            .body(audio)
            .send()
            .await
            .map_err(|e| TranscribeApiError::Http(e.to_string()))?;

        let response = check_status(response).await?;
        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| TranscribeApiError::Decode(e.to_string()))?;
        Ok(parsed.upload_url)
    }

    async fn submit(
        &self,
        audio_url: &str,
        config: &JobConfig,
    ) -> Result<String, TranscribeApiError> {
        let key = self.key()?;
        let body = json!({
            "audio_url": audio_url,
            "speaker_labels": config.speaker_diarization,
            "multichannel": config.multichannel,
            "speaker_options": {
                "min_speakers_expected": config.min_speakers,
                "max_speakers_expected": config.max_speakers,
            },
        });

        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TranscribeApiError::Http(e.to_string()))?;

        let response = check_status(response).await?;
        let parsed: SubmitResponse = response
            .json()
            .await
            .map_err(|e| TranscribeApiError::Decode(e.to_string()))?;
        debug!(job_id = %parsed.id, "Transcription job submitted");
        Ok(parsed.id)
    }

    async fn get_status(&self, job_id: &str) -> Result<JobSnapshot, TranscribeApiError> {
        let key = self.key()?;
        let response = self
            .client
            .get(format!("{}/v2/transcript/{}", self.base_url, job_id))
            .header("authorization", key)
            .send()
            .await
            .map_err(|e| TranscribeApiError::Http(e.to_string()))?;

        let response = check_status(response).await?;
        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| TranscribeApiError::Decode(e.to_string()))?;

        let mut snapshot = JobSnapshot::with_status(parsed.status);
        snapshot.text = parsed.text;
        snapshot.confidence = parsed.confidence;
        snapshot.duration_seconds = parsed.audio_duration;
        snapshot.error = parsed.error;
        snapshot.utterances = parsed
            .utterances
            .unwrap_or_default()
            .into_iter()
            .map(|u| Utterance {
                speaker_id: u.speaker,
                text: u.text,
                confidence: u.confidence,
                start_ms: u.start,
                end_ms: u.end,
            })
            .collect();
        snapshot.words = parsed
            .words
            .unwrap_or_default()
            .into_iter()
            .map(|w| Word {
                text: w.text,
                start_ms: w.start,
                end_ms: w.end,
                confidence: w.confidence,
                speaker_id: w.speaker,
            })
            .collect();
        Ok(snapshot)
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TranscribeApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(TranscribeApiError::Api {
        status: status.as_u16(),
        message,
    })
}
