// Upload → submit → poll orchestration for one recorded artifact.
//
// The poll budget is bounded (3s cadence, 200 polls ≈ 10 minutes) and a
// blown budget is terminal: no retry, no partial transcript. Progress is
// projected monotonically from job status so observers never see the
// percentage move backwards, and cancellation is honored between polls.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::provider::{TranscribeApiError, TranscriptionProvider};
use super::types::{JobConfig, JobStatus, Transcript, TranscriptionJob};
use crate::session::events::ProgressSink;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);
pub const DEFAULT_MAX_POLLS: u32 = 200;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription provider is not configured (missing API key)")]
    NotConfigured,
    #[error("could not read recording: {0}")]
    ReadArtifact(String),
    #[error("audio upload failed: {0}")]
    Upload(String),
    #[error("transcription request failed: {0}")]
    Transport(String),
    /// The provider marked the job failed
    #[error("transcription failed: {0}")]
    Failed(String),
    /// Poll budget exhausted; the remote job may still be running
    #[error("transcription timed out after {polls} polls (~{minutes} minutes)")]
    Timeout { polls: u32, minutes: u64 },
    #[error("transcription cancelled")]
    Cancelled,
}

pub struct TranscriptionOrchestrator {
    provider: Arc<dyn TranscriptionProvider>,
    job_config: JobConfig,
    poll_interval: Duration,
    max_polls: u32,
}

impl TranscriptionOrchestrator {
    pub fn new(provider: Arc<dyn TranscriptionProvider>) -> Self {
        Self {
            provider,
            job_config: JobConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: DEFAULT_MAX_POLLS,
        }
    }

    /// Override the poll cadence and budget
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    /// Drive one artifact through upload, job submission, and polling.
    ///
    /// Emits 10 before the upload starts, 30 once the job is accepted,
    /// then the status-mapped value per poll; 100 only on completion.
    pub async fn transcribe(
        &self,
        audio_path: &Path,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<Transcript, TranscriptionError> {
        if !self.provider.is_configured() {
            return Err(TranscriptionError::NotConfigured);
        }

        let mut progress = Monotonic::new(progress);
        progress.report(10);

        let audio = tokio::fs::read(audio_path).await.map_err(|e| {
            TranscriptionError::ReadArtifact(format!("{}: {}", audio_path.display(), e))
        })?;
        info!("Uploading {} bytes for transcription", audio.len());
        let audio_url = self.provider.upload(audio).await.map_err(|e| match e {
            TranscribeApiError::NotConfigured => TranscriptionError::NotConfigured,
            other => TranscriptionError::Upload(other.to_string()),
        })?;

        let job_id = self
            .provider
            .submit(&audio_url, &self.job_config)
            .await
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;
        progress.report(30);
        let mut job = TranscriptionJob {
            id: job_id,
            audio_url,
            status: JobStatus::Queued,
            polls: 0,
        };
        info!(
            "Transcription job {} submitted, polling every {:?}",
            job.id, self.poll_interval
        );

        while job.polls < self.max_polls {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TranscriptionError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
            job.polls += 1;

            let snapshot = self
                .provider
                .get_status(&job.id)
                .await
                .map_err(|e| TranscriptionError::Transport(e.to_string()))?;
            job.status = snapshot.status;

            match snapshot.status {
                JobStatus::Queued => progress.report(10),
                JobStatus::Processing => progress.report(50),
                JobStatus::Completed => {
                    progress.report(100);
                    info!(
                        "Transcription job {} completed after {} polls",
                        job.id, job.polls
                    );
                    return Ok(Transcript::from_snapshot(job.id, snapshot));
                }
                JobStatus::Error => {
                    let reason = snapshot
                        .error
                        .unwrap_or_else(|| "transcription failed".to_string());
                    warn!("Transcription job {} failed: {}", job.id, reason);
                    return Err(TranscriptionError::Failed(reason));
                }
            }
            debug!(
                "Poll {}/{}: job {} is {:?}",
                job.polls, self.max_polls, job.id, job.status
            );
        }

        let minutes = (self.max_polls as u64).saturating_mul(self.poll_interval.as_secs()) / 60;
        warn!(
            "Transcription poll budget exhausted after {} polls",
            self.max_polls
        );
        Err(TranscriptionError::Timeout {
            polls: self.max_polls,
            minutes,
        })
    }
}

/// Clamps reported progress to be non-decreasing and drops repeats, so
/// each emitted value is a real step forward.
struct Monotonic<'a> {
    sink: &'a dyn ProgressSink,
    last: Option<u8>,
}

impl<'a> Monotonic<'a> {
    fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    fn report(&mut self, percent: u8) {
        let clamped = self.last.map_or(percent, |last| last.max(percent));
        if self.last == Some(clamped) {
            return;
        }
        self.last = Some(clamped);
        self.sink.report(clamped);
    }
}
