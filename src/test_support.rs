//! Scripted fakes for exercising the pipeline without audio hardware or
//! network access.
//!
//! Each fake implements one of the crate's trait seams and replays a
//! programmed script: capture backends emit canned frames, the
//! transcription provider walks a queue of status responses, and the
//! summary provider returns prepared generation outcomes. Tests assert
//! against call counters and the script position.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::audio::{
    AudioFrame, BackendFactory, CaptureBackend, CaptureError, SourceKind, StopHandle,
};
use crate::session::events::ProgressSink;
use crate::summarize::{GenerateError, SummaryProvider};
use crate::transcribe::{
    JobConfig, JobSnapshot, JobStatus, TranscribeApiError, Transcript, TranscriptionProvider,
    Utterance,
};

// ============================================================================
// Audio fixtures
// ============================================================================

/// 100 ms mono frames at 16 kHz with a deterministic ramp, timestamped
/// back to back
pub fn mono_frames(count: usize) -> Vec<AudioFrame> {
    (0..count)
        .map(|i| AudioFrame {
            samples: vec![(i as i16 + 1) * 10; 1600],
            sample_rate: 16000,
            channels: 1,
            timestamp_ms: i as u64 * 100,
        })
        .collect()
}

// ============================================================================
// Capture fakes
// ============================================================================

/// What a scripted backend does after its frames run out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedBehavior {
    /// Keep the stream open until the stop handle fires, then close
    RunToStop,
    /// Close the stream without a stop request (device death)
    DieAfterFrames,
    /// Fail the start call outright
    FailStart,
}

/// Capture backend that replays canned frames
pub struct ScriptedBackend {
    kind: SourceKind,
    frames: Vec<AudioFrame>,
    behavior: ScriptedBehavior,
    stop: StopHandle,
}

impl ScriptedBackend {
    pub fn new(kind: SourceKind, frames: Vec<AudioFrame>, behavior: ScriptedBehavior) -> Self {
        Self {
            kind,
            frames,
            behavior,
            stop: StopHandle::new(),
        }
    }
}

#[async_trait]
impl CaptureBackend for ScriptedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        if self.behavior == ScriptedBehavior::FailStart {
            return Err(CaptureError::Device(format!(
                "scripted {} start failure",
                self.kind
            )));
        }

        let (tx, rx) = mpsc::channel(64);
        let frames = self.frames.clone();
        let stop = self.stop.clone();
        let die_after_frames = self.behavior == ScriptedBehavior::DieAfterFrames;

        tokio::spawn(async move {
            for frame in frames {
                if stop.is_signalled() {
                    return;
                }
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
            if !die_after_frames {
                while !stop.is_signalled() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
            // Dropping the sender closes the stream.
        });

        Ok(rx)
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Per-source script for [`ScriptedFactory`]
#[derive(Clone)]
enum SourceScript {
    Present(Vec<AudioFrame>, ScriptedBehavior),
    Absent,
}

/// Backend factory handing out scripted backends per source
pub struct ScriptedFactory {
    mic: SourceScript,
    system: SourceScript,
}

impl ScriptedFactory {
    /// Both sources absent; acquisition will fail with `NoAudioSource`
    pub fn new() -> Self {
        Self {
            mic: SourceScript::Absent,
            system: SourceScript::Absent,
        }
    }

    pub fn with_mic(mut self, frames: Vec<AudioFrame>, behavior: ScriptedBehavior) -> Self {
        self.mic = SourceScript::Present(frames, behavior);
        self
    }

    pub fn with_system(mut self, frames: Vec<AudioFrame>, behavior: ScriptedBehavior) -> Self {
        self.system = SourceScript::Present(frames, behavior);
        self
    }

    /// Both sources present and well behaved
    pub fn both(frames_per_source: usize) -> Self {
        Self::new()
            .with_mic(mono_frames(frames_per_source), ScriptedBehavior::RunToStop)
            .with_system(mono_frames(frames_per_source), ScriptedBehavior::RunToStop)
    }
}

impl Default for ScriptedFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendFactory for ScriptedFactory {
    fn create(&self, kind: SourceKind) -> Result<Box<dyn CaptureBackend>, CaptureError> {
        let script = match kind {
            SourceKind::Microphone => &self.mic,
            SourceKind::System => &self.system,
        };
        match script {
            SourceScript::Present(frames, behavior) => Ok(Box::new(ScriptedBackend::new(
                kind,
                frames.clone(),
                *behavior,
            ))),
            SourceScript::Absent => Err(CaptureError::Device(format!("no scripted {kind}"))),
        }
    }
}

// ============================================================================
// Transcription fakes
// ============================================================================

pub fn snapshot(status: JobStatus) -> JobSnapshot {
    JobSnapshot::with_status(status)
}

/// A completed-job snapshot carrying text and two diarized utterances
pub fn completed_snapshot(text: &str) -> JobSnapshot {
    let mut snapshot = JobSnapshot::with_status(JobStatus::Completed);
    snapshot.text = Some(text.to_string());
    snapshot.confidence = Some(0.93);
    snapshot.duration_seconds = Some(120.0);
    snapshot.utterances = vec![
        Utterance {
            speaker_id: "1A".to_string(),
            text: "Let's get started.".to_string(),
            confidence: 0.95,
            start_ms: 0,
            end_ms: 1800,
        },
        Utterance {
            speaker_id: "2A".to_string(),
            text: "Sounds good.".to_string(),
            confidence: 0.91,
            start_ms: 2000,
            end_ms: 3100,
        },
    ];
    snapshot
}

/// Transcription provider that replays a queue of poll responses.
///
/// When the queue runs dry it returns the configured repeat snapshot, or
/// a loud API error if none was set, so an over-polling bug cannot pass
/// silently.
pub struct ScriptedTranscription {
    configured: bool,
    fail_upload: Option<String>,
    fail_submit: Option<String>,
    statuses: Mutex<VecDeque<Result<JobSnapshot, TranscribeApiError>>>,
    repeat: Option<JobSnapshot>,
    upload_calls: AtomicU32,
    submit_calls: AtomicU32,
    poll_calls: AtomicU32,
}

impl ScriptedTranscription {
    pub fn with_statuses(statuses: Vec<Result<JobSnapshot, TranscribeApiError>>) -> Self {
        Self {
            configured: true,
            fail_upload: None,
            fail_submit: None,
            statuses: Mutex::new(statuses.into_iter().collect()),
            repeat: None,
            upload_calls: AtomicU32::new(0),
            submit_calls: AtomicU32::new(0),
            poll_calls: AtomicU32::new(0),
        }
    }

    /// queued → processing → completed(snapshot)
    pub fn completing_with(snapshot: JobSnapshot) -> Self {
        Self::with_statuses(vec![
            Ok(JobSnapshot::with_status(JobStatus::Queued)),
            Ok(JobSnapshot::with_status(JobStatus::Processing)),
            Ok(snapshot),
        ])
    }

    /// Every poll reports `processing`; the job never settles
    pub fn never_finishing() -> Self {
        let mut fake = Self::with_statuses(Vec::new());
        fake.repeat = Some(JobSnapshot::with_status(JobStatus::Processing));
        fake
    }

    pub fn failing_upload(message: &str) -> Self {
        let mut fake = Self::with_statuses(Vec::new());
        fake.fail_upload = Some(message.to_string());
        fake
    }

    pub fn failing_submit(message: &str) -> Self {
        let mut fake = Self::with_statuses(Vec::new());
        fake.fail_submit = Some(message.to_string());
        fake
    }

    pub fn unconfigured() -> Self {
        let mut fake = Self::with_statuses(Vec::new());
        fake.configured = false;
        fake
    }

    pub fn upload_calls(&self) -> u32 {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn poll_calls(&self) -> u32 {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionProvider for ScriptedTranscription {
    async fn upload(&self, _audio: Vec<u8>) -> Result<String, TranscribeApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_upload {
            Some(message) => Err(TranscribeApiError::Http(message.clone())),
            None => Ok("https://fake.invalid/upload/audio-1".to_string()),
        }
    }

    async fn submit(
        &self,
        _audio_url: &str,
        _config: &JobConfig,
    ) -> Result<String, TranscribeApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fail_submit {
            Some(message) => Err(TranscribeApiError::Http(message.clone())),
            None => Ok("job-1".to_string()),
        }
    }

    async fn get_status(&self, _job_id: &str) -> Result<JobSnapshot, TranscribeApiError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.statuses.lock().pop_front() {
            return next;
        }
        match &self.repeat {
            Some(snapshot) => Ok(snapshot.clone()),
            None => Err(TranscribeApiError::Api {
                status: 500,
                message: "scripted status responses exhausted".to_string(),
            }),
        }
    }

    fn is_configured(&self) -> bool {
        self.configured
    }
}

// ============================================================================
// Summarization fakes
// ============================================================================

/// A well-formed generation response matching the required JSON shape
pub fn summary_json() -> String {
    r###"{
  "context": "A short sync about the product launch.",
  "participants": ["You (Host)", "Participant A"],
  "keyPoints": ["Launch is on schedule", "Docs need one more pass"],
  "actionItems": ["Host to review the docs by Friday"],
  "summaryMarkdown": "## Launch Sync\n\n- Launch is on schedule\n- Docs need one more pass"
}"###
    .to_string()
}

/// Summary provider replaying programmed generation outcomes.
///
/// Outcomes are consumed front to back; once they run out, `repeat_ok`
/// (if set) answers every further call, otherwise the call fails loudly.
pub struct ScriptedSummarizer {
    outcomes: Mutex<VecDeque<Result<String, GenerateError>>>,
    repeat_ok: Option<String>,
    calls: AtomicU32,
}

impl ScriptedSummarizer {
    pub fn with_outcomes(outcomes: Vec<Result<String, GenerateError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            repeat_ok: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Every call succeeds with the given response text
    pub fn returning(text: &str) -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            repeat_ok: Some(text.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    /// Every call is rate limited; retries will exhaust
    pub fn always_rate_limited() -> Self {
        Self::with_outcomes(vec![
            Err(GenerateError::RateLimited),
            Err(GenerateError::RateLimited),
            Err(GenerateError::RateLimited),
        ])
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SummaryProvider for ScriptedSummarizer {
    async fn generate(&self, _system: &str, _prompt: &str) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.outcomes.lock().pop_front() {
            return next;
        }
        match &self.repeat_ok {
            Some(text) => Ok(text.clone()),
            None => Err(GenerateError::Api {
                status: 500,
                message: "scripted generation outcomes exhausted".to_string(),
            }),
        }
    }
}

// ============================================================================
// Progress collection
// ============================================================================

/// Progress sink that records every reported percentage
#[derive(Default)]
pub struct CollectingSink {
    values: Mutex<Vec<u8>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> Vec<u8> {
        self.values.lock().clone()
    }
}

impl ProgressSink for CollectingSink {
    fn report(&self, percent: u8) {
        self.values.lock().push(percent);
    }
}

// ============================================================================
// Transcript fixture
// ============================================================================

/// A two-speaker transcript for summarization and storage tests
pub fn transcript_fixture() -> Transcript {
    Transcript {
        id: "transcript-1".to_string(),
        text: "Let's get started. Sounds good.".to_string(),
        confidence: 0.93,
        duration_seconds: 120.0,
        timestamp: Utc::now(),
        utterances: vec![
            Utterance {
                speaker_id: "1A".to_string(),
                text: "Let's get started.".to_string(),
                confidence: 0.95,
                start_ms: 0,
                end_ms: 1800,
            },
            Utterance {
                speaker_id: "2A".to_string(),
                text: "Sounds good.".to_string(),
                confidence: 0.91,
                start_ms: 2000,
                end_ms: 3100,
            },
        ],
        words: Vec::new(),
    }
}
