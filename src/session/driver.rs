//! Session driver.
//!
//! Owns the state machine, the UI event queue, and the pipeline
//! components. Every state mutation flows through here, so the
//! single-session and terminal-event invariants hold by construction:
//! start claims the state under the lock before any async work begins,
//! and everything downstream applies events through the total
//! transition function.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::audio::{
    BackendFactory, CaptureError, MixerConfig, RecorderConfig, RecordingArtifact, SourceAcquirer,
    SourceInfo, SourceKind, StreamMixer, WavRecorder,
};
use crate::error::{ErrorInfo, PipelineError};
use crate::session::events::{progress_message, EventSink, ProgressSink, UiEvent};
use crate::session::state::{transition, CompletedTranscript, SessionEvent, SessionState};
use crate::storage::ArtifactStore;
use crate::summarize::SummarizationOrchestrator;
use crate::transcribe::TranscriptionOrchestrator;

/// Resources owned by a live recording
struct ActiveRecording {
    recorder: WavRecorder,
    ticker: JoinHandle<()>,
    watchdog: JoinHandle<()>,
}

/// Drives recording sessions end to end
pub struct SessionDriver {
    inner: Arc<DriverInner>,
}

struct DriverInner {
    state: Mutex<SessionState>,
    events: EventSink,
    event_rx: Mutex<mpsc::Receiver<UiEvent>>,
    active: Mutex<Option<ActiveRecording>>,
    acquirer: SourceAcquirer,
    mixer_config: MixerConfig,
    recorder_config: RecorderConfig,
    transcriber: TranscriptionOrchestrator,
    summarizer: SummarizationOrchestrator,
    store: ArtifactStore,
    cancel: CancellationToken,
}

impl SessionDriver {
    pub fn new(
        factory: Arc<dyn BackendFactory>,
        transcriber: TranscriptionOrchestrator,
        summarizer: SummarizationOrchestrator,
        store: ArtifactStore,
        mixer_config: MixerConfig,
        recorder_config: RecorderConfig,
    ) -> Self {
        let (events, event_rx) = EventSink::new();
        Self {
            inner: Arc::new(DriverInner {
                state: Mutex::new(SessionState::Idle),
                events,
                event_rx: Mutex::new(event_rx),
                active: Mutex::new(None),
                acquirer: SourceAcquirer::new(factory),
                mixer_config,
                recorder_config,
                transcriber,
                summarizer,
                store,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Snapshot of the current session state
    pub fn state(&self) -> SessionState {
        self.inner.state.lock().clone()
    }

    /// Take every UI event queued since the last drain
    pub fn drain_events(&self) -> Vec<UiEvent> {
        let mut rx = self.inner.event_rx.lock();
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Begin a recording session.
    ///
    /// The state is claimed before any device work starts, so a second
    /// start can never race past the guard. Failures after the claim
    /// land the session in the error state as well as in the returned
    /// result.
    pub async fn start_recording(&self) -> Result<SourceInfo, PipelineError> {
        {
            let mut state = self.inner.state.lock();
            if !matches!(*state, SessionState::Idle) {
                return Err(PipelineError::AlreadyActive);
            }
            let next = transition(&state, SessionEvent::Start);
            *state = next;
        }

        match self.try_start().await {
            Ok(info) => Ok(info),
            Err(e) => {
                error!("Could not start recording: {}", e);
                self.inner.fail(e.to_error_info());
                Err(e)
            }
        }
    }

    async fn try_start(&self) -> Result<SourceInfo, PipelineError> {
        let inner = &self.inner;

        let mut sources = inner.acquirer.acquire().await?;
        let info = sources.info();
        let stops = sources.stop_handles();

        let mixed = StreamMixer::new(inner.mixer_config.clone()).mix(
            sources.mic.take().map(|src| src.frames),
            sources.system.take().map(|src| src.frames),
        )?;

        let mut recorder = WavRecorder::new(inner.recorder_config.clone());
        recorder.start(mixed, stops, inner.store.temp_audio_path())?;

        let ticker = tokio::spawn({
            let inner = Arc::clone(inner);
            async move {
                let started = tokio::time::Instant::now();
                let mut tick = tokio::time::interval(Duration::from_secs(1));
                tick.tick().await; // first tick fires immediately
                loop {
                    tick.tick().await;
                    inner.apply(SessionEvent::DurationTick(started.elapsed().as_secs()));
                }
            }
        });

        let watchdog = tokio::spawn({
            let inner = Arc::clone(inner);
            let mut interruptions = sources.interruptions;
            async move {
                if let Some(kind) = interruptions.recv().await {
                    inner.handle_interruption(kind).await;
                }
            }
        });

        *inner.active.lock() = Some(ActiveRecording {
            recorder,
            ticker,
            watchdog,
        });

        info!(
            "Recording started (microphone={}, system={})",
            info.microphone, info.system
        );
        Ok(info)
    }

    /// Stop capture and hand the artifact to the processing pipeline.
    ///
    /// Returns once the session is in the processing state; the pipeline
    /// itself continues in a background task and reports through the
    /// state machine and event queue.
    pub async fn stop_recording(&self) -> Result<(), PipelineError> {
        let Some(mut active) = self.inner.active.lock().take() else {
            return Err(PipelineError::Recorder(
                crate::audio::RecorderError::NoActiveRecording,
            ));
        };
        active.ticker.abort();
        active.watchdog.abort();

        self.inner.apply(SessionEvent::Stop);

        let artifact = match active.recorder.stop().await {
            Ok(artifact) => artifact,
            Err(e) => {
                let err = PipelineError::from(e);
                error!("Recording could not be finalized: {}", err);
                self.inner.fail(err.to_error_info());
                return Err(err);
            }
        };
        info!(
            "Captured {:.1}s of audio ({} bytes)",
            artifact.duration_seconds, artifact.bytes
        );

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            if let Err(e) = inner.run_processing(artifact).await {
                error!("Processing failed: {}", e);
                inner.fail(e.to_error_info());
            }
        });
        Ok(())
    }

    /// Return to idle from a terminal state
    pub fn reset(&self) -> Result<(), PipelineError> {
        {
            let mut state = self.inner.state.lock();
            if !state.is_terminal() {
                return Err(PipelineError::NotResettable);
            }
            let next = transition(&state, SessionEvent::Reset);
            *state = next;
        }
        self.inner.events.rearm();
        info!("Session reset");
        Ok(())
    }

    /// Cancel in-flight work; used on process shutdown
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }
}

impl DriverInner {
    fn apply(&self, event: SessionEvent) {
        let mut state = self.state.lock();
        let next = transition(&state, event);
        *state = next;
    }

    /// Progress goes both into the state machine and out to UI clients
    fn report_progress(&self, percent: u8) {
        let message = progress_message(percent);
        self.apply(SessionEvent::Progress {
            percent,
            message: message.to_string(),
        });
        self.events.emit_progress(percent, message);
    }

    fn fail(&self, error: ErrorInfo) {
        self.apply(SessionEvent::Failed(error.clone()));
        self.events.emit_error(error);
    }

    fn complete(&self, completed: CompletedTranscript) {
        let boxed = Box::new(completed);
        self.apply(SessionEvent::Completed(boxed.clone()));
        self.events.emit_completed(boxed);
    }

    /// A capture stream died without a stop request
    async fn handle_interruption(&self, kind: SourceKind) {
        let Some(mut active) = self.active.lock().take() else {
            debug!("{} interruption after recording ended, ignoring", kind);
            return;
        };
        warn!("{} stream interrupted, failing the session", kind);

        active.ticker.abort();
        // Finalize so the capture hardware is released, then discard the
        // partial artifact.
        if let Ok(artifact) = active.recorder.stop().await {
            self.store.cleanup_temp(&artifact.path).await;
        }

        let err = PipelineError::Capture(CaptureError::Interrupted { kind });
        self.fail(err.to_error_info());
    }

    async fn run_processing(
        self: &Arc<Self>,
        artifact: RecordingArtifact,
    ) -> Result<(), PipelineError> {
        let reporter = DriverProgress {
            inner: Arc::clone(self),
        };
        let transcript = self
            .transcriber
            .transcribe(&artifact.path, &reporter, &self.cancel)
            .await?;

        let saved_path = self.store.save_transcript(&transcript).await?;
        self.store.cleanup_temp(&artifact.path).await;

        // Hold at 95 while the summary generates; the one place progress
        // steps back down from 100.
        self.report_progress(95);

        let (summary, summary_error) =
            match self.summarizer.summarize(&transcript, &self.cancel).await {
                Ok(mut summary) => match self.store.save_summary(&summary, &saved_path).await {
                    Ok(path) => {
                        summary.saved_path = Some(path);
                        (Some(summary), None)
                    }
                    Err(e) => {
                        warn!("Summary could not be saved: {}", e);
                        (None, Some(format!("Failed to save summary: {e}")))
                    }
                },
                Err(e) => {
                    warn!("Summarization failed: {}", e);
                    (None, Some(e.to_string()))
                }
            };

        if summary.is_some() {
            info!("Session complete");
        } else {
            info!("Session complete (transcript only)");
        }

        self.complete(CompletedTranscript {
            transcript,
            saved_path,
            summary,
            summary_error,
        });
        Ok(())
    }
}

/// Routes transcription progress into the driver
struct DriverProgress {
    inner: Arc<DriverInner>,
}

impl ProgressSink for DriverProgress {
    fn report(&self, percent: u8) {
        self.inner.report_progress(percent);
    }
}
