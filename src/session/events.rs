//! Bounded UI event queue and progress presentation.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::ErrorInfo;
use crate::session::state::CompletedTranscript;

/// Slow consumers lose events rather than stalling the pipeline.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Observer for pipeline progress reports
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8);
}

/// Events pushed to UI clients between status polls
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UiEvent {
    Progress { percent: u8, message: String },
    Completed { transcript: Box<CompletedTranscript> },
    Error { error: ErrorInfo },
}

/// Producer side of the UI event queue.
///
/// Completion and error are terminal: the first one wins and later
/// terminals are dropped until [`EventSink::rearm`] runs on reset.
pub struct EventSink {
    tx: mpsc::Sender<UiEvent>,
    terminal_sent: AtomicBool,
}

impl EventSink {
    pub fn new() -> (Self, mpsc::Receiver<UiEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let sink = Self {
            tx,
            terminal_sent: AtomicBool::new(false),
        };
        (sink, rx)
    }

    pub fn emit_progress(&self, percent: u8, message: impl Into<String>) {
        self.push(UiEvent::Progress {
            percent,
            message: message.into(),
        });
    }

    pub fn emit_completed(&self, transcript: Box<CompletedTranscript>) {
        if self.claim_terminal() {
            self.push(UiEvent::Completed { transcript });
        } else {
            warn!("Dropping completion event, a terminal event was already emitted");
        }
    }

    pub fn emit_error(&self, error: ErrorInfo) {
        if self.claim_terminal() {
            self.push(UiEvent::Error { error });
        } else {
            warn!("Dropping error event, a terminal event was already emitted");
        }
    }

    /// Allow the next terminal event after a session reset
    pub fn rearm(&self) {
        self.terminal_sent.store(false, Ordering::SeqCst);
    }

    fn claim_terminal(&self) -> bool {
        !self.terminal_sent.swap(true, Ordering::SeqCst)
    }

    fn push(&self, event: UiEvent) {
        if self.tx.try_send(event).is_err() {
            warn!("UI event queue full or closed, dropping event");
        }
    }
}

/// Human-readable phase for a transcription progress percentage
pub fn progress_message(percent: u8) -> &'static str {
    match percent {
        p if p < 30 => "Uploading audio...",
        p if p < 90 => "Transcribing...",
        p if p < 95 => "Saving transcript...",
        _ => "Generating summary...",
    }
}
