//! Session lifecycle as a pure state machine.
//!
//! States serialize in the shape UI clients consume (`status` tag plus
//! variant fields). All mutation goes through [`transition`], which is
//! total: pairs with no defined edge leave the state untouched, so a
//! stray reset mid-recording or a duplicate terminal event cannot
//! corrupt the lifecycle.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::ErrorInfo;
use crate::summarize::Summary;
use crate::transcribe::Transcript;

/// Everything a finished session hands to the UI.
///
/// The transcript fields are flattened so clients see one flat object
/// with the saved path and optional summary alongside.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTranscript {
    #[serde(flatten)]
    pub transcript: Transcript,
    pub saved_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    /// Set when summarization failed or could not be persisted; the
    /// transcript itself is still good.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_error: Option<String>,
}

/// One recording session at a time; terminal states hold until reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Recording {
        /// Seconds since capture started
        duration: u64,
    },
    Processing {
        /// 0-100, monotonic except for the hold at 95 while the
        /// summary generates
        progress: u8,
        message: String,
    },
    Displaying {
        transcript: Box<CompletedTranscript>,
    },
    Error {
        error: ErrorInfo,
    },
}

impl SessionState {
    /// DISPLAYING and ERROR end a session; only reset leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Displaying { .. } | SessionState::Error { .. }
        )
    }
}

/// Inputs that drive the lifecycle
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Start,
    DurationTick(u64),
    Stop,
    Progress { percent: u8, message: String },
    Completed(Box<CompletedTranscript>),
    Failed(ErrorInfo),
    Reset,
}

/// Apply one event to a state. Undefined pairs return the state
/// unchanged.
pub fn transition(state: &SessionState, event: SessionEvent) -> SessionState {
    match (state, event) {
        (SessionState::Idle, SessionEvent::Start) => SessionState::Recording { duration: 0 },
        (SessionState::Recording { .. }, SessionEvent::DurationTick(duration)) => {
            SessionState::Recording { duration }
        }
        (SessionState::Recording { .. }, SessionEvent::Stop) => SessionState::Processing {
            progress: 0,
            message: "Preparing...".to_string(),
        },
        (SessionState::Processing { .. }, SessionEvent::Progress { percent, message }) => {
            SessionState::Processing {
                progress: percent,
                message,
            }
        }
        (SessionState::Processing { .. }, SessionEvent::Completed(transcript)) => {
            SessionState::Displaying { transcript }
        }
        (
            SessionState::Idle | SessionState::Recording { .. } | SessionState::Processing { .. },
            SessionEvent::Failed(error),
        ) => SessionState::Error { error },
        (
            SessionState::Displaying { .. } | SessionState::Error { .. },
            SessionEvent::Reset,
        ) => SessionState::Idle,
        _ => state.clone(),
    }
}
