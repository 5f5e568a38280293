//! UI-facing error classification and the umbrella error for the
//! recording pipeline.
//!
//! Domain errors live next to their modules; this module folds them into
//! one type the session driver can classify for clients.

use serde::Serialize;

use crate::audio::{CaptureError, RecorderError};
use crate::storage::StoreError;
use crate::transcribe::TranscriptionError;

/// Coarse classification UI clients switch on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorKind {
    /// Device or capture access was denied or unavailable
    Permission,
    /// Something local broke mid-flight
    Runtime,
    /// A remote provider or persistence step failed
    Api,
}

/// What a failed session shows to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorInfo {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Everything the session driver can fail with
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("a recording session is already active")]
    AlreadyActive,
    #[error("session is not in a resettable state")]
    NotResettable,
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Recorder(#[from] RecorderError),
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error("failed to persist transcript: {0}")]
    Store(#[from] StoreError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::AlreadyActive | PipelineError::NotResettable => ErrorKind::Runtime,
            // Acquisition failures read as access problems to the user;
            // streams dying mid-recording do not.
            PipelineError::Capture(CaptureError::NoAudioSource)
            | PipelineError::Capture(CaptureError::Device(_)) => ErrorKind::Permission,
            PipelineError::Capture(CaptureError::Interrupted { .. }) => ErrorKind::Runtime,
            PipelineError::Recorder(_) => ErrorKind::Runtime,
            PipelineError::Transcription(TranscriptionError::ReadArtifact(_)) => {
                ErrorKind::Runtime
            }
            PipelineError::Transcription(_) => ErrorKind::Api,
            PipelineError::Store(_) => ErrorKind::Api,
        }
    }

    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.kind(), self.to_string())
    }
}
