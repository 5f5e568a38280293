use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use tracing::{error, info};

use super::state::AppState;
use crate::audio::{RecorderError, SourceInfo};
use crate::error::PipelineError;
use crate::session::{SessionState, UiEvent};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: String,
    pub sources: SourceInfo,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Guard rejections are client errors; everything else is on us
fn error_status(err: &PipelineError) -> StatusCode {
    match err {
        PipelineError::AlreadyActive | PipelineError::NotResettable => StatusCode::CONFLICT,
        PipelineError::Recorder(RecorderError::NoActiveRecording) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /session/record/start
/// Begin a recording session
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    info!("Start recording requested");

    match state.driver.start_recording().await {
        Ok(sources) => (
            StatusCode::OK,
            Json(StartResponse {
                status: "recording".to_string(),
                sources,
                message: "Recording started".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to start recording: {}", e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/record/stop
/// Stop capture; transcription and summarization continue in the
/// background, hence 202.
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    info!("Stop recording requested");

    match state.driver.stop_recording().await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(AckResponse {
                status: "processing".to_string(),
                message: "Recording stopped, processing started".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to stop recording: {}", e);
            (
                error_status(&e),
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// POST /session/reset
/// Return to idle from a finished or failed session
pub async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    match state.driver.reset() {
        Ok(()) => (
            StatusCode::OK,
            Json(AckResponse {
                status: "idle".to_string(),
                message: "Session reset".to_string(),
            }),
        )
            .into_response(),
        Err(e) => (
            error_status(&e),
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /session/status
/// Snapshot of the session state machine
pub async fn get_status(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.driver.state())
}

/// GET /session/events
/// Drain UI events queued since the last call
pub async fn get_events(State(state): State<AppState>) -> Json<Vec<UiEvent>> {
    Json(state.driver.drain_events())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
