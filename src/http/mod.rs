//! HTTP API server for external control (desktop shell or CLI)
//!
//! This module provides a REST API for driving recording sessions:
//! - POST /session/record/start - Start the recording session
//! - POST /session/record/stop - Stop capture and begin processing
//! - POST /session/reset - Return to idle from a terminal state
//! - GET /session/status - Query session state
//! - GET /session/events - Drain pending UI events
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
