//! Recording session lifecycle
//!
//! This module provides the session layer that manages:
//! - The session state machine (idle, recording, processing, terminal)
//! - The driver that wires capture, transcription, summarization, and
//!   artifact storage together
//! - The bounded UI event queue

pub mod driver;
pub mod events;
pub mod state;

pub use driver::SessionDriver;
pub use events::{progress_message, EventSink, ProgressSink, UiEvent, EVENT_QUEUE_CAPACITY};
pub use state::{transition, CompletedTranscript, SessionEvent, SessionState};
