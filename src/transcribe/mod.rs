pub mod http;
pub mod orchestrator;
pub mod provider;
pub mod types;

pub use http::HttpTranscriptionProvider;
pub use orchestrator::{
    TranscriptionError, TranscriptionOrchestrator, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL,
};
pub use provider::{TranscribeApiError, TranscriptionProvider};
pub use types::{JobConfig, JobSnapshot, JobStatus, Transcript, TranscriptionJob, Utterance, Word};
