pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod storage;
pub mod summarize;
pub mod test_support;
pub mod transcribe;

pub use audio::{
    AudioFrame, BackendFactory, CaptureBackend, CaptureConfig, MixerConfig, RecorderConfig,
    SourceAcquirer, SourceKind, StreamMixer, WavRecorder,
};
pub use config::Config;
pub use error::{ErrorInfo, ErrorKind, PipelineError};
pub use http::{create_router, AppState};
pub use session::{SessionDriver, SessionState, UiEvent};
pub use storage::ArtifactStore;
pub use summarize::{SummarizationOrchestrator, Summary};
pub use transcribe::{Transcript, TranscriptionOrchestrator};
