pub mod acquirer;
pub mod backend;
pub mod devices;
pub mod mixer;
pub mod recorder;

pub use acquirer::{AcquiredSources, ActiveSource, SourceAcquirer, SourceInfo};
pub use backend::{
    AudioFrame, BackendFactory, CaptureBackend, CaptureConfig, CaptureError, SourceKind,
    StopHandle,
};
pub use devices::DeviceBackendFactory;
pub use mixer::{MixPlan, MixedStream, MixerConfig, StreamMixer};
pub use recorder::{RecorderConfig, RecorderError, RecordingArtifact, WavRecorder};
