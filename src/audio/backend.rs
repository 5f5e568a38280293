use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Which physical capture path a stream comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Microphone input (user's voice)
    Microphone,
    /// System loopback (applications, browser, etc.)
    System,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Microphone => write!(f, "microphone"),
            SourceKind::System => write!(f, "system audio"),
        }
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Frame duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// Configuration for capture backends
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (decimated if the device runs faster)
    pub target_sample_rate: u32,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz is plenty for speech
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

/// Errors raised while acquiring or running capture streams
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    /// Neither requested source could be acquired
    #[error("no audio source available; grant microphone access or enable a loopback device")]
    NoAudioSource,
    /// A source ended on its own while a recording was active.
    /// The field is not named `source`; thiserror reserves that name
    /// for the error chain.
    #[error("{kind} stream ended unexpectedly")]
    Interrupted { kind: SourceKind },
    /// Device lookup or stream setup failed
    #[error("audio device error: {0}")]
    Device(String),
}

/// Cooperative stop signal shared between the owner of a capture stream
/// and the thread that runs it.
///
/// Signalling the handle asks the stream to wind down; the capture side
/// closes its frame channel once it has. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the associated stream to stop
    pub fn signal(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// True once stop has been requested
    pub fn is_signalled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Device capture via cpal (microphone and loopback/monitor inputs)
/// - Scripted frames for tests (see `test_support`)
#[async_trait::async_trait]
pub trait CaptureBackend: Send {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. The
    /// channel closes when the stream stops, whether requested through
    /// the stop handle or because the device went away.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError>;

    /// Handle used to request the stream to stop
    fn stop_handle(&self) -> StopHandle;

    /// Which source this backend captures
    fn kind(&self) -> SourceKind;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Creates a fresh backend per source for each recording session
pub trait BackendFactory: Send + Sync {
    fn create(&self, kind: SourceKind) -> Result<Box<dyn CaptureBackend>, CaptureError>;
}
