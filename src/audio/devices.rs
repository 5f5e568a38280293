// Device capture backends built on cpal.
//
// cpal streams are not Send, so each stream lives on a dedicated thread
// that builds it, plays it, and drops it when the stop handle fires. The
// stream callback downmixes to mono, decimates to the target rate, and
// hands fixed-duration frames to the async side over a bounded channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, SupportedStreamConfig};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::backend::{
    AudioFrame, BackendFactory, CaptureBackend, CaptureConfig, CaptureError, SourceKind,
    StopHandle,
};

/// Substrings that mark an input device as a system loopback/monitor source
const LOOPBACK_MARKERS: &[&str] = &[
    "monitor",
    "loopback",
    "stereo mix",
    "blackhole",
    "soundflower",
];

const FRAME_CHANNEL_CAPACITY: usize = 32;

/// Creates cpal-backed capture backends
pub struct DeviceBackendFactory {
    config: CaptureConfig,
}

impl DeviceBackendFactory {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

impl BackendFactory for DeviceBackendFactory {
    fn create(&self, kind: SourceKind) -> Result<Box<dyn CaptureBackend>, CaptureError> {
        Ok(Box::new(DeviceBackend::new(kind, self.config.clone())))
    }
}

/// Captures one cpal input device on a dedicated thread
pub struct DeviceBackend {
    kind: SourceKind,
    config: CaptureConfig,
    stop: StopHandle,
    name: &'static str,
}

impl DeviceBackend {
    pub fn new(kind: SourceKind, config: CaptureConfig) -> Self {
        let name = match kind {
            SourceKind::Microphone => "cpal-microphone",
            SourceKind::System => "cpal-loopback",
        };
        Self {
            kind,
            config,
            stop: StopHandle::new(),
            name,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for DeviceBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>, CaptureError> {
        let (frame_tx, frame_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = std_mpsc::channel();

        let kind = self.kind;
        let config = self.config.clone();
        let stop = self.stop.clone();

        thread::Builder::new()
            .name(format!("{}-capture", self.name))
            .spawn(move || capture_thread(kind, config, stop, frame_tx, ready_tx))
            .map_err(|e| CaptureError::Device(format!("failed to spawn capture thread: {e}")))?;

        // The thread reports back once the stream is playing (or failed to open).
        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .map_err(|e| CaptureError::Device(format!("capture handshake failed: {e}")))?
            .map_err(|_| {
                CaptureError::Device("capture thread exited before reporting readiness".into())
            })?;
        ready?;

        Ok(frame_rx)
    }

    fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Owns the cpal stream for its whole lifetime.
///
/// Exits when the stop handle fires or the stream reports a device error;
/// dropping the stream drops the callback and with it the frame sender,
/// which closes the channel on the async side.
fn capture_thread(
    kind: SourceKind,
    config: CaptureConfig,
    stop: StopHandle,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: std_mpsc::Sender<Result<(), CaptureError>>,
) {
    let (stream, failed) = match open_stream(kind, &config, frame_tx) {
        Ok(opened) => {
            let _ = ready_tx.send(Ok(()));
            opened
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while !stop.is_signalled() && !failed.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));
    }
    if failed.load(Ordering::SeqCst) {
        warn!("{} stream failed, shutting capture down", kind);
    }

    drop(stream);
    debug!("{} capture thread exiting", kind);
}

fn open_stream(
    kind: SourceKind,
    config: &CaptureConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<(cpal::Stream, Arc<AtomicBool>), CaptureError> {
    let host = cpal::default_host();
    let device = find_device(&host, kind)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

    let (supported, decimation) = pick_input_config(&device, config.target_sample_rate)?;
    info!(
        "Opening {} stream on '{}': {}Hz {}ch {:?} (decimation {})",
        kind,
        device_name,
        supported.sample_rate().0,
        supported.channels(),
        supported.sample_format(),
        decimation
    );

    let assembler = FrameAssembler::new(
        supported.channels(),
        decimation,
        config.target_sample_rate,
        config.buffer_duration_ms,
    );
    let failed = Arc::new(AtomicBool::new(false));

    let stream = match supported.sample_format() {
        SampleFormat::I16 => build_stream::<i16>(
            &device,
            &supported.config(),
            assembler,
            frame_tx,
            failed.clone(),
            kind,
        ),
        SampleFormat::U16 => build_stream::<u16>(
            &device,
            &supported.config(),
            assembler,
            frame_tx,
            failed.clone(),
            kind,
        ),
        SampleFormat::F32 => build_stream::<f32>(
            &device,
            &supported.config(),
            assembler,
            frame_tx,
            failed.clone(),
            kind,
        ),
        other => {
            return Err(CaptureError::Device(format!(
                "unsupported sample format {other:?}"
            )))
        }
    }?;

    stream
        .play()
        .map_err(|e| CaptureError::Device(format!("failed to start {kind} stream: {e}")))?;

    Ok((stream, failed))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut assembler: FrameAssembler,
    frame_tx: mpsc::Sender<AudioFrame>,
    failed: Arc<AtomicBool>,
    kind: SourceKind,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let samples: Vec<i16> = data.iter().map(|&s| i16::from_sample(s)).collect();
                for frame in assembler.push(&samples) {
                    // Never block the audio callback; a full channel means the
                    // consumer stalled and losing a frame is the lesser evil.
                    if frame_tx.try_send(frame).is_err() {
                        debug!("{} frame channel full, dropping frame", kind);
                    }
                }
            },
            move |err| {
                error!("{} stream error: {}", kind, err);
                failed.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| CaptureError::Device(format!("failed to build {kind} stream: {e}")))
}

fn find_device(host: &cpal::Host, kind: SourceKind) -> Result<cpal::Device, CaptureError> {
    match kind {
        SourceKind::Microphone => host
            .default_input_device()
            .ok_or_else(|| CaptureError::Device("no default input device".into())),
        SourceKind::System => find_loopback_device(host).ok_or_else(|| {
            CaptureError::Device("no loopback/monitor input device found".into())
        }),
    }
}

/// Picks the first input device whose name marks it as a monitor of the
/// system output (PulseAudio/PipeWire monitors, Stereo Mix, BlackHole).
fn find_loopback_device(host: &cpal::Host) -> Option<cpal::Device> {
    let devices = host.input_devices().ok()?;
    for device in devices {
        if let Ok(name) = device.name() {
            if matches_loopback_name(&name) {
                debug!("Using '{}' as system loopback source", name);
                return Some(device);
            }
        }
    }
    None
}

fn matches_loopback_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    LOOPBACK_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Prefer a config that runs natively at the target rate; otherwise fall
/// back to the device default and decimate when the rate divides evenly.
fn pick_input_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<(SupportedStreamConfig, u32), CaptureError> {
    if let Ok(ranges) = device.supported_input_configs() {
        for range in ranges {
            if let Some(cfg) = range.try_with_sample_rate(cpal::SampleRate(target_rate)) {
                return Ok((cfg, 1));
            }
        }
    }

    let default = device
        .default_input_config()
        .map_err(|e| CaptureError::Device(format!("no usable input config: {e}")))?;
    let device_rate = default.sample_rate().0;
    if device_rate >= target_rate && device_rate % target_rate == 0 {
        return Ok((default, device_rate / target_rate));
    }
    Err(CaptureError::Device(format!(
        "device rate {device_rate}Hz cannot be decimated to {target_rate}Hz"
    )))
}

/// Accumulates interleaved device samples into fixed-duration mono frames
/// at the target rate.
///
/// Timestamps count emitted samples rather than wall time, so the frame
/// clock is deterministic and gap-free.
struct FrameAssembler {
    device_channels: usize,
    decimation: usize,
    output_rate: u32,
    samples_per_frame: usize,
    pending: Vec<i16>,
    decim_phase: usize,
    emitted_samples: u64,
}

impl FrameAssembler {
    fn new(device_channels: u16, decimation: u32, output_rate: u32, frame_ms: u64) -> Self {
        let samples_per_frame =
            ((output_rate as u64 * frame_ms / 1000).max(1)) as usize;
        Self {
            device_channels: device_channels.max(1) as usize,
            decimation: decimation.max(1) as usize,
            output_rate,
            samples_per_frame,
            pending: Vec::with_capacity(samples_per_frame),
            decim_phase: 0,
            emitted_samples: 0,
        }
    }

    fn push(&mut self, interleaved: &[i16]) -> Vec<AudioFrame> {
        for chunk in interleaved.chunks_exact(self.device_channels) {
            let take = self.decim_phase == 0;
            self.decim_phase = (self.decim_phase + 1) % self.decimation;
            if !take {
                continue;
            }
            let sum: i32 = chunk.iter().map(|&s| i32::from(s)).sum();
            self.pending.push((sum / self.device_channels as i32) as i16);
        }

        let mut out = Vec::new();
        while self.pending.len() >= self.samples_per_frame {
            let rest = self.pending.split_off(self.samples_per_frame);
            let samples = std::mem::replace(&mut self.pending, rest);
            let timestamp_ms = self.emitted_samples * 1000 / self.output_rate as u64;
            self.emitted_samples += samples.len() as u64;
            out.push(AudioFrame {
                samples,
                sample_rate: self.output_rate,
                channels: 1,
                timestamp_ms,
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembler_downmixes_stereo_to_mono() {
        let mut assembler = FrameAssembler::new(2, 1, 4, 1000); // 4 samples per frame
        let frames = assembler.push(&[100, 200, -100, 100, 0, 0, 400, 600]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![150, 0, 0, 500]);
        assert_eq!(frames[0].channels, 1);
    }

    #[test]
    fn assembler_decimates_by_integer_ratio() {
        let mut assembler = FrameAssembler::new(1, 3, 2, 1000); // keep every 3rd sample
        let frames = assembler.push(&[10, 20, 30, 40, 50, 60]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![10, 40]);
    }

    #[test]
    fn assembler_carries_partial_frames_across_pushes() {
        let mut assembler = FrameAssembler::new(1, 1, 4, 1000);
        assert!(assembler.push(&[1, 2, 3]).is_empty());
        let frames = assembler.push(&[4, 5]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples, vec![1, 2, 3, 4]);
    }

    #[test]
    fn assembler_timestamps_follow_emitted_samples() {
        let mut assembler = FrameAssembler::new(1, 1, 10, 1000); // 10 samples = 1s frames
        let first = assembler.push(&[0; 10]);
        let second = assembler.push(&[0; 10]);
        assert_eq!(first[0].timestamp_ms, 0);
        assert_eq!(second[0].timestamp_ms, 1000);
    }

    #[test]
    fn loopback_markers_match_monitor_names() {
        assert!(matches_loopback_name(
            "Monitor of Built-in Audio Analog Stereo"
        ));
        assert!(matches_loopback_name("BlackHole 2ch"));
        assert!(matches_loopback_name("Stereo Mix (Realtek)"));
        assert!(!matches_loopback_name("USB Condenser Microphone"));
    }
}
