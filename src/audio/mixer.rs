// Stream mixer for combining microphone and system audio.
//
// Policy:
// - Both sources present: two-channel output, microphone on channel 0 and
//   system audio on channel 1, so the transcription provider can
//   attribute speech per channel. Frames are paired as they arrive and
//   the shorter side is padded with silence.
// - One source present: passthrough. The original receiver is handed back
//   untouched, so single-source audio is bit-identical to what the
//   backend produced.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::{AudioFrame, CaptureError};

const MIX_CHANNEL_CAPACITY: usize = 32;

/// Which merge policy a mixed stream was built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixPlan {
    /// Mic on channel 0, system on channel 1
    Stereo,
    /// Microphone passthrough
    MicOnly,
    /// System audio passthrough
    SystemOnly,
}

/// Configuration for the stream mixer
#[derive(Debug, Clone)]
pub struct MixerConfig {
    /// Sample rate every input frame must carry
    pub sample_rate: u32,
    /// How many frames one side may lag behind before the backlog is
    /// flushed against silence instead of waiting
    pub max_lag_frames: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            max_lag_frames: 8, // ~800ms at 100ms frames
        }
    }
}

/// The mixer's output: one frame stream plus its format
pub struct MixedStream {
    pub plan: MixPlan,
    pub channels: u16,
    pub sample_rate: u32,
    frames: mpsc::Receiver<AudioFrame>,
}

impl MixedStream {
    pub async fn recv(&mut self) -> Option<AudioFrame> {
        self.frames.recv().await
    }
}

/// Merges per-source frame streams into a single recordable stream
pub struct StreamMixer {
    config: MixerConfig,
}

impl StreamMixer {
    pub fn new(config: MixerConfig) -> Self {
        Self { config }
    }

    /// Build the mixed stream for whichever sources were acquired.
    ///
    /// Neither source present is an error; the acquirer guards this, the
    /// check here keeps the invariant local.
    pub fn mix(
        &self,
        mic: Option<mpsc::Receiver<AudioFrame>>,
        system: Option<mpsc::Receiver<AudioFrame>>,
    ) -> Result<MixedStream, CaptureError> {
        let sample_rate = self.config.sample_rate;
        match (mic, system) {
            (Some(mic_rx), Some(sys_rx)) => {
                info!("Mixing microphone + system audio into stereo");
                let (tx, rx) = mpsc::channel(MIX_CHANNEL_CAPACITY);
                let max_lag = self.config.max_lag_frames;
                tokio::spawn(stereo_merge(mic_rx, sys_rx, tx, sample_rate, max_lag));
                Ok(MixedStream {
                    plan: MixPlan::Stereo,
                    channels: 2,
                    sample_rate,
                    frames: rx,
                })
            }
            (Some(mic_rx), None) => {
                info!("Single source: microphone passthrough");
                Ok(MixedStream {
                    plan: MixPlan::MicOnly,
                    channels: 1,
                    sample_rate,
                    frames: mic_rx,
                })
            }
            (None, Some(sys_rx)) => {
                info!("Single source: system audio passthrough");
                Ok(MixedStream {
                    plan: MixPlan::SystemOnly,
                    channels: 1,
                    sample_rate,
                    frames: sys_rx,
                })
            }
            (None, None) => Err(CaptureError::NoAudioSource),
        }
    }
}

/// Pairs frames from both sides into interleaved stereo.
///
/// Frames are paired in arrival order. When one side closes or falls more
/// than `max_lag` frames behind, the other side is flushed against
/// silence so nothing is lost and the output keeps flowing.
async fn stereo_merge(
    mut mic: mpsc::Receiver<AudioFrame>,
    mut system: mpsc::Receiver<AudioFrame>,
    out: mpsc::Sender<AudioFrame>,
    sample_rate: u32,
    max_lag: usize,
) {
    let mut mic_buf: VecDeque<AudioFrame> = VecDeque::new();
    let mut sys_buf: VecDeque<AudioFrame> = VecDeque::new();
    let mut mic_open = true;
    let mut sys_open = true;
    let mut merged = 0u64;

    while mic_open || sys_open {
        tokio::select! {
            frame = mic.recv(), if mic_open => match frame {
                Some(f) if frame_format_ok(&f, sample_rate) => mic_buf.push_back(f),
                Some(_) => {}
                None => mic_open = false,
            },
            frame = system.recv(), if sys_open => match frame {
                Some(f) if frame_format_ok(&f, sample_rate) => sys_buf.push_back(f),
                Some(_) => {}
                None => sys_open = false,
            },
        }

        loop {
            let mic_ready = !mic_buf.is_empty();
            let sys_ready = !sys_buf.is_empty();
            let flush_mic = mic_ready && (!sys_open || mic_buf.len() > max_lag);
            let flush_sys = sys_ready && (!mic_open || sys_buf.len() > max_lag);

            let (mic_frame, sys_frame) = if mic_ready && sys_ready {
                (mic_buf.pop_front(), sys_buf.pop_front())
            } else if flush_mic {
                debug!("Pairing lagging microphone frame with silence");
                (mic_buf.pop_front(), None)
            } else if flush_sys {
                debug!("Pairing lagging system frame with silence");
                (None, sys_buf.pop_front())
            } else {
                break;
            };

            let frame = interleave(mic_frame, sys_frame, sample_rate);
            merged += 1;
            if out.send(frame).await.is_err() {
                debug!("Mixed stream consumer gone, stopping merge");
                return;
            }
        }
    }

    info!("Stereo merge complete: {} frames produced", merged);
}

fn frame_format_ok(frame: &AudioFrame, sample_rate: u32) -> bool {
    if frame.sample_rate != sample_rate {
        warn!(
            "Frame sample rate mismatch: expected {}, got {}. Dropping frame.",
            sample_rate, frame.sample_rate
        );
        return false;
    }
    if frame.channels != 1 {
        warn!(
            "Expected mono source frames, got {} channels. Dropping frame.",
            frame.channels
        );
        return false;
    }
    true
}

/// Interleave one mic frame and one system frame into a stereo frame,
/// zero-filling whichever side is missing or shorter.
fn interleave(
    mic: Option<AudioFrame>,
    system: Option<AudioFrame>,
    sample_rate: u32,
) -> AudioFrame {
    let mic_len = mic.as_ref().map(|f| f.samples.len()).unwrap_or(0);
    let sys_len = system.as_ref().map(|f| f.samples.len()).unwrap_or(0);
    let len = mic_len.max(sys_len);

    let timestamp_ms = match (&mic, &system) {
        (Some(m), Some(s)) => m.timestamp_ms.min(s.timestamp_ms),
        (Some(m), None) => m.timestamp_ms,
        (None, Some(s)) => s.timestamp_ms,
        (None, None) => 0,
    };

    let mut samples = Vec::with_capacity(len * 2);
    for i in 0..len {
        samples.push(
            mic.as_ref()
                .and_then(|f| f.samples.get(i))
                .copied()
                .unwrap_or(0),
        );
        samples.push(
            system
                .as_ref()
                .and_then(|f| f.samples.get(i))
                .copied()
                .unwrap_or(0),
        );
    }

    AudioFrame {
        samples,
        sample_rate,
        channels: 2,
        timestamp_ms,
    }
}
