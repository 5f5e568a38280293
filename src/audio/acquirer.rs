// Dual-source acquisition.
//
// Microphone and system audio are requested concurrently and
// independently: one source failing or missing never blocks the other,
// and a session can run with either alone. Only both missing is fatal.
//
// Every acquired source gets an end-of-stream monitor that relays frames
// and reports when a stream dies while no stop was requested, without
// touching the other source.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::{
    AudioFrame, BackendFactory, CaptureError, SourceKind, StopHandle,
};

const MONITOR_CHANNEL_CAPACITY: usize = 32;
const INTERRUPT_CHANNEL_CAPACITY: usize = 4;

/// One live capture stream
pub struct ActiveSource {
    pub kind: SourceKind,
    pub frames: mpsc::Receiver<AudioFrame>,
    pub stop: StopHandle,
}

/// Which sources a session is recording from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub microphone: bool,
    pub system: bool,
}

/// Everything acquisition produced: zero, one, or two live sources plus
/// the channel on which unexpected stream deaths are reported.
pub struct AcquiredSources {
    pub mic: Option<ActiveSource>,
    pub system: Option<ActiveSource>,
    pub interruptions: mpsc::Receiver<SourceKind>,
}

impl AcquiredSources {
    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            microphone: self.mic.is_some(),
            system: self.system.is_some(),
        }
    }

    /// Stop handles for every live source, for whoever owns teardown
    pub fn stop_handles(&self) -> Vec<StopHandle> {
        let mut handles = Vec::new();
        if let Some(src) = &self.mic {
            handles.push(src.stop.clone());
        }
        if let Some(src) = &self.system {
            handles.push(src.stop.clone());
        }
        handles
    }
}

/// Acquires capture sources through an injected backend factory
pub struct SourceAcquirer {
    factory: Arc<dyn BackendFactory>,
}

impl SourceAcquirer {
    pub fn new(factory: Arc<dyn BackendFactory>) -> Self {
        Self { factory }
    }

    /// Try to acquire both sources concurrently.
    ///
    /// Per-source failures are logged and tolerated; both failing is
    /// `CaptureError::NoAudioSource`.
    pub async fn acquire(&self) -> Result<AcquiredSources, CaptureError> {
        let (interrupt_tx, interrupt_rx) = mpsc::channel(INTERRUPT_CHANNEL_CAPACITY);

        let (mic, system) = futures::future::join(
            self.acquire_one(SourceKind::Microphone, interrupt_tx.clone()),
            self.acquire_one(SourceKind::System, interrupt_tx),
        )
        .await;

        if mic.is_none() && system.is_none() {
            return Err(CaptureError::NoAudioSource);
        }

        info!(
            "Audio sources acquired: microphone={}, system={}",
            mic.is_some(),
            system.is_some()
        );

        Ok(AcquiredSources {
            mic,
            system,
            interruptions: interrupt_rx,
        })
    }

    async fn acquire_one(
        &self,
        kind: SourceKind,
        interruptions: mpsc::Sender<SourceKind>,
    ) -> Option<ActiveSource> {
        let mut backend = match self.factory.create(kind) {
            Ok(backend) => backend,
            Err(e) => {
                warn!("Could not create {} backend: {}", kind, e);
                return None;
            }
        };

        match backend.start().await {
            Ok(raw) => {
                let stop = backend.stop_handle();
                let frames = monitor_stream(kind, raw, stop.clone(), interruptions);
                debug!("{} acquired via {}", kind, backend.name());
                Some(ActiveSource { kind, frames, stop })
            }
            Err(e) => {
                warn!("Could not acquire {}: {}", kind, e);
                None
            }
        }
    }
}

/// Relay frames while watching for the stream ending on its own.
///
/// A stream that closes without its stop handle being signalled means the
/// device went away mid-recording; that is reported on the interruption
/// channel so the session can fail the capture.
fn monitor_stream(
    kind: SourceKind,
    mut raw: mpsc::Receiver<AudioFrame>,
    stop: StopHandle,
    interruptions: mpsc::Sender<SourceKind>,
) -> mpsc::Receiver<AudioFrame> {
    let (tx, rx) = mpsc::channel(MONITOR_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(frame) = raw.recv().await {
            if tx.send(frame).await.is_err() {
                // Downstream dropped the stream; nothing left to watch.
                return;
            }
        }
        if stop.is_signalled() {
            debug!("{} stream closed after stop request", kind);
        } else {
            warn!("{} stream ended unexpectedly", kind);
            let _ = interruptions.try_send(kind);
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn monitor_reports_interruption_when_stream_dies_unstopped() {
        let (raw_tx, raw_rx) = mpsc::channel(4);
        let (int_tx, mut int_rx) = mpsc::channel(4);
        let stop = StopHandle::new();

        let mut frames = monitor_stream(SourceKind::Microphone, raw_rx, stop, int_tx);

        raw_tx
            .send(AudioFrame {
                samples: vec![1, 2],
                sample_rate: 16000,
                channels: 1,
                timestamp_ms: 0,
            })
            .await
            .unwrap();
        drop(raw_tx);

        assert_eq!(frames.recv().await.unwrap().samples, vec![1, 2]);
        assert!(frames.recv().await.is_none());
        assert_eq!(int_rx.recv().await, Some(SourceKind::Microphone));
    }

    #[tokio::test]
    async fn monitor_stays_quiet_after_requested_stop() {
        let (raw_tx, raw_rx) = mpsc::channel::<AudioFrame>(4);
        let (int_tx, mut int_rx) = mpsc::channel(4);
        let stop = StopHandle::new();

        let mut frames = monitor_stream(SourceKind::System, raw_rx, stop.clone(), int_tx);

        stop.signal();
        drop(raw_tx);

        assert!(frames.recv().await.is_none());
        assert!(int_rx.recv().await.is_none());
    }
}
