// Incremental WAV recorder.
//
// Consumes the mixed stream and encodes it to one WAV artifact, flushing
// after every second of audio so the file on disk stays valid up to the
// last flushed segment even if the process dies mid-recording.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::StopHandle;
use super::mixer::MixedStream;

/// Errors from the recording encoder
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    /// stop() without a start(); caller misuse, not a capture failure
    #[error("no active recording")]
    NoActiveRecording,
    #[error("recording already in progress")]
    AlreadyRecording,
    #[error("audio encoding failed: {0}")]
    Encode(String),
}

/// What a finished recording hands to the processing pipeline
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    pub path: PathBuf,
    pub duration_seconds: f64,
    pub bytes: u64,
    /// Flushed segments, one per second of audio plus the tail
    pub segments: u64,
}

/// A candidate WAV encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingProfile {
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// Ordered encoding preferences, most capable first
const ENCODING_PREFERENCES: &[EncodingProfile] = &[
    EncodingProfile {
        channels: 2,
        bits_per_sample: 16,
    },
    EncodingProfile {
        channels: 1,
        bits_per_sample: 16,
    },
];

/// Unconditional fallback when no preference fits the stream
const FALLBACK_ENCODING: EncodingProfile = EncodingProfile {
    channels: 1,
    bits_per_sample: 16,
};

/// First preference the stream can actually fill, else the fallback
pub fn select_encoding(stream_channels: u16) -> EncodingProfile {
    ENCODING_PREFERENCES
        .iter()
        .copied()
        .find(|profile| profile.channels <= stream_channels && profile.channels > 0)
        .unwrap_or(FALLBACK_ENCODING)
}

/// Configuration for the recorder
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Seconds of audio between flushes
    pub flush_interval_secs: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 1,
        }
    }
}

/// Encodes one mixed stream per session into a WAV artifact
pub struct WavRecorder {
    config: RecorderConfig,
    writer_task: Option<JoinHandle<Result<RecordingArtifact, RecorderError>>>,
    tracks: Vec<StopHandle>,
}

impl WavRecorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            writer_task: None,
            tracks: Vec::new(),
        }
    }

    /// Begin encoding `stream` to `path`.
    ///
    /// `tracks` are the stop handles of every live capture source; the
    /// recorder owns them so stop() can release the hardware before it
    /// looks at the encoder result.
    pub fn start(
        &mut self,
        stream: MixedStream,
        tracks: Vec<StopHandle>,
        path: PathBuf,
    ) -> Result<(), RecorderError> {
        if self.writer_task.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let profile = select_encoding(stream.channels);
        let spec = hound::WavSpec {
            channels: profile.channels,
            sample_rate: stream.sample_rate,
            bits_per_sample: profile.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec).map_err(|e| {
            RecorderError::Encode(format!("could not create {}: {}", path.display(), e))
        })?;

        info!(
            "Recording to {} ({}ch {}Hz {}-bit)",
            path.display(),
            spec.channels,
            spec.sample_rate,
            spec.bits_per_sample
        );

        let flush_every_samples =
            spec.sample_rate as u64 * spec.channels as u64 * self.config.flush_interval_secs;

        self.tracks = tracks;
        self.writer_task = Some(tokio::spawn(write_stream(
            stream,
            writer,
            path,
            flush_every_samples,
        )));

        Ok(())
    }

    /// Finish the recording and return the artifact.
    ///
    /// Capture hardware is released first, unconditionally; encoder
    /// failures surface only after that.
    pub async fn stop(&mut self) -> Result<RecordingArtifact, RecorderError> {
        let task = self
            .writer_task
            .take()
            .ok_or(RecorderError::NoActiveRecording)?;

        for track in self.tracks.drain(..) {
            track.signal();
        }

        match task.await {
            Ok(result) => result,
            Err(e) => Err(RecorderError::Encode(format!("writer task failed: {e}"))),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.writer_task.is_some()
    }
}

async fn write_stream(
    mut stream: MixedStream,
    writer: hound::WavWriter<BufWriter<File>>,
    path: PathBuf,
    flush_every_samples: u64,
) -> Result<RecordingArtifact, RecorderError> {
    let sample_rate = stream.sample_rate;
    let channels = stream.channels;

    let mut guard = WriterGuard {
        writer: Some(writer),
    };
    let mut written: u64 = 0;
    let mut since_flush: u64 = 0;
    let mut segments: u64 = 0;

    while let Some(frame) = stream.recv().await {
        for &sample in &frame.samples {
            guard.write_sample(sample)?;
        }
        written += frame.samples.len() as u64;
        since_flush += frame.samples.len() as u64;

        if flush_every_samples > 0 && since_flush >= flush_every_samples {
            guard.flush()?;
            segments += 1;
            since_flush = 0;
            debug!("Flushed segment {} ({} samples written)", segments, written);
        }
    }

    if since_flush > 0 {
        segments += 1;
    }
    guard.finalize()?;

    let bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    let duration_seconds = if sample_rate > 0 && channels > 0 {
        written as f64 / (sample_rate as f64 * channels as f64)
    } else {
        0.0
    };

    info!(
        "Recording complete: {} ({:.1}s, {} segments, {} bytes)",
        path.display(),
        duration_seconds,
        segments,
        bytes
    );

    Ok(RecordingArtifact {
        path,
        duration_seconds,
        bytes,
        segments,
    })
}

/// Keeps the WAV header consistent no matter how the write loop exits
struct WriterGuard {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WriterGuard {
    fn write_sample(&mut self, sample: i16) -> Result<(), RecorderError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .write_sample(sample)
                .map_err(|e| RecorderError::Encode(format!("failed to write sample: {e}")))?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RecorderError> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .map_err(|e| RecorderError::Encode(format!("failed to flush WAV file: {e}")))?;
        }
        Ok(())
    }

    fn finalize(mut self) -> Result<(), RecorderError> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| RecorderError::Encode(format!("failed to finalize WAV file: {e}")))?;
        }
        Ok(())
    }
}

impl Drop for WriterGuard {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}
