//! Types for transcription operations.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a remote transcription job.
///
/// Jobs progress queued → processing → completed; error is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

/// Individual word with timing and speaker attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub text: String,
    pub start_ms: u64,
    pub end_ms: u64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
}

/// Continuous speech segment from a single speaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub speaker_id: String,
    pub text: String,
    pub confidence: f64,
    pub start_ms: u64,
    pub end_ms: u64,
}

/// A finished transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transcript {
    pub id: String,
    pub text: String,
    pub confidence: f64,
    pub duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub utterances: Vec<Utterance>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub words: Vec<Word>,
}

impl Transcript {
    /// Build a transcript from a completed job snapshot.
    ///
    /// Utterances are normalized to start-time order (stable, so ties keep
    /// provider order); absent fields default rather than fail.
    pub fn from_snapshot(id: String, snapshot: JobSnapshot) -> Self {
        let mut utterances = snapshot.utterances;
        utterances.sort_by_key(|u| u.start_ms);
        Self {
            id,
            text: snapshot.text.unwrap_or_default(),
            confidence: snapshot.confidence.unwrap_or(0.0),
            duration_seconds: snapshot.duration_seconds.unwrap_or(0.0),
            timestamp: Utc::now(),
            utterances,
            words: snapshot.words,
        }
    }

    /// Distinct speakers across utterances
    pub fn speaker_count(&self) -> usize {
        self.utterances
            .iter()
            .map(|u| u.speaker_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// What one status poll of the provider returned
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub text: Option<String>,
    pub confidence: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub utterances: Vec<Utterance>,
    pub words: Vec<Word>,
    pub error: Option<String>,
}

impl JobSnapshot {
    pub fn with_status(status: JobStatus) -> Self {
        Self {
            status,
            text: None,
            confidence: None,
            duration_seconds: None,
            utterances: Vec::new(),
            words: Vec::new(),
            error: None,
        }
    }
}

/// Features requested when submitting a job
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub speaker_diarization: bool,
    /// Attribute speech per audio channel (mic vs system)
    pub multichannel: bool,
    pub min_speakers: u8,
    pub max_speakers: u8,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            speaker_diarization: true,
            multichannel: true,
            min_speakers: 2,
            max_speakers: 6,
        }
    }
}

/// Orchestrator-side bookkeeping for one submitted job
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub id: String,
    pub audio_url: String,
    pub status: JobStatus,
    pub polls: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(speaker: &str, start_ms: u64) -> Utterance {
        Utterance {
            speaker_id: speaker.to_string(),
            text: format!("said at {start_ms}"),
            confidence: 0.9,
            start_ms,
            end_ms: start_ms + 100,
        }
    }

    #[test]
    fn from_snapshot_sorts_utterances_by_start_time() {
        let mut snapshot = JobSnapshot::with_status(JobStatus::Completed);
        snapshot.utterances = vec![
            utterance("2A", 500),
            utterance("1A", 0),
            utterance("1A", 250),
        ];

        let transcript = Transcript::from_snapshot("t1".into(), snapshot);
        let starts: Vec<u64> = transcript.utterances.iter().map(|u| u.start_ms).collect();
        assert_eq!(starts, vec![0, 250, 500]);
    }

    #[test]
    fn speaker_count_deduplicates() {
        let mut snapshot = JobSnapshot::with_status(JobStatus::Completed);
        snapshot.utterances = vec![
            utterance("1A", 0),
            utterance("2A", 100),
            utterance("1A", 200),
        ];
        let transcript = Transcript::from_snapshot("t1".into(), snapshot);
        assert_eq!(transcript.speaker_count(), 2);
    }

    #[test]
    fn transcript_serializes_in_camel_case() {
        let transcript = Transcript {
            id: "t1".into(),
            text: "hello".into(),
            confidence: 0.95,
            duration_seconds: 12.0,
            timestamp: Utc::now(),
            utterances: vec![utterance("1A", 0)],
            words: vec![],
        };

        let json = serde_json::to_value(&transcript).unwrap();
        assert!(json.get("durationSeconds").is_some());
        assert!(json["utterances"][0].get("speakerId").is_some());
        assert!(json["utterances"][0].get("startMs").is_some());
        assert!(json.get("words").is_none()); // empty vecs are omitted
    }
}
