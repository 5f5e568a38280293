//! Artifact persistence.
//!
//! Transcripts and summaries land in the notes directory under a shared
//! timestamp slug; the slug prefix is the only pairing between the two
//! files. Temp audio lives in the OS temp dir and is deleted best-effort
//! once transcription has consumed it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::summarize::Summary;
use crate::transcribe::Transcript;

const TRANSCRIPT_SUFFIX: &str = "-transcript.json";
const SUMMARY_SUFFIX: &str = "-summary.md";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not create notes directory {}: {}", path.display(), source)]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {}: {}", path.display(), source)]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize transcript: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("not a transcript artifact path: {}", .0.display())]
    NotATranscriptPath(PathBuf),
}

/// `~/Documents/MeetNotes`, falling back to the home directory, then the
/// working directory
pub fn default_notes_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("MeetNotes")
}

/// Writes session artifacts under the configured notes directory
pub struct ArtifactStore {
    notes_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(notes_dir: PathBuf) -> Self {
        Self { notes_dir }
    }

    pub fn notes_dir(&self) -> &Path {
        &self.notes_dir
    }

    /// Where the recorder should write the in-progress WAV
    pub fn temp_audio_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!("meetnotes-{}.wav", timestamp_slug()))
    }

    /// Persist a transcript as pretty JSON with a `savedAt` stamp.
    ///
    /// The notes directory is created on demand, so a deleted directory
    /// between sessions does not fail the pipeline.
    pub async fn save_transcript(&self, transcript: &Transcript) -> Result<PathBuf, StoreError> {
        self.ensure_notes_dir().await?;

        let path = self
            .notes_dir
            .join(format!("{}{}", timestamp_slug(), TRANSCRIPT_SUFFIX));
        let record = TranscriptRecord {
            transcript,
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&record)?;

        tokio::fs::write(&path, json)
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        info!("Transcript saved to {}", path.display());
        Ok(path)
    }

    /// Persist the summary next to its transcript.
    ///
    /// The derived name reuses the transcript's slug; a path that does
    /// not name a transcript artifact is refused rather than guessed at.
    pub async fn save_summary(
        &self,
        summary: &Summary,
        transcript_path: &Path,
    ) -> Result<PathBuf, StoreError> {
        let file_name = transcript_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let Some(slug) = file_name.strip_suffix(TRANSCRIPT_SUFFIX) else {
            return Err(StoreError::NotATranscriptPath(
                transcript_path.to_path_buf(),
            ));
        };

        let path = transcript_path.with_file_name(format!("{slug}{SUMMARY_SUFFIX}"));
        tokio::fs::write(&path, render_summary(summary))
            .await
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;
        info!("Summary saved to {}", path.display());
        Ok(path)
    }

    /// Best-effort removal of the temp recording; never propagates
    pub async fn cleanup_temp(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed temp audio {}", path.display()),
            Err(e) => warn!("Failed to remove temp audio {}: {}", path.display(), e),
        }
    }

    async fn ensure_notes_dir(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.notes_dir)
            .await
            .map_err(|source| StoreError::CreateDir {
                path: self.notes_dir.clone(),
                source,
            })
    }
}

/// RFC3339 UTC milliseconds with `:` and `.` swapped out, so the stamp
/// survives every filesystem
fn timestamp_slug() -> String {
    Utc::now()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TranscriptRecord<'a> {
    #[serde(flatten)]
    transcript: &'a Transcript,
    saved_at: DateTime<Utc>,
}

/// Markdown document for the summary artifact
fn render_summary(summary: &Summary) -> String {
    let mut doc = String::new();
    doc.push_str("# Meeting Summary\n\n");
    doc.push_str(&format!(
        "**Generated:** {}\n",
        summary.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    doc.push_str(&format!("**Context:** {}\n\n", summary.context));
    doc.push_str(&summary.summary_markdown);
    if !summary.summary_markdown.ends_with('\n') {
        doc.push('\n');
    }
    doc
}
