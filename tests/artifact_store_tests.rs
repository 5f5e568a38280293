// Integration tests for artifact persistence
//
// Covers the timestamp-slug naming scheme that pairs a transcript with
// its summary, the on-demand notes directory, the camelCase transcript
// document with its savedAt stamp, and best-effort temp cleanup.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tempfile::TempDir;
use uuid::Uuid;

use meetnotes::storage::ArtifactStore;
use meetnotes::summarize::Summary;
use meetnotes::test_support::transcript_fixture;

fn sample_summary() -> Summary {
    Summary {
        id: Uuid::new_v4(),
        transcript_id: "transcript-1".to_string(),
        context: "A short sync about the product launch.".to_string(),
        participants: vec!["You (Host)".to_string(), "Participant A".to_string()],
        key_points: vec!["Launch is on schedule".to_string()],
        action_items: vec!["Host to review the docs by Friday".to_string()],
        summary_markdown: "## Launch Sync\n\n- Launch is on schedule".to_string(),
        generated_at: Utc::now(),
        saved_path: None,
    }
}

#[tokio::test]
async fn test_transcript_and_summary_pair_by_slug() -> Result<()> {
    let dir = TempDir::new()?;
    let store = ArtifactStore::new(dir.path().to_path_buf());

    let transcript_path = store.save_transcript(&transcript_fixture()).await?;
    let summary_path = store
        .save_summary(&sample_summary(), &transcript_path)
        .await?;

    let transcript_name = transcript_path.file_name().unwrap().to_str().unwrap();
    let summary_name = summary_path.file_name().unwrap().to_str().unwrap();
    assert!(transcript_name.ends_with("-transcript.json"));
    assert!(summary_name.ends_with("-summary.md"));

    // The shared slug prefix is the only pairing between the two files.
    let transcript_slug = transcript_name.strip_suffix("-transcript.json").unwrap();
    let summary_slug = summary_name.strip_suffix("-summary.md").unwrap();
    assert_eq!(transcript_slug, summary_slug);

    assert!(transcript_path.exists());
    assert!(summary_path.exists());
    assert_eq!(summary_path.parent(), transcript_path.parent());
    Ok(())
}

#[tokio::test]
async fn test_summary_path_matches_naming_contract() -> Result<()> {
    let dir = TempDir::new()?;
    let store = ArtifactStore::new(dir.path().to_path_buf());

    let transcript_path = dir.path().join("2024-01-01T00-00-00-000Z-transcript.json");
    let summary_path = store
        .save_summary(&sample_summary(), &transcript_path)
        .await?;

    assert_eq!(
        summary_path,
        dir.path().join("2024-01-01T00-00-00-000Z-summary.md")
    );
    assert!(summary_path.exists());
    Ok(())
}

#[tokio::test]
async fn test_transcript_document_is_camel_case_with_saved_at() -> Result<()> {
    let dir = TempDir::new()?;
    let store = ArtifactStore::new(dir.path().to_path_buf());

    let path = store.save_transcript(&transcript_fixture()).await?;
    let raw = tokio::fs::read_to_string(&path).await?;
    let doc: serde_json::Value = serde_json::from_str(&raw)?;

    assert_eq!(doc["id"], "transcript-1");
    assert_eq!(doc["text"], "Let's get started. Sounds good.");
    assert_eq!(doc["durationSeconds"], 120.0);
    assert!(doc["savedAt"].is_string(), "savedAt stamp missing: {raw}");
    assert_eq!(doc["utterances"][0]["speakerId"], "1A");
    assert_eq!(doc["utterances"][1]["text"], "Sounds good.");
    Ok(())
}

#[tokio::test]
async fn test_notes_directory_is_created_on_demand() -> Result<()> {
    let dir = TempDir::new()?;
    let notes = dir.path().join("Documents").join("MeetNotes");
    let store = ArtifactStore::new(notes.clone());
    assert!(!notes.exists());

    let first = store.save_transcript(&transcript_fixture()).await?;
    assert!(notes.is_dir());

    // A second save against the existing directory also succeeds.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = store.save_transcript(&transcript_fixture()).await?;
    assert!(first.exists());
    assert!(second.exists());
    Ok(())
}

#[tokio::test]
async fn test_summary_file_contains_the_markdown_document() -> Result<()> {
    let dir = TempDir::new()?;
    let store = ArtifactStore::new(dir.path().to_path_buf());

    let transcript_path = dir.path().join("2024-06-01T10-30-00-000Z-transcript.json");
    let summary_path = store
        .save_summary(&sample_summary(), &transcript_path)
        .await?;

    let doc = tokio::fs::read_to_string(&summary_path).await?;
    assert!(doc.starts_with("# Meeting Summary\n"));
    assert!(doc.contains("**Context:** A short sync about the product launch."));
    assert!(doc.contains("## Launch Sync"));
    assert!(doc.ends_with('\n'));
    Ok(())
}

#[tokio::test]
async fn test_cleanup_temp_swallows_missing_files() -> Result<()> {
    let dir = TempDir::new()?;
    let store = ArtifactStore::new(dir.path().to_path_buf());

    // Nothing to remove: logged, not propagated.
    store
        .cleanup_temp(Path::new("/nonexistent/meetnotes-gone.wav"))
        .await;

    // A real leftover is removed.
    let temp = dir.path().join("meetnotes-session.wav");
    tokio::fs::write(&temp, b"RIFF").await?;
    store.cleanup_temp(&temp).await;
    assert!(!temp.exists());
    Ok(())
}
