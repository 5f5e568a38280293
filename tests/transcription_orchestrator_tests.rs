// Integration tests for the upload → submit → poll transcription flow
//
// These tests drive the orchestrator against a scripted provider and
// assert the progress projection, the poll budget, and the failure
// taxonomy. Time-sensitive cases run on a paused clock so the 3-second
// cadence and the 200-poll budget are checked exactly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use meetnotes::test_support::{
    completed_snapshot, snapshot, CollectingSink, ScriptedTranscription,
};
use meetnotes::transcribe::{
    JobStatus, TranscribeApiError, TranscriptionError, TranscriptionOrchestrator,
};

/// Write a small stand-in recording and return its path
fn artifact(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("recording.wav");
    std::fs::write(&path, b"RIFFfake-wav-bytes").expect("write artifact");
    path
}

#[tokio::test(start_paused = true)]
async fn test_progress_sequence_for_successful_job() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedTranscription::completing_with(completed_snapshot(
        "Let's get started. Sounds good.",
    )));
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let transcript = orchestrator
        .transcribe(&artifact(&dir), &sink, &cancel)
        .await?;

    // 10 before upload, 30 after submit; the queued poll maps back to 10
    // and is clamped away; then processing and completion.
    assert_eq!(sink.values(), vec![10, 30, 50, 100]);
    assert_eq!(provider.poll_calls(), 3);
    assert_eq!(
        started.elapsed(),
        Duration::from_secs(9),
        "three polls at the 3s cadence"
    );

    assert_eq!(transcript.text, "Let's get started. Sounds good.");
    assert_eq!(transcript.utterances.len(), 2);
    assert!(transcript.utterances[0].start_ms <= transcript.utterances[1].start_ms);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_poll_budget_exhaustion_times_out() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedTranscription::never_finishing());
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let err = orchestrator
        .transcribe(&artifact(&dir), &sink, &cancel)
        .await
        .expect_err("a job that never settles must time out");

    match err {
        TranscriptionError::Timeout { polls, minutes } => {
            assert_eq!(polls, 200);
            assert_eq!(minutes, 10);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(provider.poll_calls(), 200);
    assert_eq!(
        started.elapsed(),
        Duration::from_secs(600),
        "200 polls at 3s each"
    );

    // Progress never reached 100 and never decreased.
    let values = sink.values();
    assert_eq!(values, vec![10, 30, 50]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_provider_error_text_is_preserved() -> Result<()> {
    let dir = TempDir::new()?;
    let mut failed = snapshot(JobStatus::Error);
    failed.error = Some("audio file is too short".to_string());

    let provider = Arc::new(ScriptedTranscription::with_statuses(vec![
        Ok(snapshot(JobStatus::Queued)),
        Ok(failed),
    ]));
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();

    let err = orchestrator
        .transcribe(&artifact(&dir), &sink, &cancel)
        .await
        .expect_err("provider-reported failure must surface");

    match err {
        TranscriptionError::Failed(reason) => {
            assert_eq!(reason, "audio file is too short");
        }
        other => panic!("expected failed, got {other:?}"),
    }
    assert_eq!(sink.values(), vec![10, 30]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_on_poll_is_not_retried() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedTranscription::with_statuses(vec![
        Ok(snapshot(JobStatus::Queued)),
        Err(TranscribeApiError::Http("connection reset".to_string())),
    ]));
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();

    let err = orchestrator
        .transcribe(&artifact(&dir), &sink, &cancel)
        .await
        .expect_err("transport failure must surface");

    assert!(
        matches!(&err, TranscriptionError::Transport(message) if message.contains("connection reset")),
        "expected transport error, got {err:?}"
    );
    // The failing poll was the last call; nothing retried behind it.
    assert_eq!(provider.poll_calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_upload_failure_stops_before_submission() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedTranscription::failing_upload("dns lookup failed"));
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();

    let err = orchestrator
        .transcribe(&artifact(&dir), &sink, &cancel)
        .await
        .expect_err("upload failure must surface");

    assert!(matches!(err, TranscriptionError::Upload(_)));
    assert_eq!(provider.upload_calls(), 1);
    assert_eq!(provider.submit_calls(), 0);
    assert_eq!(sink.values(), vec![10]);
    Ok(())
}

#[tokio::test]
async fn test_submit_failure_is_a_transport_error() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedTranscription::failing_submit("service unavailable"));
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();

    let err = orchestrator
        .transcribe(&artifact(&dir), &sink, &cancel)
        .await
        .expect_err("submit failure must surface");

    assert!(
        matches!(&err, TranscriptionError::Transport(message) if message.contains("service unavailable")),
        "expected transport error, got {err:?}"
    );
    assert_eq!(provider.submit_calls(), 1);
    assert_eq!(provider.poll_calls(), 0);
    // 30 is only reported once the job id comes back.
    assert_eq!(sink.values(), vec![10]);
    Ok(())
}

#[tokio::test]
async fn test_unconfigured_provider_refuses_before_any_work() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedTranscription::unconfigured());
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();

    let err = orchestrator
        .transcribe(&artifact(&dir), &sink, &cancel)
        .await
        .expect_err("missing credentials must refuse the job");

    assert!(matches!(err, TranscriptionError::NotConfigured));
    assert_eq!(provider.upload_calls(), 0);
    assert!(sink.values().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_is_honored_between_polls() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedTranscription::never_finishing());
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .transcribe(&artifact(&dir), &sink, &cancel)
        .await
        .expect_err("a cancelled token must stop the poll loop");

    assert!(matches!(err, TranscriptionError::Cancelled));
    assert_eq!(provider.poll_calls(), 0, "no poll after cancellation");
    assert_eq!(sink.values(), vec![10, 30]);
    Ok(())
}

#[tokio::test]
async fn test_missing_artifact_fails_with_read_error() -> Result<()> {
    let dir = TempDir::new()?;
    let provider = Arc::new(ScriptedTranscription::never_finishing());
    let orchestrator = TranscriptionOrchestrator::new(provider.clone());
    let sink = CollectingSink::new();
    let cancel = CancellationToken::new();

    let missing = dir.path().join("does-not-exist.wav");
    let err = orchestrator
        .transcribe(&missing, &sink, &cancel)
        .await
        .expect_err("missing artifact must fail");

    assert!(matches!(err, TranscriptionError::ReadArtifact(_)));
    assert_eq!(provider.upload_calls(), 0);
    Ok(())
}
