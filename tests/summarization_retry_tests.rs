// Integration tests for the summarization retry policy
//
// The orchestrator gets three attempts. Rate limits back off 2s then 4s,
// malformed model output retries after 500ms, and anything else is fatal
// on the spot. All timing runs on a paused clock so the backoff schedule
// is asserted exactly.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;

use meetnotes::summarize::{
    GenerateError, SummarizationOrchestrator, SummarizeError,
};
use meetnotes::test_support::{summary_json, transcript_fixture, ScriptedSummarizer};

#[tokio::test(start_paused = true)]
async fn test_rate_limit_backs_off_then_succeeds() -> Result<()> {
    let provider = Arc::new(ScriptedSummarizer::with_outcomes(vec![
        Err(GenerateError::RateLimited),
        Ok(summary_json()),
    ]));
    let orchestrator = SummarizationOrchestrator::new(provider.clone());
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let summary = orchestrator
        .summarize(&transcript_fixture(), &cancel)
        .await?;

    assert_eq!(provider.calls(), 2);
    assert_eq!(
        started.elapsed(),
        Duration::from_secs(2),
        "first rate-limit backoff is 2s"
    );
    assert_eq!(summary.context, "A short sync about the product launch.");
    assert!(summary.summary_markdown.starts_with("## Launch Sync"));
    assert_eq!(summary.transcript_id, transcript_fixture().id);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_malformed_output_retries_after_short_pause() -> Result<()> {
    let provider = Arc::new(ScriptedSummarizer::with_outcomes(vec![
        Ok("I could not produce JSON for this.".to_string()),
        Ok(r###"{"summaryMarkdown": "## Call"}"###.to_string()),
        Ok(summary_json()),
    ]));
    let orchestrator = SummarizationOrchestrator::new(provider.clone());
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let summary = orchestrator
        .summarize(&transcript_fixture(), &cancel)
        .await?;

    assert_eq!(provider.calls(), 3);
    assert_eq!(
        started.elapsed(),
        Duration::from_millis(1000),
        "two malformed retries at 500ms each"
    );
    assert_eq!(summary.participants.len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_other_provider_failures_are_fatal_immediately() -> Result<()> {
    let provider = Arc::new(ScriptedSummarizer::with_outcomes(vec![Err(
        GenerateError::Api {
            status: 500,
            message: "internal error".to_string(),
        },
    )]));
    let orchestrator = SummarizationOrchestrator::new(provider.clone());
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let err = orchestrator
        .summarize(&transcript_fixture(), &cancel)
        .await
        .expect_err("server errors must not be retried");

    assert!(matches!(err, SummarizeError::Provider(_)));
    assert_eq!(provider.calls(), 1, "no second attempt after a fatal error");
    assert_eq!(started.elapsed(), Duration::ZERO);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_preserves_the_last_error() -> Result<()> {
    let provider = Arc::new(ScriptedSummarizer::always_rate_limited());
    let orchestrator = SummarizationOrchestrator::new(provider.clone());
    let cancel = CancellationToken::new();

    let started = tokio::time::Instant::now();
    let err = orchestrator
        .summarize(&transcript_fixture(), &cancel)
        .await
        .expect_err("three rate limits must exhaust the attempts");

    match &err {
        SummarizeError::Exhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(*attempts, 3);
            assert!(last_error.contains("rate limited"));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(provider.calls(), 3);
    // 2s after the first attempt, 4s after the second, none after the last.
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    assert!(err.to_string().contains("3 attempts"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_a_backoff() -> Result<()> {
    let provider = Arc::new(ScriptedSummarizer::with_outcomes(vec![
        Err(GenerateError::RateLimited),
        Ok(summary_json()),
    ]));
    let orchestrator = SummarizationOrchestrator::new(provider.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = orchestrator
        .summarize(&transcript_fixture(), &cancel)
        .await
        .expect_err("a cancelled token must stop the retry loop");

    assert!(matches!(err, SummarizeError::Cancelled));
    assert_eq!(provider.calls(), 1, "no attempt after cancellation");
    Ok(())
}

#[tokio::test]
async fn test_summary_carries_all_response_fields() -> Result<()> {
    let provider = Arc::new(ScriptedSummarizer::returning(&summary_json()));
    let orchestrator = SummarizationOrchestrator::new(provider);
    let cancel = CancellationToken::new();

    let summary = orchestrator
        .summarize(&transcript_fixture(), &cancel)
        .await?;

    assert_eq!(
        summary.participants,
        vec!["You (Host)".to_string(), "Participant A".to_string()]
    );
    assert_eq!(summary.key_points.len(), 2);
    assert_eq!(summary.action_items, vec!["Host to review the docs by Friday"]);
    assert!(summary.saved_path.is_none(), "not persisted yet");
    Ok(())
}
