// Summarization with bounded retries.
//
// Three attempts total. Rate limits back off exponentially (2^attempt
// seconds), malformed model output retries after a short fixed pause, and
// any other failure is immediately fatal. Exhausting the attempts fails
// with the last error preserved; the caller degrades to a
// transcript-without-summary rather than failing the session.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use super::provider::{GenerateError, SummaryProvider};
use super::types::Summary;
use crate::transcribe::Transcript;
use uuid::Uuid;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// First rate-limit backoff; doubles per further attempt (2s, 4s)
pub const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(2);
pub const DEFAULT_MALFORMED_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    /// A non-retryable provider failure
    #[error("summarization failed: {0}")]
    Provider(#[from] GenerateError),
    #[error("summarization failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    #[error("summarization cancelled")]
    Cancelled,
}

/// Why one attempt failed; decides the retry class
enum AttemptError {
    RateLimited,
    Malformed(String),
    Fatal(GenerateError),
}

pub struct SummarizationOrchestrator {
    provider: Arc<dyn SummaryProvider>,
    max_attempts: u32,
    rate_limit_backoff: Duration,
    malformed_backoff: Duration,
}

impl SummarizationOrchestrator {
    pub fn new(provider: Arc<dyn SummaryProvider>) -> Self {
        Self {
            provider,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_backoff: DEFAULT_RATE_LIMIT_BACKOFF,
            malformed_backoff: DEFAULT_MALFORMED_BACKOFF,
        }
    }

    /// Override the backoff bases
    pub fn with_backoff(mut self, rate_limit: Duration, malformed: Duration) -> Self {
        self.rate_limit_backoff = rate_limit;
        self.malformed_backoff = malformed;
        self
    }

    pub async fn summarize(
        &self,
        transcript: &Transcript,
        cancel: &CancellationToken,
    ) -> Result<Summary, SummarizeError> {
        let user_prompt = build_user_prompt(transcript);
        let mut last_error = String::new();

        for attempt in 0..self.max_attempts {
            match self.attempt(transcript, &user_prompt).await {
                Ok(summary) => {
                    if attempt > 0 {
                        info!("Summarization succeeded on attempt {}", attempt + 1);
                    }
                    return Ok(summary);
                }
                Err(AttemptError::RateLimited) => {
                    let backoff = self.rate_limit_backoff * 2u32.pow(attempt);
                    warn!(
                        "Summarization attempt {} rate limited, backing off {:?}",
                        attempt + 1,
                        backoff
                    );
                    last_error = GenerateError::RateLimited.to_string();
                    if attempt + 1 < self.max_attempts {
                        self.pause(backoff, cancel).await?;
                    }
                }
                Err(AttemptError::Malformed(reason)) => {
                    warn!(
                        "Summarization attempt {} returned malformed output: {}",
                        attempt + 1,
                        reason
                    );
                    last_error = reason;
                    if attempt + 1 < self.max_attempts {
                        self.pause(self.malformed_backoff, cancel).await?;
                    }
                }
                Err(AttemptError::Fatal(e)) => {
                    error!("Summarization failed: {}", e);
                    return Err(SummarizeError::Provider(e));
                }
            }
        }

        Err(SummarizeError::Exhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }

    async fn attempt(
        &self,
        transcript: &Transcript,
        user_prompt: &str,
    ) -> Result<Summary, AttemptError> {
        let raw = self
            .provider
            .generate(SYSTEM_PROMPT, user_prompt)
            .await
            .map_err(|e| match e {
                GenerateError::RateLimited => AttemptError::RateLimited,
                other => AttemptError::Fatal(other),
            })?;
        parse_summary(&raw, transcript).map_err(AttemptError::Malformed)
    }

    async fn pause(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), SummarizeError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(SummarizeError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDraft {
    context: Option<String>,
    participants: Option<Vec<String>>,
    key_points: Option<Vec<String>>,
    action_items: Option<Vec<String>>,
    summary_markdown: Option<String>,
}

/// Extract the embedded JSON object (first `{` through last `}`, so
/// markdown fences around it are harmless) and validate required fields.
/// Empty required fields count as missing.
fn parse_summary(raw: &str, transcript: &Transcript) -> Result<Summary, String> {
    let start = raw
        .find('{')
        .ok_or_else(|| "no JSON object in response".to_string())?;
    let end = raw
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| "no JSON object in response".to_string())?;

    let draft: SummaryDraft =
        serde_json::from_str(&raw[start..=end]).map_err(|e| format!("JSON parse error: {e}"))?;

    let context = draft
        .context
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "missing required field: context".to_string())?;
    let summary_markdown = draft
        .summary_markdown
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| "missing required field: summaryMarkdown".to_string())?;

    Ok(Summary {
        id: Uuid::new_v4(),
        transcript_id: transcript.id.clone(),
        context,
        participants: draft.participants.unwrap_or_default(),
        key_points: draft.key_points.unwrap_or_default(),
        action_items: draft.action_items.unwrap_or_default(),
        summary_markdown,
        generated_at: Utc::now(),
        saved_path: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn transcript() -> Transcript {
        Transcript {
            id: "t1".into(),
            text: "hello".into(),
            confidence: 0.9,
            duration_seconds: 60.0,
            timestamp: Utc::now(),
            utterances: vec![],
            words: vec![],
        }
    }

    #[test]
    fn parses_a_complete_response() {
        let raw = r###"{"context":"A standup.","participants":["Host"],"keyPoints":["p1"],"actionItems":[],"summaryMarkdown":"## Standup\n- p1"}"###;
        let summary = parse_summary(raw, &transcript()).unwrap();
        assert_eq!(summary.context, "A standup.");
        assert_eq!(summary.participants, vec!["Host"]);
        assert_eq!(summary.transcript_id, "t1");
    }

    #[test]
    fn tolerates_markdown_fences_around_the_object() {
        let raw = "```json\n{\"context\":\"A call.\",\"summaryMarkdown\":\"## Call\"}\n```";
        let summary = parse_summary(raw, &transcript()).unwrap();
        assert_eq!(summary.summary_markdown, "## Call");
        assert!(summary.participants.is_empty());
    }

    #[test]
    fn rejects_prose_without_json() {
        let err = parse_summary("I could not summarize this.", &transcript()).unwrap_err();
        assert!(err.contains("no JSON object"));
    }

    #[test]
    fn rejects_missing_context() {
        let raw = r###"{"summaryMarkdown":"## Call"}"###;
        let err = parse_summary(raw, &transcript()).unwrap_err();
        assert!(err.contains("context"));
    }

    #[test]
    fn rejects_empty_summary_field() {
        let raw = r###"{"context":"A call.","summaryMarkdown":"  "}"###;
        let err = parse_summary(raw, &transcript()).unwrap_err();
        assert!(err.contains("summaryMarkdown"));
    }
}
