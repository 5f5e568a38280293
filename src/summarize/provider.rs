use async_trait::async_trait;

/// Generative model port: one call, system prompt plus user prompt in,
/// raw response text out.
#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, GenerateError>;
}

/// Failure kinds drive the retry policy, so they are structured rather
/// than sniffed out of error strings.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("summarization provider is not configured (missing API key)")]
    NotConfigured,
    #[error("rate limited")]
    RateLimited,
    #[error("request failed: {0}")]
    Http(String),
    #[error("provider returned status {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
}
