pub mod http;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod types;

pub use http::HttpSummaryProvider;
pub use orchestrator::{
    SummarizationOrchestrator, SummarizeError, DEFAULT_MALFORMED_BACKOFF, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_RATE_LIMIT_BACKOFF,
};
pub use provider::{GenerateError, SummaryProvider};
pub use types::Summary;
