use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Structured meeting summary produced from a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub id: Uuid,
    pub transcript_id: String,
    /// 1-2 sentences on what the conversation was about
    pub context: String,
    pub participants: Vec<String>,
    pub key_points: Vec<String>,
    pub action_items: Vec<String>,
    /// Markdown body of the summary
    pub summary_markdown: String,
    pub generated_at: DateTime<Utc>,
    /// Filled in once the summary has been written to disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_path: Option<PathBuf>,
}
