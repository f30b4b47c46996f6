// src/ingest/types.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One article as returned by an upstream news-fetch service.
/// Missing fields decode as empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub link: String,
    /// Source-specific timestamp text, e.g. "Mon, 28 Jul 2025 20:23:43 +0100".
    #[serde(default)]
    pub published: String,
    #[serde(default)]
    pub source: String,
}

/// Wire shape of `GET <source-url>`: `{count, items:[...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceReply {
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub items: Vec<NewsItem>,
}

/// Result of fetching one source. Never an error: a source that could not be
/// reached is `Degraded` and contributes zero items.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Fetched { body: Value },
    Degraded { attempts: u32, reason: String },
}

impl FetchOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, FetchOutcome::Degraded { .. })
    }

    /// JSON body as the orchestrator sees it; degraded sources read as `{"items": []}`.
    pub fn body(&self) -> Value {
        match self {
            FetchOutcome::Fetched { body } => body.clone(),
            FetchOutcome::Degraded { .. } => serde_json::json!({ "items": [] }),
        }
    }
}
